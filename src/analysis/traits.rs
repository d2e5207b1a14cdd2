//! Per-language hooks plugged into the generic extractors and detectors.

use tree_sitter::Node;

use super::{ImportRef, ParameterInfo, SymbolKind, Visibility};
use crate::detect::{DetectContext, Finding, Sinks};
use crate::parser::SourceTree;

/// A name introduced by a declaration node.
#[derive(Debug, Clone)]
pub struct Declared<'t> {
    pub name: String,
    /// Node carrying the name; its position becomes the symbol's position.
    pub node: Node<'t>,
    pub kind: SymbolKind,
    pub exported: bool,
    /// Bind inside the scope opened by the declaring node itself (arrow
    /// function parameters, catch parameters, for-of bindings) rather than
    /// in the enclosing scope.
    pub inner: bool,
}

impl<'t> Declared<'t> {
    /// Declaration named by the text of `node`.
    pub fn new(tree: &SourceTree, node: Node<'t>, kind: SymbolKind) -> Self {
        Self::named(tree.text(node).to_string(), node, kind)
    }

    /// Declaration with an explicit name (e.g., Go imports named by path).
    pub fn named(name: String, node: Node<'t>, kind: SymbolKind) -> Self {
        Self {
            name,
            node,
            kind,
            exported: false,
            inner: false,
        }
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }
}

/// Language-specific detection knowledge.
///
/// The shared detector passes are generic over the node vocabulary; this
/// trait supplies the parts that cannot be expressed as node kind names.
pub trait LanguageDetector: Send + Sync {
    /// Dangerous call targets for the injection and crypto passes.
    fn sinks(&self) -> &Sinks;

    /// Async misuse patterns of this language's concurrency model.
    fn detect_async_misuse(&self, _ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        Ok(Vec::new())
    }

    /// Whether a function is middleware by signature alone
    /// (e.g., Go's `func(http.Handler) http.Handler`).
    fn is_middleware_signature(&self, _tree: &SourceTree, _function: Node<'_>) -> bool {
        false
    }
}

/// Language-specific extraction knowledge.
pub trait LanguageExtractor: Send + Sync {
    /// Name of a function node. `None` for anonymous functions.
    fn function_name(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        node.child_by_field_name("name")
            .map(|n| tree.text(n).to_string())
            .filter(|s| !s.is_empty())
    }

    /// Receiver or enclosing class of a method.
    fn receiver(&self, _tree: &SourceTree, _node: Node<'_>) -> Option<String> {
        None
    }

    fn parameters(&self, tree: &SourceTree, node: Node<'_>) -> Vec<ParameterInfo>;

    fn return_type(&self, _tree: &SourceTree, _node: Node<'_>) -> Option<String> {
        None
    }

    /// Documentation attached to a function.
    fn doc_comment(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        leading_comment(tree, node)
    }

    fn visibility(&self, tree: &SourceTree, node: Node<'_>, name: &str) -> Visibility;

    /// Body node of a function.
    fn function_body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("body")
    }

    /// Names a node declares, in source order.
    fn declarations<'t>(&self, tree: &SourceTree, node: Node<'t>) -> Vec<Declared<'t>>;

    /// Whether an identifier node is a use that should resolve to a symbol.
    fn is_reference(&self, tree: &SourceTree, node: Node<'_>) -> bool;

    /// Module references from import and require statements.
    fn imports(&self, tree: &SourceTree) -> anyhow::Result<Vec<ImportRef>>;
}

/// Comment block immediately above a node, with comment markers stripped.
///
/// Climbs through wrappers that start on the same line (export statements,
/// variable declarations holding an arrow function) before giving up.
pub fn leading_comment(tree: &SourceTree, node: Node<'_>) -> Option<String> {
    let start_row = node.start_position().row;
    let mut current = node;
    for _ in 0..3 {
        if let Some(doc) = comments_before(tree, current) {
            return Some(doc);
        }
        match current.parent() {
            Some(parent) if parent.start_position().row == start_row => current = parent,
            _ => break,
        }
    }
    None
}

fn comments_before(tree: &SourceTree, node: Node<'_>) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_end = node.start_position().row;
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if !sibling.kind().contains("comment") {
            break;
        }
        // Only comments touching the node (or the previous comment) count.
        if sibling.end_position().row + 1 < expected_end {
            break;
        }
        lines.push(strip_comment_markers(tree.text(sibling)));
        expected_end = sibling.start_position().row;
        prev = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn strip_comment_markers(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches("//")
                .trim_start_matches('#')
                .trim_start_matches('*');
            line.trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
