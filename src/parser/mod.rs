//! Parser adapter: turns source text into a full tree, a partial tree, or a
//! failure, using the parser factory from the language's capability bundle.
//!
//! A tree with syntax errors is still useful when its root kept at least one
//! child: detectors that only need a few well-formed subtrees run on it with
//! a confidence penalty instead of falling back to text matching.

mod tree;

pub use tree::{
    ancestor, column_of, descendants_until, is_field, line_of, named_children, Preorder,
    SourceTree, Visit, Walk,
};

use crate::error::EngineError;
use crate::registry::{LanguageCapability, LanguageRegistry};

/// A syntax error location recovered from a partial tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Line (1-indexed).
    pub line: usize,
    /// Column (1-indexed).
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Result of parsing one source unit.
pub enum ParseOutcome {
    /// Clean parse.
    Full(SourceTree),
    /// Parse reported errors but recovered some structure.
    Partial(SourceTree, Vec<Diagnostic>),
    /// Nothing usable: unsupported language or no recoverable structure.
    Failed(EngineError),
}

impl ParseOutcome {
    pub fn is_full(&self) -> bool {
        matches!(self, ParseOutcome::Full(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ParseOutcome::Partial(..))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ParseOutcome::Failed(_))
    }

    /// The tree, if one was produced.
    pub fn tree(&self) -> Option<&SourceTree> {
        match self {
            ParseOutcome::Full(tree) | ParseOutcome::Partial(tree, _) => Some(tree),
            ParseOutcome::Failed(_) => None,
        }
    }
}

/// Parse `source` as `language_id`, resolving the parser through `registry`.
///
/// An unregistered language short-circuits to `Failed(UnsupportedLanguage)`
/// without attempting a parse.
pub fn parse(source: &str, language_id: &str, registry: &LanguageRegistry) -> ParseOutcome {
    match registry.resolve(language_id) {
        Some(capability) => parse_with(source, &capability),
        None => ParseOutcome::Failed(EngineError::UnsupportedLanguage(language_id.to_string())),
    }
}

/// Parse `source` with an already-resolved capability.
pub fn parse_with(source: &str, capability: &LanguageCapability) -> ParseOutcome {
    let mut parser = match (capability.parser_factory)() {
        Ok(parser) => parser,
        Err(e) => {
            return ParseOutcome::Failed(EngineError::ParseFailed(format!(
                "could not create {} parser: {e:#}",
                capability.id
            )))
        }
    };

    let tree = match parser.parse(source, None) {
        Some(tree) => tree,
        None => {
            return ParseOutcome::Failed(EngineError::ParseFailed(format!(
                "{} parser produced no tree",
                capability.id
            )))
        }
    };

    let root = tree.root_node();
    if !root.has_error() {
        return ParseOutcome::Full(SourceTree::new(tree, source, &capability.id));
    }

    // Recovered structure means at least one child under the root that is
    // not itself an error node.
    let recovered = {
        let mut cursor = root.walk();
        let found = root.children(&mut cursor).any(|child| !child.is_error());
        found
    };
    if root.is_error() || root.child_count() == 0 || !recovered {
        return ParseOutcome::Failed(EngineError::ParseFailed(format!(
            "no recoverable {} structure",
            capability.id
        )));
    }

    let tree = SourceTree::new(tree, source, &capability.id);
    let diagnostics = collect_diagnostics(&tree);
    ParseOutcome::Partial(tree, diagnostics)
}

/// One diagnostic per outermost ERROR node and per MISSING node.
pub fn collect_diagnostics(tree: &SourceTree) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for node in tree.nodes() {
        if node.is_missing() {
            diagnostics.push(Diagnostic {
                line: line_of(node),
                column: column_of(node),
                message: format!("missing `{}`", node.kind()),
            });
        } else if node.is_error() && ancestor(node, |k| k == "ERROR").is_none() {
            let snippet: String = tree.text(node).chars().take(40).collect();
            diagnostics.push(Diagnostic {
                line: line_of(node),
                column: column_of(node),
                message: format!("syntax error near `{}`", snippet.trim()),
            });
        }
    }
    diagnostics
}
