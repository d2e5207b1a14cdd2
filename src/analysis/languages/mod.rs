//! Built-in language capability bundles.

pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod typescript;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use super::{unquote, ImportKind, ImportRef};
use crate::parser::{column_of, descendants_until, line_of, SourceTree};
use crate::registry::{LanguageCapability, LanguageRegistry};

type CapabilityFactory = fn() -> anyhow::Result<LanguageCapability>;

/// Register every built-in language.
///
/// A language whose bundle cannot be built (e.g., a query that fails to
/// compile against its grammar) is skipped with a warning; the others still
/// register.
pub fn register_all(registry: &LanguageRegistry) {
    let factories: [(&str, CapabilityFactory); 5] = [
        ("go", go::capability),
        ("java", java::capability),
        ("javascript", javascript::capability),
        ("python", python::capability),
        ("typescript", typescript::capability),
    ];
    for (id, factory) in factories {
        match factory() {
            Ok(capability) => registry.register(capability),
            Err(e) => tracing::warn!(language = id, "skipping language: {e:#}"),
        }
    }
}

/// A parser set to `language`.
pub(crate) fn parser_for(language: &Language) -> anyhow::Result<Parser> {
    let mut parser = Parser::new();
    parser.set_language(language)?;
    Ok(parser)
}

/// All captures of `query` over the tree, as (capture name, node).
pub(crate) fn captures<'q, 't>(query: &'q Query, tree: &'t SourceTree) -> Vec<(&'q str, Node<'t>)> {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root(), tree.source().as_bytes());
    let mut out = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            out.push((query.capture_names()[capture.index as usize], capture.node));
        }
    }
    out
}

/// Import reference from a string-literal node.
pub(crate) fn import_ref(tree: &SourceTree, node: Node<'_>, kind: ImportKind) -> ImportRef {
    ImportRef {
        path: unquote(tree.text(node)).to_string(),
        kind,
        line: line_of(node),
        column: column_of(node),
        names: Vec::new(),
    }
}

/// Every child stored under `field`.
pub(crate) fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<_> = node.children_by_field_name(field, &mut cursor).collect();
    children
}

/// Identifier leaves of a binding pattern, skipping `_`.
pub(crate) fn pattern_identifiers<'t>(
    tree: &SourceTree,
    pattern: Node<'t>,
    identifier_kinds: &[&str],
) -> Vec<Node<'t>> {
    let mut nodes = vec![pattern];
    nodes.extend(descendants_until(pattern, |_| false));
    nodes
        .into_iter()
        .filter(|n| identifier_kinds.contains(&n.kind()) && tree.text(*n) != "_")
        .collect()
}
