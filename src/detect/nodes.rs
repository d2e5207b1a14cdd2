//! Grammar-neutral helpers for reading calls, assignments and literals.
//!
//! Field names differ across grammars; each helper tries the known spellings
//! in turn so detectors stay free of per-language branches.

use tree_sitter::Node;

use crate::parser::{ancestor, named_children, SourceTree};
use crate::registry::NodeVocabulary;

/// Callee of a call node as written, with whitespace removed.
///
/// Java `obj.method(...)` and `new Type(...)` keep their object/type prefix.
pub fn callee_text(tree: &SourceTree, call: Node<'_>) -> String {
    let text = if let Some(function) = call.child_by_field_name("function") {
        tree.text(function).to_string()
    } else if let Some(name) = call.child_by_field_name("name") {
        match call.child_by_field_name("object") {
            Some(object) => format!("{}.{}", tree.text(object), tree.text(name)),
            None => tree.text(name).to_string(),
        }
    } else if let Some(constructor) = call.child_by_field_name("constructor") {
        tree.text(constructor).to_string()
    } else if let Some(type_node) = call.child_by_field_name("type") {
        tree.text(type_node).to_string()
    } else {
        String::new()
    };
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Positional and keyword arguments of a call.
pub fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    match call.child_by_field_name("arguments") {
        Some(args) => named_children(args),
        None => Vec::new(),
    }
}

/// Positional arguments only (Python keyword arguments removed).
pub fn positional_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call_arguments(call)
        .into_iter()
        .filter(|n| n.kind() != "keyword_argument")
        .collect()
}

/// Value of a Python keyword argument, by name.
pub fn keyword_argument<'t>(tree: &SourceTree, call: Node<'t>, name: &str) -> Option<Node<'t>> {
    call_arguments(call)
        .into_iter()
        .filter(|n| n.kind() == "keyword_argument")
        .find(|n| {
            n.child_by_field_name("name")
                .map(|k| tree.text(k) == name)
                .unwrap_or(false)
        })
        .and_then(|n| n.child_by_field_name("value"))
}

/// Target and value of an assignment, declaration or key/value pair.
pub fn binding_parts(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    for (target, value) in [("left", "right"), ("name", "value"), ("key", "value")] {
        if let (Some(t), Some(v)) = (
            node.child_by_field_name(target),
            node.child_by_field_name(value),
        ) {
            return Some((unwrap_value(t), unwrap_value(v)));
        }
    }
    let children = named_children(node);
    if children.len() == 2 {
        return Some((unwrap_value(children[0]), unwrap_value(children[1])));
    }
    None
}

/// Descend through single-expression wrappers (`expression_list`,
/// `literal_element`, parentheses).
pub fn unwrap_value(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        let wraps = matches!(
            current.kind(),
            "expression_list" | "literal_element" | "parenthesized_expression" | "pattern_list"
        );
        if !wraps {
            return current;
        }
        match named_children(current).first() {
            Some(first) => current = *first,
            None => return current,
        }
    }
}

/// Whether a node is a string literal without interpolation.
pub fn is_plain_string(vocab: &NodeVocabulary, node: Node<'_>) -> bool {
    vocab.is_string(node.kind()) && !has_interpolation(vocab, node)
}

/// Whether a string node interpolates expressions.
pub fn has_interpolation(vocab: &NodeVocabulary, node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .any(|child| vocab.is_interpolation(child.kind()) || has_interpolation(vocab, child));
    found
}

/// Whether a node is a literal whose value is fixed in source.
pub fn is_constant(vocab: &NodeVocabulary, node: Node<'_>) -> bool {
    let kind = node.kind();
    is_plain_string(vocab, node)
        || kind.contains("number")
        || kind.contains("int_literal")
        || kind.contains("float")
        || kind.contains("integer")
        || matches!(kind, "true" | "false" | "nil" | "null" | "none" | "None")
}

/// Nearest enclosing function-like node.
pub fn enclosing_function<'t>(vocab: &NodeVocabulary, node: Node<'t>) -> Option<Node<'t>> {
    ancestor(node, |kind| vocab.is_function(kind))
}

/// Whether `node` sits inside `scope`.
pub fn is_within(node: Node<'_>, scope: Node<'_>) -> bool {
    node.start_byte() >= scope.start_byte() && node.end_byte() <= scope.end_byte()
}

/// Text of an operator token between the operands of a binary node.
pub fn binary_operator<'t>(tree: &'t SourceTree, node: Node<'_>) -> &'t str {
    if let Some(op) = node.child_by_field_name("operator") {
        return tree.text(op);
    }
    let mut cursor = node.walk();
    let op = node
        .children(&mut cursor)
        .find(|child| !child.is_named())
        .map(|child| tree.text(child))
        .unwrap_or("");
    op
}

/// Operands of a binary node.
pub fn binary_operands(node: Node<'_>) -> Vec<Node<'_>> {
    let left = node.child_by_field_name("left");
    let right = node.child_by_field_name("right");
    match (left, right) {
        (Some(l), Some(r)) => vec![l, r],
        _ => named_children(node),
    }
}
