//! Owned syntax trees and cursor-based traversal.

use tree_sitter::{Node, Tree, TreeCursor};

/// A parsed source unit.
///
/// Owns both the tree-sitter tree and the text it was parsed from, so node
/// text lookups never outlive the call that produced the tree.
pub struct SourceTree {
    tree: Tree,
    source: String,
    language: String,
}

impl SourceTree {
    /// Wrap a tree with a copy of the source it was parsed from.
    pub fn new(tree: Tree, source: &str, language: &str) -> Self {
        Self {
            tree,
            source: source.to_string(),
            language: language.to_string(),
        }
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether the parser reported any error or missing node.
    pub fn has_error(&self) -> bool {
        self.root().has_error()
    }

    /// Get text for a node.
    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Pre-order iterator over every node in the tree.
    pub fn nodes(&self) -> Preorder<'_> {
        Preorder::new(self.root())
    }

    /// Enter/leave event stream over the whole tree.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self.root())
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Text of a 1-indexed line, without the trailing newline.
    pub fn line_text(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.source.lines().nth(idx))
            .unwrap_or("")
    }
}

/// 1-indexed line of a node's start.
pub fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// 1-indexed column of a node's start.
pub fn column_of(node: Node<'_>) -> usize {
    node.start_position().column + 1
}

/// Whether `child` is the node stored under `field` on `parent`.
pub fn is_field(parent: Node<'_>, field: &str, child: Node<'_>) -> bool {
    parent
        .child_by_field_name(field)
        .map(|n| n.id() == child.id())
        .unwrap_or(false)
}

/// Named children, skipping comments.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|n| !n.kind().contains("comment"))
        .collect();
    children
}

/// Nearest ancestor (excluding `node`) whose kind satisfies `pred`.
pub fn ancestor<'t>(node: Node<'t>, pred: impl Fn(&str) -> bool) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if pred(n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Descendants of `root` in pre-order, not descending into nodes for which
/// `stop` returns true (those nodes are still skipped entirely).
///
/// A stop predicate matching function kinds confines the walk to one
/// function's own body.
pub fn descendants_until<'t>(root: Node<'t>, stop: impl Fn(Node<'t>) -> bool) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id() != root.id() {
            if stop(node) {
                continue;
            }
            out.push(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Pre-order node iterator built on a `TreeCursor`.
pub struct Preorder<'t> {
    walk: Walk<'t>,
}

impl<'t> Preorder<'t> {
    pub fn new(root: Node<'t>) -> Self {
        Self {
            walk: Walk::new(root),
        }
    }
}

impl<'t> Iterator for Preorder<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        loop {
            match self.walk.next()? {
                Visit::Enter(node) => return Some(node),
                Visit::Leave(_) => continue,
            }
        }
    }
}

/// A traversal event.
#[derive(Debug, Clone, Copy)]
pub enum Visit<'t> {
    Enter(Node<'t>),
    Leave(Node<'t>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Start,
    Down,
    Up,
    Done,
}

/// Depth-first enter/leave events without recursion.
///
/// The cursor never climbs above the node it was created from.
pub struct Walk<'t> {
    cursor: TreeCursor<'t>,
    state: WalkState,
}

impl<'t> Walk<'t> {
    pub fn new(root: Node<'t>) -> Self {
        Self {
            cursor: root.walk(),
            state: WalkState::Start,
        }
    }
}

impl<'t> Iterator for Walk<'t> {
    type Item = Visit<'t>;

    fn next(&mut self) -> Option<Visit<'t>> {
        match self.state {
            WalkState::Start => {
                self.state = WalkState::Down;
                Some(Visit::Enter(self.cursor.node()))
            }
            WalkState::Down => {
                if self.cursor.goto_first_child() {
                    Some(Visit::Enter(self.cursor.node()))
                } else {
                    self.state = WalkState::Up;
                    Some(Visit::Leave(self.cursor.node()))
                }
            }
            WalkState::Up => {
                if self.cursor.goto_next_sibling() {
                    self.state = WalkState::Down;
                    Some(Visit::Enter(self.cursor.node()))
                } else if self.cursor.goto_parent() {
                    Some(Visit::Leave(self.cursor.node()))
                } else {
                    self.state = WalkState::Done;
                    None
                }
            }
            WalkState::Done => None,
        }
    }
}
