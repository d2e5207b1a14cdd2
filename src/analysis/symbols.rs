//! Per-file symbol tables built with an explicit scope stack.
//!
//! One depth-first pass over the tree:
//!
//! 1. entering a node records the names it declares into the current scope;
//! 2. if the node opens a scope, a frame is pushed (and popped on leave);
//! 3. identifier uses resolve outward through the stack, innermost first,
//!    and are recorded as references.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::{column_of, line_of, SourceTree, Visit};
use crate::registry::LanguageCapability;

/// Index of a symbol inside its table.
pub type SymbolId = usize;

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Variable,
    Parameter,
    Import,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Import => "import",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Declaration line (1-indexed).
    pub line: usize,
    pub column: usize,
    /// 0 for file scope.
    pub scope_depth: usize,
    pub exported: bool,
    /// Indices into [`SymbolTable::references`].
    pub references: Vec<usize>,
}

/// A use of a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub line: usize,
    pub column: usize,
    /// Declaration the use resolved to, if any.
    pub resolved: Option<SymbolId>,
}

/// LIFO stack of lexical scopes. The file scope at the bottom is never popped.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, SymbolId>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Current depth; 0 is file scope.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn declare(&mut self, name: &str, id: SymbolId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), id);
        }
    }

    pub fn declared_in_current(&self, name: &str) -> Option<SymbolId> {
        self.frames.last().and_then(|f| f.get(name).copied())
    }

    /// Innermost declaration of `name`.
    pub fn resolve(&self, name: &str) -> Option<SymbolId> {
        self.frames.iter().rev().find_map(|f| f.get(name).copied())
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbols and references of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub language: String,
    symbols: Vec<Symbol>,
    references: Vec<Reference>,
}

impl SymbolTable {
    /// Empty table, returned when no tree is available.
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Default::default()
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.references.is_empty()
    }

    /// All declarations of `name`, in source order.
    pub fn lookup(&self, name: &str) -> Vec<&Symbol> {
        self.symbols.iter().filter(|s| s.name == name).collect()
    }

    /// Symbols with no recorded reference.
    pub fn unreferenced(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.references.is_empty())
    }

    /// References that resolved to no declaration in this file.
    pub fn unresolved_references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.resolved.is_none())
    }

    /// File-scope symbols visible to other files.
    pub fn exported(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.scope_depth == 0 && s.exported)
    }

    /// File-scope symbols of any visibility.
    pub fn top_level(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.scope_depth == 0)
    }

    /// First reference to `name` on `line`.
    pub fn reference_at(&self, line: usize, name: &str) -> Option<&Reference> {
        self.references
            .iter()
            .find(|r| r.line == line && r.name == name)
    }

    /// The declaration a reference resolved to.
    pub fn resolution(&self, reference: &Reference) -> Option<&Symbol> {
        reference.resolved.and_then(|id| self.symbols.get(id))
    }

    fn add_symbol(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = self.symbols.len();
        symbol.id = id;
        self.symbols.push(symbol);
        id
    }

    fn add_reference(&mut self, reference: Reference) {
        let idx = self.references.len();
        if let Some(id) = reference.resolved {
            if let Some(symbol) = self.symbols.get_mut(id) {
                symbol.references.push(idx);
            }
        }
        self.references.push(reference);
    }
}

/// Build the symbol table of a parsed file.
pub fn build_symbol_table(tree: &SourceTree, capability: &LanguageCapability) -> SymbolTable {
    let extractor = &capability.extractor;
    let vocab = &capability.vocabulary;

    let mut table = SymbolTable::empty(&capability.id);
    let mut stack = ScopeStack::new();
    let mut scope_owners: HashSet<usize> = HashSet::new();
    let mut declaration_sites: HashSet<usize> = HashSet::new();

    for visit in tree.walk() {
        match visit {
            Visit::Enter(node) => {
                let declared = extractor.declarations(tree, node);
                let (inner, outer): (Vec<_>, Vec<_>) = declared.into_iter().partition(|d| d.inner);

                for decl in outer {
                    declare(&mut table, &mut stack, &mut declaration_sites, decl);
                }
                if vocab.is_scope(node.kind()) {
                    stack.push();
                    scope_owners.insert(node.id());
                }
                for decl in inner {
                    declare(&mut table, &mut stack, &mut declaration_sites, decl);
                }

                if !declaration_sites.contains(&node.id()) && extractor.is_reference(tree, node) {
                    let name = tree.text(node);
                    if !name.is_empty() {
                        table.add_reference(Reference {
                            name: name.to_string(),
                            line: line_of(node),
                            column: column_of(node),
                            resolved: stack.resolve(name),
                        });
                    }
                }
            }
            Visit::Leave(node) => {
                if scope_owners.remove(&node.id()) {
                    stack.pop();
                }
            }
        }
    }

    table
}

fn declare(
    table: &mut SymbolTable,
    stack: &mut ScopeStack,
    sites: &mut HashSet<usize>,
    decl: super::Declared<'_>,
) {
    sites.insert(decl.node.id());
    if decl.name.is_empty() {
        return;
    }
    // Re-assigning a variable already bound in this scope is not a new
    // declaration.
    if decl.kind == SymbolKind::Variable && stack.declared_in_current(&decl.name).is_some() {
        return;
    }
    let id = table.add_symbol(Symbol {
        id: 0,
        name: decl.name.clone(),
        kind: decl.kind,
        line: line_of(decl.node),
        column: column_of(decl.node),
        scope_depth: stack.depth(),
        exported: decl.exported,
        references: Vec::new(),
    });
    stack.declare(&decl.name, id);
}
