//! Language-agnostic extraction of facts from syntax trees.
//!
//! Facts are functions, symbols with their scopes and references, imports,
//! and the cross-file dependency graph built from those imports. Every
//! extractor here is generic over the [`LanguageCapability`] bundle; the
//! per-language knowledge lives behind [`LanguageExtractor`] and
//! [`LanguageDetector`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source + lang   │────▶│ Registry     │────▶│ Capability    │
//! └─────────────────┘     │ (lookup)     │     │ (parser,      │
//!                         └──────────────┘     │  vocabulary,  │
//!                                              │  hooks)       │
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Functions,   │◀────│ SourceTree    │
//!                         │ Symbols,     │     │ (full or      │
//!                         │ Imports      │     │  partial)     │
//!                         └──────────────┘     └───────────────┘
//!                                 │
//!                                 ▼
//!                         ┌──────────────┐
//!                         │ Dependency   │
//!                         │ Graph        │
//!                         └──────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a module in `src/analysis/languages/` (e.g., `ruby.rs`)
//! 2. Fill in a `NodeVocabulary` with the grammar's node kinds
//! 3. Implement `LanguageExtractor` and `LanguageDetector`
//! 4. Expose `capability()` and add it to `languages::register_all`
//!
//! See `languages/go.rs` for a reference implementation.
//!
//! [`LanguageCapability`]: crate::registry::LanguageCapability

mod facts;
pub mod functions;
mod graph;
pub mod languages;
mod symbols;
mod text;
mod traits;

pub use facts::{
    unquote, FunctionInfo, ImportKind, ImportRef, ParameterInfo, Visibility,
};
pub use functions::{collect_functions, filter_by_name};
pub use graph::{
    build_dependency_graph, DependencyEdge, DependencyGraph, EdgeKind, GraphNode, SourceFile,
};
pub(crate) use graph::FileFacts;
pub use symbols::{
    build_symbol_table, Reference, ScopeStack, Symbol, SymbolId, SymbolKind, SymbolTable,
};
pub use text::{extract_text_functions, FunctionSpan};
pub use traits::{leading_comment, Declared, LanguageDetector, LanguageExtractor};
