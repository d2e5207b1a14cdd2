//! Treescan - multi-language parse-tree analysis engine.
//!
//! Treescan parses source files with tree-sitter and reports typed,
//! confidence-scored findings: recognized security middleware, injection
//! sinks, weak crypto, hardcoded secrets, dead and duplicate code,
//! unreachable statements and async misuse. It also extracts functions,
//! scoped symbol tables, imports and a cross-file dependency graph.
//!
//! When a file cannot be parsed cleanly, analysis degrades instead of
//! failing: a partial tree runs the same detectors with a confidence
//! penalty, and no tree at all falls back to text matching plus a
//! function-name heuristic.
//!
//! # Architecture
//!
//! - `registry`: language id to capability bundle (parser, hooks, vocabulary)
//! - `parser`: full / partial / failed parse outcomes and tree traversal
//! - `analysis`: functions, symbols, imports, dependency graph, languages
//! - `detect`: detector passes, keyword tables, text fallback
//! - `engine`: the [`Analyzer`] façade and tier controller
//! - `config`: YAML-backed [`EngineConfig`]
//! - `cli` / `report`: the `treescan` binary
//!
//! # Example
//!
//! ```no_run
//! use treescan::{CheckSet, Tier};
//!
//! treescan::init();
//! let source = "package main\n\nfunc main() {}\n";
//! let analysis = treescan::analyze_ast(source, "go", &CheckSet::all()).unwrap();
//! assert_eq!(analysis.stats.tier, Tier::Structural);
//! ```
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Build a `LanguageCapability`
//! and add it to `languages::register_all`.

pub mod analysis;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod parser;
pub mod registry;
pub mod report;

pub use analysis::{
    DependencyEdge, DependencyGraph, EdgeKind, FunctionInfo, GraphNode, ImportKind, ImportRef,
    ParameterInfo, SourceFile, Symbol, SymbolKind, SymbolTable, Visibility,
};
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use detect::{CheckKind, CheckSet, CrossFileFinding, Finding, FixType, Severity};
pub use engine::{Analysis, Analyzer, Stats, Tier};
pub use error::EngineError;
pub use registry::{register_builtin_languages, LanguageCapability, LanguageRegistry};

/// Initialize all subsystems.
///
/// Call this once at startup. Registers the built-in languages in the
/// process-wide registry; repeated calls are no-ops.
pub fn init() {
    register_builtin_languages();
}

/// [`Analyzer::analyze_ast`] with the global registry and default config.
pub fn analyze_ast(
    source: &str,
    language_id: &str,
    checks: &CheckSet,
) -> Result<Analysis, EngineError> {
    Analyzer::new().analyze_ast(source, language_id, checks)
}

/// [`Analyzer::analyze_ast_with_cancel`] with the global registry and default config.
pub fn analyze_ast_with_cancel(
    source: &str,
    language_id: &str,
    checks: &CheckSet,
    cancel: &CancellationToken,
) -> Result<Analysis, EngineError> {
    Analyzer::new().analyze_ast_with_cancel(source, language_id, checks, cancel)
}

pub fn extract_functions(
    source: &str,
    language_id: &str,
    name_filter: &str,
) -> Result<Vec<FunctionInfo>, EngineError> {
    Analyzer::new().extract_functions(source, language_id, name_filter)
}

pub fn extract_function_by_name(
    source: &str,
    language_id: &str,
    name: &str,
) -> Result<Option<FunctionInfo>, EngineError> {
    Analyzer::new().extract_function_by_name(source, language_id, name)
}

pub fn extract_symbols(source: &str, language_id: &str) -> SymbolTable {
    Analyzer::new().extract_symbols(source, language_id)
}

pub fn extract_imports(source: &str, language_id: &str) -> Vec<ImportRef> {
    Analyzer::new().extract_imports(source, language_id)
}

pub fn build_dependency_graph(files: &[SourceFile]) -> Result<DependencyGraph, EngineError> {
    Analyzer::new().build_dependency_graph(files)
}

/// [`Analyzer::analyze_cross_file`] with the global registry and default config.
pub fn analyze_cross_file(files: &[SourceFile], checks: &CheckSet) -> Result<Vec<CrossFileFinding>, EngineError> {
    Analyzer::new().analyze_cross_file(files, checks)
}
