//! Analysis façade.
//!
//! [`Analyzer`] ties a registry and an [`EngineConfig`] together and exposes
//! the public entry points. Each call parses once, runs the tier sequence,
//! then merges and normalizes the findings. Nothing is cached between calls.

mod fallback;
mod stats;

pub use fallback::PARTIAL_NOTE;
pub use stats::{Stats, Tier};

use std::time::Instant;

use serde::Serialize;

use crate::analysis::{
    self, build_symbol_table, collect_functions, filter_by_name, DependencyGraph, FunctionInfo,
    ImportRef, SourceFile, SymbolTable,
};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::detect::{
    analyze_cross_file, apply_edge_case_penalty, finalize, merge, CheckSet, CrossFileFinding, EdgeCases,
    Finding, Pipeline,
};
use crate::error::EngineError;
use crate::parser::{parse_with, ParseOutcome, SourceTree};
use crate::registry::{self, LanguageCapability, LanguageRegistry};

/// Findings of one call plus how they were obtained.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// Sorted by line, then by detector order.
    pub findings: Vec<Finding>,
    pub stats: Stats,
}

/// Entry point for analysis and extraction.
pub struct Analyzer<'r> {
    registry: &'r LanguageRegistry,
    config: EngineConfig,
    pipeline: Pipeline,
}

impl Analyzer<'static> {
    /// Analyzer over the process-wide registry with the default config.
    ///
    /// Languages must have been registered with [`crate::init`].
    pub fn new() -> Self {
        Self::with_registry(registry::global())
    }
}

impl Default for Analyzer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Analyzer<'r> {
    pub fn with_registry(registry: &'r LanguageRegistry) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            pipeline: Pipeline::standard(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the detector passes.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        self.registry
    }

    /// Run the requested checks over one source unit.
    ///
    /// An empty check set means the config's default checks. Only a
    /// zero-length source is an error; unknown languages and unparsable
    /// input degrade to the text tiers.
    pub fn analyze_ast(
        &self,
        source: &str,
        language_id: &str,
        checks: &CheckSet,
    ) -> Result<Analysis, EngineError> {
        self.analyze_ast_with_cancel(source, language_id, checks, &CancellationToken::new())
    }

    pub fn analyze_ast_with_cancel(
        &self,
        source: &str,
        language_id: &str,
        checks: &CheckSet,
        cancel: &CancellationToken,
    ) -> Result<Analysis, EngineError> {
        if source.is_empty() {
            return Err(EngineError::EmptySource);
        }
        cancel.check()?;

        let default_checks;
        let checks = if checks.is_empty() {
            default_checks = self.config.default_check_set();
            &default_checks
        } else {
            checks
        };

        let capability = self.registry.resolve(language_id);
        let started = Instant::now();
        let outcome = match &capability {
            Some(cap) => parse_with(source, cap),
            None => ParseOutcome::Failed(EngineError::UnsupportedLanguage(language_id.to_string())),
        };
        let parse_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let mut node_count = 0;
        let mut diagnostics = Vec::new();
        let mut result = match (&outcome, &capability) {
            (ParseOutcome::Full(tree), Some(cap)) => {
                tracing::debug!(language = %language_id, tier = "structural", "tier selected");
                node_count = tree.node_count();
                fallback::run_tree(tree, cap, &self.config, checks, &self.pipeline, cancel, false)?
            }
            (ParseOutcome::Partial(tree, diags), Some(cap)) => {
                tracing::info!(
                    language = %language_id,
                    errors = diags.len(),
                    "partial tree, running detectors with confidence penalty"
                );
                node_count = tree.node_count();
                diagnostics = diags.iter().map(ToString::to_string).collect();
                fallback::run_tree(tree, cap, &self.config, checks, &self.pipeline, cancel, true)?
            }
            (ParseOutcome::Failed(reason), _) => {
                cancel.check()?;
                tracing::info!(language = %language_id, reason = %reason, "no tree, falling back to text matching");
                fallback::run_generic(source, self.registry, &self.config, checks)
            }
            // A tree without a capability cannot be produced.
            (_, None) => fallback::run_generic(source, self.registry, &self.config, checks),
        };

        let heuristic_count = fallback::apply_heuristic(&mut result, &self.config);
        if result.tier == Tier::HeuristicOnly {
            tracing::info!(language = %language_id, count = heuristic_count, "only name heuristics matched");
        }

        let mut findings = merge(result.findings);
        let edge_cases = EdgeCases::scan(source, language_id);
        if edge_cases.generated {
            tracing::debug!(language = %language_id, "generated file, auto-fix disabled");
        }
        apply_edge_case_penalty(&mut findings, &edge_cases);
        finalize(&mut findings, &edge_cases);

        let mut stats = Stats::new(language_id, result.tier);
        stats.parse_micros = parse_micros;
        stats.node_count = node_count;
        stats.finding_count = findings.len();
        stats.heuristic_count = heuristic_count;
        stats.diagnostics = diagnostics;
        stats.detector_errors = result.detector_errors;

        Ok(Analysis { findings, stats })
    }

    /// Functions whose name contains `name_filter` (case-insensitive),
    /// sorted by start line. An empty filter returns every function.
    ///
    /// Unsupported languages and unparsable input give an empty list.
    pub fn extract_functions(
        &self,
        source: &str,
        language_id: &str,
        name_filter: &str,
    ) -> Result<Vec<FunctionInfo>, EngineError> {
        let functions = self
            .with_tree(source, language_id, "functions", |tree, cap| {
                collect_functions(tree, cap)
            })
            .unwrap_or_default();
        Ok(filter_by_name(functions, name_filter))
    }

    /// The first function named exactly `name`.
    pub fn extract_function_by_name(
        &self,
        source: &str,
        language_id: &str,
        name: &str,
    ) -> Result<Option<FunctionInfo>, EngineError> {
        Ok(self
            .extract_functions(source, language_id, name)?
            .into_iter()
            .find(|f| f.name == name))
    }

    /// Scoped symbol table of one file; empty when no tree is available.
    pub fn extract_symbols(&self, source: &str, language_id: &str) -> SymbolTable {
        self.with_tree(source, language_id, "symbols", |tree, cap| {
            build_symbol_table(tree, cap)
        })
        .unwrap_or_else(|| SymbolTable::empty(language_id))
    }

    /// Import references in source order.
    pub fn extract_imports(&self, source: &str, language_id: &str) -> Vec<ImportRef> {
        self.with_tree(source, language_id, "imports", |tree, cap| {
            match cap.extractor.imports(tree) {
                Ok(imports) => imports,
                Err(e) => {
                    tracing::warn!(language = %language_id, "import query failed: {e:#}");
                    Vec::new()
                }
            }
        })
        .unwrap_or_default()
    }

    pub fn build_dependency_graph(&self, files: &[SourceFile]) -> Result<DependencyGraph, EngineError> {
        analysis::build_dependency_graph(files, self.registry, None)
    }

    pub fn build_dependency_graph_with_cancel(
        &self,
        files: &[SourceFile],
        cancel: &CancellationToken,
    ) -> Result<DependencyGraph, EngineError> {
        analysis::build_dependency_graph(files, self.registry, Some(cancel))
    }

    /// Re-extract one file and replace its edges in `graph`.
    pub fn update_file(&self, graph: &mut DependencyGraph, file: &SourceFile) {
        graph.update_file(file, self.registry);
    }

    /// Cross-file checks (unused exports, undefined imported names, import
    /// cycles, duplicate function names) over an already built graph.
    pub fn analyze_graph(&self, graph: &DependencyGraph, checks: &CheckSet) -> Vec<CrossFileFinding> {
        analyze_cross_file(graph, checks, &self.config)
    }

    /// Build the graph of `files`, then run the cross-file checks.
    pub fn analyze_cross_file(
        &self,
        files: &[SourceFile],
        checks: &CheckSet,
    ) -> Result<Vec<CrossFileFinding>, EngineError> {
        let graph = self.build_dependency_graph(files)?;
        Ok(self.analyze_graph(&graph, checks))
    }

    /// Parse and run `f` on the tree, or warn and return `None`.
    fn with_tree<T>(
        &self,
        source: &str,
        language_id: &str,
        what: &str,
        f: impl FnOnce(&SourceTree, &LanguageCapability) -> T,
    ) -> Option<T> {
        if source.is_empty() {
            return None;
        }
        let Some(capability) = self.registry.resolve(language_id) else {
            tracing::warn!(language = %language_id, "cannot extract {what}: unsupported language");
            return None;
        };
        match parse_with(source, &capability) {
            ParseOutcome::Full(tree) | ParseOutcome::Partial(tree, _) => Some(f(&tree, &capability)),
            ParseOutcome::Failed(reason) => {
                tracing::warn!(language = %language_id, "cannot extract {what}: {reason}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;
    use crate::detect::{CheckKind, Detector, DetectContext, Severity};

    fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        languages::register_all(&registry);
        registry
    }

    struct Boom;

    impl Detector for Boom {
        fn name(&self) -> &'static str {
            "boom"
        }
        fn check(&self) -> CheckKind {
            CheckKind::Unused
        }
        fn detect(&self, _ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
            anyhow::bail!("exploded")
        }
    }

    #[test]
    fn test_empty_source_is_error() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let err = analyzer.analyze_ast("", "go", &CheckSet::all()).unwrap_err();
        assert_eq!(err, EngineError::EmptySource);
    }

    #[test]
    fn test_whitespace_is_ok() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let analysis = analyzer.analyze_ast("   \n\t\n", "python", &CheckSet::all()).unwrap();
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn test_cancelled_call() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let token = CancellationToken::new();
        token.cancel();
        let err = analyzer
            .analyze_ast_with_cancel("package main\n", "go", &CheckSet::all(), &token)
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }

    #[test]
    fn test_detector_error_recorded() {
        let registry = registry();
        let analyzer =
            Analyzer::with_registry(&registry).with_pipeline(Pipeline::empty().with_detector(Box::new(Boom)));
        let analysis = analyzer
            .analyze_ast("package main\n\nfunc main() {}\n", "go", &CheckSet::all())
            .unwrap();
        assert_eq!(analysis.stats.tier, Tier::Structural);
        assert_eq!(analysis.stats.detector_errors, vec!["boom"]);
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn test_unknown_language_goes_generic() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let source = "const password = \"hunter2hunter2\"\n";
        let analysis = analyzer
            .analyze_ast(source, "cobol", &CheckSet::only(&[CheckKind::Secrets]))
            .unwrap();
        assert_eq!(analysis.stats.tier, Tier::Generic);
        assert_eq!(analysis.stats.node_count, 0);
        for finding in &analysis.findings {
            assert!(finding.confidence <= analyzer.config().generic_cap);
        }
    }

    #[test]
    fn test_findings_finalized() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let source = "import hashlib\n\ndef digest(data):\n    return hashlib.md5(data).hexdigest()\n";
        let analysis = analyzer
            .analyze_ast(source, "python", &CheckSet::only(&[CheckKind::CryptoMisuse]))
            .unwrap();
        assert_eq!(analysis.stats.finding_count, analysis.findings.len());
        let finding = analysis
            .findings
            .iter()
            .find(|f| f.kind == "insecure_crypto")
            .expect("md5 should be reported");
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.fix_type, crate::detect::FixType::Rewrite);
        assert!(!finding.auto_fix_safe);
    }

    #[test]
    fn test_local_unused_variable_is_auto_fix_safe() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let source = "def total(items):\n    count = len(items)\n    return sum(items)\n";
        let analysis = analyzer
            .analyze_ast(source, "python", &CheckSet::only(&[CheckKind::Unused]))
            .unwrap();
        let finding = analysis
            .findings
            .iter()
            .find(|f| f.kind == "unused_variable")
            .expect("count is never read");
        assert_eq!(finding.confidence, 0.95);
        assert_eq!(finding.fix_type, crate::detect::FixType::Delete);
        assert!(finding.auto_fix_safe);
    }

    #[test]
    fn test_generated_go_file_is_never_auto_fixed() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let body = "package gen\n\nfunc value() int {\n\treturn 1\n\tprintln(\"late\")\n}\n";
        let checks = CheckSet::only(&[CheckKind::Unreachable]);

        let plain = analyzer.analyze_ast(body, "go", &checks).unwrap();
        assert!(plain.findings.iter().any(|f| f.kind == "unreachable_code" && f.auto_fix_safe));

        let generated = format!("// Code generated by stringer. DO NOT EDIT.\n\n{body}");
        let analysis = analyzer.analyze_ast(&generated, "go", &checks).unwrap();
        let finding = analysis
            .findings
            .iter()
            .find(|f| f.kind == "unreachable_code")
            .expect("dead println is still reported");
        assert!(finding.confidence < 0.95);
        assert!(!finding.auto_fix_safe);
        assert!(finding.reasoning.contains("generated"));
    }

    #[test]
    fn test_cross_file_uses_config_exclusions() {
        let registry = registry();
        let files = vec![
            SourceFile::new("a.py", "def setup():\n    pass\n", "python"),
            SourceFile::new("b.py", "def setup():\n    pass\n", "python"),
        ];
        let checks = CheckSet::only(&[CheckKind::CrossFileDuplicates]);

        let analyzer = Analyzer::with_registry(&registry);
        let found = analyzer.analyze_cross_file(&files, &checks).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, "a.py");

        let config = EngineConfig {
            excluded_functions: vec!["setup".to_string()],
            ..EngineConfig::default()
        };
        let analyzer = Analyzer::with_registry(&registry).with_config(config);
        assert!(analyzer.analyze_cross_file(&files, &checks).unwrap().is_empty());
    }

    #[test]
    fn test_extract_functions_filter() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let source = "def load_user():\n    pass\n\ndef save_user():\n    pass\n\ndef main():\n    pass\n";
        let all = analyzer.extract_functions(source, "python", "").unwrap();
        assert_eq!(all.len(), 3);
        let users = analyzer.extract_functions(source, "python", "USER").unwrap();
        let names: Vec<_> = users.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["load_user", "save_user"]);

        let exact = analyzer.extract_function_by_name(source, "python", "main").unwrap();
        assert_eq!(exact.map(|f| f.start_line), Some(7));
        assert!(analyzer
            .extract_function_by_name(source, "python", "user")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_extraction_on_unsupported_language_is_empty() {
        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        assert!(analyzer.extract_functions("x", "cobol", "").unwrap().is_empty());
        assert!(analyzer.extract_symbols("x", "cobol").is_empty());
        assert!(analyzer.extract_imports("x", "cobol").is_empty());
    }
}
