//! Detector trait, per-call context and the ordered pipeline.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use once_cell::unsync::OnceCell;

use super::{CheckKind, CheckSet, Finding};
use crate::analysis::{build_symbol_table, collect_functions, FunctionInfo, SymbolTable};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::parser::SourceTree;
use crate::registry::LanguageCapability;

/// Everything a detector may look at for one file.
///
/// Function and symbol extraction are computed on first use and shared by
/// every pass of the call.
pub struct DetectContext<'a> {
    pub tree: &'a SourceTree,
    pub capability: &'a LanguageCapability,
    pub config: &'a EngineConfig,
    pub checks: &'a CheckSet,
    functions: OnceCell<Vec<FunctionInfo>>,
    symbols: OnceCell<SymbolTable>,
}

impl<'a> DetectContext<'a> {
    pub fn new(
        tree: &'a SourceTree,
        capability: &'a LanguageCapability,
        config: &'a EngineConfig,
        checks: &'a CheckSet,
    ) -> Self {
        Self {
            tree,
            capability,
            config,
            checks,
            functions: OnceCell::new(),
            symbols: OnceCell::new(),
        }
    }

    /// Named functions of the file, sorted by position.
    pub fn functions(&self) -> &[FunctionInfo] {
        self.functions
            .get_or_init(|| collect_functions(self.tree, self.capability))
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.symbols
            .get_or_init(|| build_symbol_table(self.tree, self.capability))
    }

    pub fn language(&self) -> &str {
        &self.capability.id
    }

    pub fn source(&self) -> &str {
        self.tree.source()
    }
}

/// One detection pass.
pub trait Detector: Send + Sync {
    /// Name used in logs and `Stats.detector_errors`.
    fn name(&self) -> &'static str;

    /// The check that enables this pass.
    fn check(&self) -> CheckKind;

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>>;
}

/// A finding tagged with the position of the pass that produced it.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub order: usize,
    pub finding: Finding,
}

/// Output of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub findings: Vec<Ranked>,
    /// Names of passes that failed.
    pub errors: Vec<String>,
}

/// Detection passes in registration order.
pub struct Pipeline {
    detectors: Vec<Box<dyn Detector>>,
}

impl Pipeline {
    /// The built-in passes.
    pub fn standard() -> Self {
        Self {
            detectors: vec![
                Box::new(super::middleware::MiddlewareDetector),
                Box::new(super::injection::SqlInjectionDetector),
                Box::new(super::injection::XssDetector),
                Box::new(super::injection::CommandInjectionDetector),
                Box::new(super::crypto::CryptoDetector),
                Box::new(super::secrets::SecretsDetector),
                Box::new(super::unused::UnusedDetector),
                Box::new(super::duplicates::DuplicatesDetector),
                Box::new(super::unreachable::UnreachableDetector),
                Box::new(super::async_misuse::AsyncMisuseDetector),
                Box::new(super::empty_catch::EmptyCatchDetector),
                Box::new(super::syntax::BraceMismatchDetector),
                Box::new(super::orphaned::OrphanedDetector),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Append a pass after the existing ones.
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every enabled pass in order.
    ///
    /// Cancellation is checked before each pass. A pass that errors or
    /// panics contributes nothing and is recorded in `errors`.
    pub fn run(
        &self,
        ctx: &DetectContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, EngineError> {
        let mut output = PipelineOutput::default();

        for (order, detector) in self.detectors.iter().enumerate() {
            if !ctx.checks.contains(detector.check()) {
                continue;
            }
            cancel.check()?;

            let result = catch_unwind(AssertUnwindSafe(|| detector.detect(ctx)));
            let failure = match result {
                Ok(Ok(findings)) => {
                    tracing::debug!(
                        detector = detector.name(),
                        count = findings.len(),
                        "detector finished"
                    );
                    output
                        .findings
                        .extend(findings.into_iter().map(|finding| Ranked { order, finding }));
                    None
                }
                Ok(Err(e)) => Some(format!("{e:#}")),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };

            if let Some(message) = failure {
                let error = EngineError::DetectorInternal {
                    detector: detector.name().to_string(),
                    message,
                };
                tracing::warn!(language = %ctx.language(), "{error}");
                output.errors.push(detector.name().to_string());
            }
        }

        Ok(output)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Merge findings sharing (kind, line) and sort them.
///
/// The survivor is the highest-confidence finding; reasonings of all merged
/// findings are joined. Ties on line are broken by the earliest contributing
/// pass.
pub fn merge(findings: Vec<Ranked>) -> Vec<Finding> {
    let mut groups: Vec<(usize, Finding, Vec<String>)> = Vec::new();
    let mut index: HashMap<(String, usize), usize> = HashMap::new();

    for Ranked { order, finding } in findings {
        let key = (finding.kind.clone(), finding.line);
        match index.get(&key) {
            Some(&slot) => {
                let (best_order, best, reasons) = &mut groups[slot];
                *best_order = (*best_order).min(order);
                if !finding.reasoning.is_empty() && !reasons.contains(&finding.reasoning) {
                    reasons.push(finding.reasoning.clone());
                }
                if finding.confidence > best.confidence {
                    *best = finding;
                }
            }
            None => {
                let reasons = if finding.reasoning.is_empty() {
                    Vec::new()
                } else {
                    vec![finding.reasoning.clone()]
                };
                index.insert(key, groups.len());
                groups.push((order, finding, reasons));
            }
        }
    }

    let mut merged: Vec<(usize, Finding)> = groups
        .into_iter()
        .map(|(order, mut finding, reasons)| {
            finding.reasoning = reasons.join("; ");
            (order, finding)
        })
        .collect();
    merged.sort_by(|(oa, a), (ob, b)| {
        a.line
            .cmp(&b.line)
            .then(oa.cmp(ob))
            .then(a.column.cmp(&b.column))
            .then(a.kind.cmp(&b.kind))
    });
    merged.into_iter().map(|(_, f)| f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;
    use crate::detect::Severity;
    use crate::parser::parse_with;

    struct Failing;

    impl Detector for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn check(&self) -> CheckKind {
            CheckKind::Unused
        }
        fn detect(&self, _ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    impl Detector for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn check(&self) -> CheckKind {
            CheckKind::Unused
        }
        fn detect(&self, _ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
            panic!("detector bug")
        }
    }

    struct Fixed;

    impl Detector for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn check(&self) -> CheckKind {
            CheckKind::Unused
        }
        fn detect(&self, _ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
            Ok(vec![Finding::new("fixed", Severity::Info, 1, "always")])
        }
    }

    fn ranked(order: usize, kind: &str, line: usize, confidence: f64, reason: &str) -> Ranked {
        Ranked {
            order,
            finding: Finding::new(kind, Severity::Info, line, "m")
                .with_confidence(confidence)
                .with_reasoning(reason),
        }
    }

    #[test]
    fn test_failing_detectors_are_isolated() {
        let cap = languages::go::capability().unwrap();
        let outcome = parse_with("package main\n", &cap);
        let tree = outcome.tree().unwrap();
        let config = EngineConfig::default();
        let checks = CheckSet::all();
        let ctx = DetectContext::new(tree, &cap, &config, &checks);

        let pipeline = Pipeline::empty()
            .with_detector(Box::new(Failing))
            .with_detector(Box::new(Panicking))
            .with_detector(Box::new(Fixed));
        let output = pipeline.run(&ctx, &CancellationToken::new()).unwrap();

        assert_eq!(output.errors, vec!["failing", "panicking"]);
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].order, 2);
    }

    #[test]
    fn test_cancelled_before_first_pass() {
        let cap = languages::go::capability().unwrap();
        let outcome = parse_with("package main\n", &cap);
        let tree = outcome.tree().unwrap();
        let config = EngineConfig::default();
        let checks = CheckSet::all();
        let ctx = DetectContext::new(tree, &cap, &config, &checks);

        let token = CancellationToken::new();
        token.cancel();
        let result = Pipeline::empty().with_detector(Box::new(Fixed)).run(&ctx, &token);
        assert_eq!(result.unwrap_err(), EngineError::Cancelled);
    }

    #[test]
    fn test_merge_keeps_best_and_joins_reasoning() {
        let merged = merge(vec![
            ranked(3, "jwt_middleware", 10, 0.75, "nested"),
            ranked(0, "jwt_middleware", 10, 0.85, "outer"),
            ranked(1, "sql_injection", 4, 0.9, "concat"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, "sql_injection");
        assert_eq!(merged[1].confidence, 0.85);
        assert_eq!(merged[1].reasoning, "nested; outer");
    }

    #[test]
    fn test_merge_orders_same_line_by_pass() {
        let merged = merge(vec![
            ranked(5, "b_kind", 7, 0.5, ""),
            ranked(2, "a_kind", 7, 0.5, ""),
        ]);
        assert_eq!(merged[0].kind, "a_kind");
        assert_eq!(merged[1].kind, "b_kind");
    }
}
