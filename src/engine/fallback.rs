//! Tier controller: structural or partial tree passes, the generic text
//! matcher when no tree exists, and the name-heuristic complement.
//!
//! Transitions only go downward; a tier is never retried.

use super::stats::Tier;
use crate::analysis::{extract_text_functions, FunctionSpan};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::detect::{complement, detect_text, CheckKind, CheckSet, DetectContext, Pipeline, Ranked};
use crate::error::EngineError;
use crate::parser::SourceTree;
use crate::registry::{LanguageCapability, LanguageRegistry};

/// Reasoning note attached to every finding from a partial tree.
pub const PARTIAL_NOTE: &str = "partial-parse: syntax errors were recovered";

/// Position of the middleware pass; heuristic findings sort with it.
const ORDER_MIDDLEWARE: usize = 0;

/// Findings of one tier before merging.
pub(crate) struct TierResult {
    pub tier: Tier,
    pub findings: Vec<Ranked>,
    pub detector_errors: Vec<String>,
    /// Function ranges for the heuristic; empty when it is not requested.
    pub spans: Vec<FunctionSpan>,
}

/// Run the pipeline over a tree. `partial` applies the confidence penalty.
pub(crate) fn run_tree(
    tree: &SourceTree,
    capability: &LanguageCapability,
    config: &EngineConfig,
    checks: &CheckSet,
    pipeline: &Pipeline,
    cancel: &CancellationToken,
    partial: bool,
) -> Result<TierResult, EngineError> {
    let ctx = DetectContext::new(tree, capability, config, checks);
    let output = pipeline.run(&ctx, cancel)?;

    let mut findings = output.findings;
    let tier = if partial {
        for ranked in &mut findings {
            ranked.finding.confidence *= config.partial_penalty;
            ranked.finding.note(PARTIAL_NOTE);
        }
        Tier::Partial
    } else {
        Tier::Structural
    };

    let spans = if checks.contains(CheckKind::SecurityMiddleware) {
        ctx.functions().iter().map(FunctionSpan::from).collect()
    } else {
        Vec::new()
    };

    Ok(TierResult {
        tier,
        findings,
        detector_errors: output.errors,
        spans,
    })
}

/// Text matching over raw source, using the qualified sinks of every
/// registered language.
pub(crate) fn run_generic(
    source: &str,
    registry: &LanguageRegistry,
    config: &EngineConfig,
    checks: &CheckSet,
) -> TierResult {
    let capabilities = registry.capabilities();
    let sinks: Vec<_> = capabilities.iter().map(|c| c.detector.sinks()).collect();
    let spans = if checks.contains(CheckKind::SecurityMiddleware) {
        extract_text_functions(source)
    } else {
        Vec::new()
    };
    let findings = detect_text(source, &spans, checks, &sinks, config);

    TierResult {
        tier: Tier::Generic,
        findings,
        detector_errors: Vec::new(),
        spans,
    }
}

/// Add name-heuristic suggestions to a tier's findings.
///
/// Returns how many findings were added. A generic tier that found nothing
/// becomes heuristic-only once a suggestion lands.
pub(crate) fn apply_heuristic(result: &mut TierResult, config: &EngineConfig) -> usize {
    if result.spans.is_empty() {
        return 0;
    }

    let (orders, mut findings): (Vec<usize>, Vec<_>) = result
        .findings
        .drain(..)
        .map(|r| (r.order, r.finding))
        .unzip();
    let added = complement(&result.spans, &mut findings, config);
    let count = added.len();

    if result.tier == Tier::Generic && findings.is_empty() && count > 0 {
        result.tier = Tier::HeuristicOnly;
    }

    result.findings = orders
        .into_iter()
        .zip(findings)
        .map(|(order, finding)| Ranked { order, finding })
        .chain(added.into_iter().map(|finding| Ranked {
            order: ORDER_MIDDLEWARE,
            finding,
        }))
        .collect();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;
    use crate::detect::{Finding, Severity};
    use crate::parser::parse_with;

    fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        languages::register_all(&registry);
        registry
    }

    #[test]
    fn test_partial_penalty_and_note() {
        let cap = languages::python::capability().unwrap();
        let source = "import hashlib\n\ndef digest(data):\n    return hashlib.md5(data)\n\ndef broken(:\n    pass\n";
        let outcome = parse_with(source, &cap);
        let tree = outcome.tree().unwrap();
        let config = EngineConfig::default();
        let checks = CheckSet::only(&[CheckKind::CryptoMisuse]);

        let full = run_tree(
            tree,
            &cap,
            &config,
            &checks,
            &Pipeline::standard(),
            &CancellationToken::new(),
            false,
        )
        .unwrap();
        let partial = run_tree(
            tree,
            &cap,
            &config,
            &checks,
            &Pipeline::standard(),
            &CancellationToken::new(),
            true,
        )
        .unwrap();

        assert_eq!(partial.tier, Tier::Partial);
        assert_eq!(full.findings.len(), partial.findings.len());
        for (f, p) in full.findings.iter().zip(&partial.findings) {
            let expected = f.finding.confidence * config.partial_penalty;
            assert!((p.finding.confidence - expected).abs() < 1e-9);
            assert!(p.finding.reasoning.contains(PARTIAL_NOTE));
        }
    }

    #[test]
    fn test_heuristic_only_when_text_finds_nothing() {
        let config = EngineConfig::default();
        let checks = CheckSet::only(&[CheckKind::SecurityMiddleware]);
        let source = "fn requireAuth(ctx) {\n    next(ctx)\n}\n";

        let mut result = run_generic(source, &registry(), &config, &checks);
        assert!(result.findings.is_empty());
        let added = apply_heuristic(&mut result, &config);

        assert_eq!(added, 1);
        assert_eq!(result.tier, Tier::HeuristicOnly);
        assert_eq!(result.findings[0].finding.kind, "generic_middleware");
    }

    #[test]
    fn test_heuristic_skipped_without_spans() {
        let config = EngineConfig::default();
        let mut result = TierResult {
            tier: Tier::Generic,
            findings: vec![Ranked {
                order: 5,
                finding: Finding::new("hardcoded_secret", Severity::Critical, 2, "m"),
            }],
            detector_errors: Vec::new(),
            spans: Vec::new(),
        };
        assert_eq!(apply_heuristic(&mut result, &config), 0);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.tier, Tier::Generic);
    }
}
