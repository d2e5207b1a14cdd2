//! Confidence adjustments and fix metadata applied after merging.

use super::tables::{dynamic_code_markers, is_generated};
use super::{Finding, FixType};

/// Kinds whose evidence is undermined by reflection and dynamic imports.
const DYNAMIC_SENSITIVE: &[&str] = &["unused_variable", "orphaned_code"];

const EDGE_CASE_PENALTY: f64 = 0.8;

/// Cleanup suggestions in generated files are overwritten on regeneration.
const GENERATED_PENALTY: f64 = 0.5;

/// Confidence at or above which a deletion may be applied without review.
const AUTO_FIX_THRESHOLD: f64 = 0.95;

/// What the source text says about how far its findings can be trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCases {
    /// First reflection or dynamic loading marker found.
    pub dynamic_marker: Option<&'static str>,
    /// The file carries a code generation header.
    pub generated: bool,
}

impl EdgeCases {
    pub fn scan(source: &str, language: &str) -> Self {
        Self {
            dynamic_marker: dynamic_code_markers(language)
                .iter()
                .copied()
                .find(|m| source.contains(m)),
            generated: is_generated(source),
        }
    }
}

/// Lower confidence of dead-code findings in files that use reflection or
/// dynamic code loading, and of cleanup findings in generated files.
pub fn apply_edge_case_penalty(findings: &mut [Finding], edge_cases: &EdgeCases) {
    if let Some(marker) = edge_cases.dynamic_marker {
        for finding in findings
            .iter_mut()
            .filter(|f| DYNAMIC_SENSITIVE.contains(&f.kind.as_str()))
        {
            finding.confidence *= EDGE_CASE_PENALTY;
            finding.note(&format!("dynamic code (`{marker}`) may use this indirectly"));
        }
    }
    if edge_cases.generated {
        for finding in findings
            .iter_mut()
            .filter(|f| matches!(fix_type_for(&f.kind), FixType::Delete | FixType::Refactor))
        {
            finding.confidence *= GENERATED_PENALTY;
            finding.note("generated file, edit the generator instead");
        }
    }
}

pub fn fix_type_for(kind: &str) -> FixType {
    match kind {
        "unused_variable" | "unreachable_code" | "orphaned_code" | "unused_export" => FixType::Delete,
        "duplicate_function" | "cross_file_duplicate" | "circular_dependency" => FixType::Refactor,
        "sql_injection" | "xss" | "command_injection" | "insecure_crypto" | "hardcoded_secret" => {
            FixType::Rewrite
        }
        _ => FixType::Manual,
    }
}

/// Clamp and round confidence, then derive `fix_type` and `auto_fix_safe`.
/// Nothing in a generated file is safe to fix automatically.
pub fn finalize(findings: &mut [Finding], edge_cases: &EdgeCases) {
    for finding in findings {
        finding.confidence = round3(finding.confidence.clamp(0.0, 1.0));
        finding.fix_type = fix_type_for(&finding.kind);
        finding.auto_fix_safe = !edge_cases.generated
            && finding.fix_type == FixType::Delete
            && finding.confidence >= AUTO_FIX_THRESHOLD;
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Severity;

    fn finding(kind: &str, confidence: f64) -> Finding {
        Finding::new(kind, Severity::Warning, 1, "m").with_confidence(confidence)
    }

    #[test]
    fn test_penalty_only_with_dynamic_code() {
        let mut findings = vec![finding("unused_variable", 0.9), finding("sql_injection", 0.9)];
        apply_edge_case_penalty(&mut findings, &EdgeCases::scan("x := 1", "go"));
        assert_eq!(findings[0].confidence, 0.9);

        apply_edge_case_penalty(&mut findings, &EdgeCases::scan("v := reflect.ValueOf(x)", "go"));
        assert!((findings[0].confidence - 0.72).abs() < 1e-9);
        assert!(findings[0].reasoning.contains("reflect."));
        assert_eq!(findings[1].confidence, 0.9);
    }

    #[test]
    fn test_fix_metadata() {
        let mut findings = vec![
            finding("unreachable_code", 0.96),
            finding("unused_variable", 0.9),
            finding("duplicate_function", 0.99),
            finding("xss", 0.85),
            finding("jwt_middleware", 0.95),
        ];
        finalize(&mut findings, &EdgeCases::default());
        assert!(findings[0].auto_fix_safe);
        assert_eq!(findings[1].fix_type, FixType::Delete);
        assert!(!findings[1].auto_fix_safe);
        assert_eq!(findings[2].fix_type, FixType::Refactor);
        assert!(!findings[2].auto_fix_safe);
        assert_eq!(findings[3].fix_type, FixType::Rewrite);
        assert_eq!(findings[4].fix_type, FixType::Manual);
    }

    #[test]
    fn test_finalize_rounds_and_clamps() {
        let mut findings = vec![finding("a", 0.123456), finding("b", 1.4)];
        finalize(&mut findings, &EdgeCases::default());
        assert_eq!(findings[0].confidence, 0.123);
        assert_eq!(findings[1].confidence, 1.0);
    }

    #[test]
    fn test_generated_file_is_penalized_and_never_auto_fixed() {
        let source = "// Code generated by mockgen. DO NOT EDIT.\npackage mocks\n";
        let edge_cases = EdgeCases::scan(source, "go");
        assert!(edge_cases.generated);
        assert_eq!(edge_cases.dynamic_marker, None);

        let mut findings = vec![finding("unreachable_code", 0.95), finding("sql_injection", 0.9)];
        apply_edge_case_penalty(&mut findings, &edge_cases);
        finalize(&mut findings, &edge_cases);
        assert_eq!(findings[0].confidence, 0.475);
        assert!(findings[0].reasoning.contains("generated"));
        assert!(!findings[0].auto_fix_safe);
        assert_eq!(findings[1].confidence, 0.9);
    }

    #[test]
    fn test_generated_file_blocks_auto_fix_even_at_full_confidence() {
        let edge_cases = EdgeCases { dynamic_marker: None, generated: true };
        let mut findings = vec![finding("unused_variable", 1.0)];
        finalize(&mut findings, &edge_cases);
        assert_eq!(findings[0].fix_type, FixType::Delete);
        assert!(!findings[0].auto_fix_safe);
    }
}
