//! Name heuristic for middleware the other tiers missed.

use super::tables::{GENERIC_MIDDLEWARE, GENERIC_MIDDLEWARE_FRAGMENTS, SCHEME_RULES};
use super::{Finding, Severity};
use crate::analysis::FunctionSpan;
use crate::config::EngineConfig;

/// Confidence of a name hit on a scheme-specific fragment.
const SCHEME_NAME_CONFIDENCE: f64 = 0.6;

const AGREEMENT_NOTE: &str = "function name agrees";

/// Middleware findings suggested by function names alone.
///
/// A suggestion is dropped when a middleware finding already lies inside the
/// function; a finding of the same kind there gains a note instead.
pub fn complement(
    spans: &[FunctionSpan],
    existing: &mut [Finding],
    config: &EngineConfig,
) -> Vec<Finding> {
    let mut added = Vec::new();

    for span in spans {
        let Some(candidate) = suggest(span, config) else {
            continue;
        };

        let mut covered = false;
        for finding in existing
            .iter_mut()
            .filter(|f| f.is_middleware() && span.contains_line(f.line))
        {
            covered = true;
            if finding.kind == candidate.kind {
                finding.note(AGREEMENT_NOTE);
            }
        }
        if !covered {
            added.push(candidate);
        }
    }

    added
}

fn suggest(span: &FunctionSpan, config: &EngineConfig) -> Option<Finding> {
    let name_lower = span.name.to_lowercase();

    let (kind, scheme, confidence) = if let Some(rule) =
        SCHEME_RULES.iter().find(|rule| rule.name_matches(&name_lower))
    {
        (rule.kind, rule.scheme, SCHEME_NAME_CONFIDENCE)
    } else if GENERIC_MIDDLEWARE_FRAGMENTS
        .iter()
        .any(|f| name_lower.contains(f))
    {
        (GENERIC_MIDDLEWARE, "Middleware", config.heuristic_confidence)
    } else {
        return None;
    };

    Some(
        Finding::new(
            kind,
            Severity::Info,
            span.start_line,
            format!("Possible security middleware: {scheme}"),
        )
        .with_end(span.end_line, 1)
        .with_scheme(scheme)
        .with_suggestion(format!("Confirm `{}` enforces {scheme}", span.name))
        .with_confidence(confidence)
        .with_reasoning(format!("function name `{}` suggests {scheme}", span.name)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str, start: usize, end: usize) -> FunctionSpan {
        FunctionSpan {
            name: name.to_string(),
            start_line: start,
            end_line: end,
        }
    }

    #[test]
    fn test_name_fragments() {
        let spans = [
            span("verifyJWT", 1, 5),
            span("authGuard", 7, 9),
            span("render", 11, 12),
        ];
        let added = complement(&spans, &mut [], &EngineConfig::default());
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].kind, "jwt_middleware");
        assert_eq!(added[0].confidence, 0.6);
        assert_eq!(added[1].kind, GENERIC_MIDDLEWARE);
        assert_eq!(added[1].confidence, 0.55);
        assert_eq!(added[1].line, 7);
    }

    #[test]
    fn test_existing_finding_suppresses_and_gains_note() {
        let mut existing = vec![Finding::new("jwt_middleware", Severity::Info, 3, "m")
            .with_confidence(0.85)
            .with_reasoning("header literal and keyword")];
        let added = complement(&[span("checkToken", 1, 6)], &mut existing, &EngineConfig::default());
        assert!(added.is_empty());
        assert!(existing[0].reasoning.ends_with(AGREEMENT_NOTE));
    }

    #[test]
    fn test_other_kind_in_range_only_suppresses() {
        let mut existing = vec![Finding::new("cors_middleware", Severity::Info, 2, "m")];
        let added = complement(&[span("authenticate", 1, 4)], &mut existing, &EngineConfig::default());
        assert!(added.is_empty());
        assert!(existing[0].reasoning.is_empty());
    }
}
