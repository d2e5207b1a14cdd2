//! Integration tests for the analysis façade.
//!
//! These tests validate tier selection, determinism and degradation
//! behavior of `analyze_ast` against the testdata fixtures.

use std::collections::BTreeSet;
use std::path::PathBuf;

use treescan::{Analyzer, CheckKind, CheckSet, EngineError, Tier};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn setup() {
    treescan::init();
}

fn auth_middleware_source() -> String {
    std::fs::read_to_string(testdata_path().join("auth_middleware.go"))
        .expect("should read auth_middleware.go")
}

/// Line of the `strings.HasPrefix` check in the fixture.
fn has_prefix_line(source: &str) -> usize {
    source
        .lines()
        .position(|l| l.contains("strings.HasPrefix"))
        .map(|i| i + 1)
        .expect("fixture should contain strings.HasPrefix")
}

// =============================================================================
// Middleware scenarios
// =============================================================================

#[test]
fn test_auth_middleware_structural() {
    setup();
    let source = auth_middleware_source();

    let analysis = treescan::analyze_ast(&source, "go", &CheckSet::all()).unwrap();

    assert_eq!(analysis.stats.tier, Tier::Structural);
    let jwt: Vec<_> = analysis
        .findings
        .iter()
        .filter(|f| f.kind == "jwt_middleware")
        .collect();
    assert_eq!(jwt.len(), 1, "findings: {:?}", analysis.findings);
    assert!(jwt[0].confidence >= 0.7);
    assert_eq!(jwt[0].line, has_prefix_line(&source));
    assert_eq!(jwt[0].scheme.as_deref(), Some("BearerAuth"));
    assert_eq!(analysis.stats.heuristic_count, 0);
}

#[test]
fn test_auth_middleware_unregistered_language() {
    setup();
    let source = auth_middleware_source();

    let analysis = treescan::analyze_ast(&source, "golang-next", &CheckSet::all()).unwrap();

    assert_eq!(analysis.stats.tier, Tier::Generic);
    assert_eq!(analysis.stats.node_count, 0);
    let jwt: Vec<_> = analysis
        .findings
        .iter()
        .filter(|f| f.kind == "jwt_middleware")
        .collect();
    assert_eq!(jwt.len(), 1, "findings: {:?}", analysis.findings);
    assert!(jwt[0].confidence <= 0.75);
}

#[test]
fn test_fallback_monotonicity() {
    setup();
    let source = auth_middleware_source();
    let checks = CheckSet::from_names(["security"].as_slice());

    let structural = treescan::analyze_ast(&source, "go", &checks).unwrap();
    let generic = treescan::analyze_ast(&source, "unregistered", &checks).unwrap();

    assert!(generic.findings.len() <= structural.findings.len());
    let structural_kinds: BTreeSet<_> = structural.findings.iter().map(|f| f.kind.as_str()).collect();
    for finding in &generic.findings {
        assert!(structural_kinds.contains(finding.kind.as_str()));
        assert!(finding.confidence <= 0.75);
    }
}

/// Header check and bearer keyword live in different functions.
const SPLIT_EVIDENCE_GO: &str = r#"package main

import "net/http"

func readHeader(r *http.Request) string {
	return r.Header.Get("Authorization")
}

func describe() string {
	return "expects a Bearer credential"
}
"#;

/// `execute` is a Python driver method; Go code calling it is not a sink.
const FOREIGN_SINK_GO: &str = r#"package main

func run(r Runner, id string) {
	r.execute("SELECT * FROM users WHERE id = " + id)
}
"#;

const MD5_PY: &str = "import hashlib\n\ndef digest(data):\n    return hashlib.md5(data).hexdigest()\n";

const FSTRING_SQL_PY: &str = "def find(cursor, name):\n    cursor.execute(f\"SELECT * FROM users WHERE name = '{name}'\")\n";

#[test]
fn test_fallback_monotonicity_across_sources() {
    setup();
    let checks = CheckSet::only(&[
        CheckKind::SecurityMiddleware,
        CheckKind::SqlInjection,
        CheckKind::Xss,
        CheckKind::CommandInjection,
        CheckKind::CryptoMisuse,
    ]);
    let fixture = auth_middleware_source();
    let handlers = std::fs::read_to_string(testdata_path().join("handlers.py")).unwrap();
    let cases = [
        ("fixture", fixture.as_str(), "go"),
        ("split evidence", SPLIT_EVIDENCE_GO, "go"),
        ("foreign sink", FOREIGN_SINK_GO, "go"),
        ("md5", MD5_PY, "python"),
        ("f-string sql", FSTRING_SQL_PY, "python"),
        ("handlers", handlers.as_str(), "python"),
    ];

    for (label, source, language) in cases {
        let structural = treescan::analyze_ast(source, language, &checks).unwrap();
        let generic = treescan::analyze_ast(source, "unregistered", &checks).unwrap();
        assert_eq!(structural.stats.tier, Tier::Structural, "{label}");
        assert_ne!(generic.stats.tier, Tier::Structural, "{label}");

        let structural_kinds: BTreeSet<_> =
            structural.findings.iter().map(|f| f.kind.as_str()).collect();
        for finding in &generic.findings {
            assert!(
                structural_kinds.contains(finding.kind.as_str()),
                "{label}: generic-only {} at line {}",
                finding.kind,
                finding.line
            );
            assert!(finding.confidence <= 0.75, "{label}");
        }
    }
}

#[test]
fn test_generic_tier_ignores_split_and_foreign_evidence() {
    setup();
    let checks = CheckSet::from_names(["security"].as_slice());
    for source in [SPLIT_EVIDENCE_GO, FOREIGN_SINK_GO] {
        let analysis = treescan::analyze_ast(source, "unregistered", &checks).unwrap();
        let security: Vec<_> = analysis
            .findings
            .iter()
            .filter(|f| f.kind != "generic_middleware")
            .collect();
        assert!(security.is_empty(), "{security:?}");
    }
}

#[test]
fn test_heuristic_only_tier() {
    setup();
    let source = "sub authenticate_request {\n    my $req = shift;\n}\n\nfunction authGuard(req) {\n    return check(req);\n}\n";

    let analysis = treescan::analyze_ast(source, "perl", &CheckSet::only(&[CheckKind::SecurityMiddleware]))
        .unwrap();

    assert_eq!(analysis.stats.tier, Tier::HeuristicOnly);
    assert_eq!(analysis.stats.heuristic_count, 1);
    assert_eq!(analysis.findings[0].kind, "generic_middleware");
    assert_eq!(analysis.findings[0].line, 5);
}

// =============================================================================
// Determinism and partial trees
// =============================================================================

#[test]
fn test_determinism() {
    setup();
    let source = std::fs::read_to_string(testdata_path().join("handlers.py")).unwrap();

    let first = treescan::analyze_ast(&source, "python", &CheckSet::all()).unwrap();
    for _ in 0..3 {
        let again = treescan::analyze_ast(&source, "python", &CheckSet::all()).unwrap();
        assert_eq!(first.findings, again.findings);
    }
    assert!(first.findings.iter().any(|f| f.kind == "sql_injection" && f.line == 8));
    assert!(first.findings.iter().any(|f| f.kind == "insecure_crypto" && f.line == 20));
    assert!(!first.findings.iter().any(|f| f.kind == "sql_injection" && f.line == 15));

    let lines: Vec<_> = first.findings.iter().map(|f| f.line).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn test_partial_tree_advantage() {
    setup();
    let clean = "import hashlib\n\ndef digest(data):\n    return hashlib.md5(data).hexdigest()\n";
    let broken = format!("{clean}\nvalue = (\n");
    let checks = CheckSet::only(&[CheckKind::CryptoMisuse]);

    let full = treescan::analyze_ast(clean, "python", &checks).unwrap();
    let partial = treescan::analyze_ast(&broken, "python", &checks).unwrap();

    assert_eq!(full.stats.tier, Tier::Structural);
    assert_eq!(partial.stats.tier, Tier::Partial);
    assert!(!partial.stats.diagnostics.is_empty());

    let key = |a: &treescan::Analysis| -> BTreeSet<(String, usize)> {
        a.findings.iter().map(|f| (f.kind.clone(), f.line)).collect()
    };
    assert!(!full.findings.is_empty());
    assert_eq!(key(&full), key(&partial));

    for (f, p) in full.findings.iter().zip(&partial.findings) {
        assert!(p.confidence < f.confidence);
        assert!(p.reasoning.contains(treescan::engine::PARTIAL_NOTE));
    }
}

// =============================================================================
// Malformed input
// =============================================================================

#[test]
fn test_no_crash_on_malformed_input() {
    setup();
    let binary = String::from_utf8_lossy(&[0u8, 159, 146, 150, 255, 10, 123, 0]).into_owned();
    let inputs = [
        "   \n\t  \n".to_string(),
        "func (".to_string(),
        "def broken(:\n    return [\n".to_string(),
        "class { { {".to_string(),
        binary,
    ];

    for language in ["go", "python", "javascript", "typescript", "java", "unknown"] {
        let err = treescan::analyze_ast("", language, &CheckSet::all()).unwrap_err();
        assert_eq!(err, EngineError::EmptySource);
        assert!(treescan::extract_functions("", language, "").unwrap().is_empty());

        for input in &inputs {
            let analysis = treescan::analyze_ast(input, language, &CheckSet::all()).unwrap();
            assert_eq!(analysis.stats.finding_count, analysis.findings.len());
            assert_eq!(analysis.stats.language, language);
            treescan::extract_functions(input, language, "").unwrap();
        }
    }
}

#[test]
fn test_cancellation_is_reported() {
    setup();
    let token = treescan::CancellationToken::new();
    token.cancel();

    let result = treescan::analyze_ast_with_cancel("x = 1\n", "python", &CheckSet::all(), &token);
    assert_eq!(result.unwrap_err(), EngineError::Cancelled);

    let result = treescan::analyze_ast_with_cancel("x = 1\n", "unknown", &CheckSet::all(), &token);
    assert_eq!(result.unwrap_err(), EngineError::Cancelled);
}

#[test]
fn test_config_changes_generic_cap() {
    setup();
    let source = auth_middleware_source();
    let config = treescan::EngineConfig {
        generic_cap: 0.5,
        ..Default::default()
    };
    let analyzer = Analyzer::new().with_config(config);

    let analysis = analyzer.analyze_ast(&source, "unregistered", &CheckSet::all()).unwrap();
    assert!(!analysis.findings.is_empty());
    assert!(analysis.findings.iter().all(|f| f.confidence <= 0.5));
}
