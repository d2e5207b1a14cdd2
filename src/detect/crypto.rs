//! Weak hash and cipher usage.

use super::nodes::{callee_text, is_plain_string, positional_arguments, unwrap_value};
use super::tables::names_weak_algorithm;
use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::analysis::unquote;

pub struct CryptoDetector;

impl Detector for CryptoDetector {
    fn name(&self) -> &'static str {
        "crypto_misuse"
    }

    fn check(&self) -> CheckKind {
        CheckKind::CryptoMisuse
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;
        let sinks = ctx.capability.detector.sinks();
        let mut findings = Vec::new();

        for call in tree.nodes().filter(|n| vocab.is_call(n.kind())) {
            let callee = callee_text(tree, call);

            let reason = if sinks.is_weak_crypto(&callee) {
                Some(format!("`{callee}` constructs a weak algorithm"))
            } else if sinks.is_crypto_factory(&callee) {
                positional_arguments(call)
                    .into_iter()
                    .map(unwrap_value)
                    .find(|a| is_plain_string(vocab, *a))
                    .map(|a| unquote(tree.text(a)).to_string())
                    .filter(|algorithm| names_weak_algorithm(algorithm))
                    .map(|algorithm| format!("`{callee}` requests {algorithm}"))
            } else {
                None
            };

            if let Some(reason) = reason {
                findings.push(
                    Finding::new(
                        "insecure_crypto",
                        Severity::Error,
                        0,
                        "Weak cryptographic algorithm or mode in use",
                    )
                    .at_node(tree, call)
                    .with_suggestion("Use SHA-256 or stronger for hashing and AES-GCM for encryption")
                    .with_confidence(0.95)
                    .with_reasoning(reason),
                );
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;
    use crate::config::EngineConfig;
    use crate::detect::CheckSet;
    use crate::parser::parse_with;
    use crate::registry::LanguageCapability;

    fn run(cap: LanguageCapability, source: &str) -> Vec<Finding> {
        let outcome = parse_with(source, &cap);
        let tree = outcome.tree().unwrap();
        let config = EngineConfig::default();
        let checks = CheckSet::all();
        let ctx = DetectContext::new(tree, &cap, &config, &checks);
        CryptoDetector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_go_weak_constructors() {
        let source = "package main\n\nfunc h(b []byte) {\n\t_ = md5.Sum(b)\n\t_ = sha256.Sum256(b)\n}\n";
        let findings = run(languages::go::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 4);
        assert_eq!(findings[0].kind, "insecure_crypto");
    }

    #[test]
    fn test_java_factory_argument() {
        let source = r#"class H {
    void f() throws Exception {
        MessageDigest a = MessageDigest.getInstance("MD5");
        MessageDigest b = MessageDigest.getInstance("SHA-256");
        Cipher c = Cipher.getInstance("AES/ECB/PKCS5Padding");
    }
}"#;
        let findings = run(languages::java::capability().unwrap(), source);
        let lines: Vec<_> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![3, 5]);
    }

    #[test]
    fn test_python_hashlib() {
        let source = "import hashlib\n\nh = hashlib.md5(data)\nok = hashlib.new('sha256')\nbad = hashlib.new('sha1')\n";
        let findings = run(languages::python::capability().unwrap(), source);
        let lines: Vec<_> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![3, 5]);
    }
}
