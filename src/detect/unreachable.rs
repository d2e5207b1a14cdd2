//! Statements following an unconditional control transfer.

use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::parser::named_children;

pub struct UnreachableDetector;

impl Detector for UnreachableDetector {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn check(&self) -> CheckKind {
        CheckKind::Unreachable
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;
        let mut findings = Vec::new();

        for block in tree.nodes().filter(|n| vocab.is_block(n.kind())) {
            let statements = named_children(block);
            let Some(pos) = statements
                .iter()
                .position(|s| vocab.is_terminator(s.kind()))
            else {
                continue;
            };
            let terminator = statements[pos];
            // Labels are jump targets and can be reached; hoisted
            // declarations are bound before the terminator runs.
            let Some(dead) = statements[pos + 1..].iter().find(|s| {
                !s.kind().contains("label") && !s.is_error() && !vocab.is_hoisted(s.kind())
            })
            else {
                continue;
            };
            let keyword = tree
                .text(terminator)
                .split_whitespace()
                .next()
                .unwrap_or("return")
                .trim_end_matches(';');
            findings.push(
                Finding::new(
                    "unreachable_code",
                    Severity::Warning,
                    0,
                    format!("Code after `{keyword}` can never run"),
                )
                .at_node(tree, *dead)
                .with_suggestion("Remove the unreachable statements")
                .with_confidence(0.95)
                .with_reasoning(format!(
                    "follows `{keyword}` at line {}",
                    terminator.start_position().row + 1
                )),
            );
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
        UnreachableDetector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_python_after_return() {
        let source = "def f():\n    return 1\n    print('never')\n    print('also never')\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert!(findings[0].message.contains("return"));
    }

    #[test]
    fn test_js_after_throw() {
        let source = "function f() {\n  throw new Error('x');\n  cleanup();\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn test_js_hoisted_function_after_return() {
        let source = "function outer() {\n  return helper();\n  function helper() {\n    return 1;\n  }\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_js_statement_after_hoisted_function_is_dead() {
        let source = "function outer() {\n  return helper();\n  function helper() {}\n  log('late');\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 4);
    }

    #[test]
    fn test_ts_type_declarations_after_return() {
        let source = "function f(): number {\n  return 1;\n  interface Shape { x: number }\n  type Id = string;\n}\n";
        let findings = run(languages::typescript::capability().unwrap(), source);
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_python_def_after_return_is_dead() {
        let source = "def f():\n    return 1\n    def g():\n        pass\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn test_java_no_false_positive() {
        let source = "class A { int f(boolean b) { if (b) { return 1; } return 2; } }";
        let findings = run(languages::java::capability().unwrap(), source);
        assert!(findings.is_empty());
    }
}
