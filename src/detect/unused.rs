//! Unused local variables, read from the symbol table.

use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::analysis::SymbolKind;

pub struct UnusedDetector;

impl Detector for UnusedDetector {
    fn name(&self) -> &'static str {
        "unused"
    }

    fn check(&self) -> CheckKind {
        CheckKind::Unused
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let findings = ctx
            .symbols()
            .unreferenced()
            .filter(|s| s.kind == SymbolKind::Variable && s.scope_depth > 0)
            .filter(|s| !s.name.starts_with('_'))
            .map(|s| {
                let line_text = ctx.tree.line_text(s.line);
                Finding::new(
                    "unused_variable",
                    Severity::Warning,
                    s.line,
                    format!("Variable `{}` is declared but never used", s.name),
                )
                .with_column(s.column)
                .with_end(s.line, s.column + s.name.len())
                .with_snippet(line_text.trim())
                .with_suggestion(format!("Remove `{}` or use it", s.name))
                .with_confidence(0.95)
                .with_reasoning("local declaration, no reference resolves to it")
            })
            .collect();
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
        UnusedDetector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_python_unused_local() {
        let source = "def f(a, _b):\n    x = 1\n    y = 2\n    _z = 3\n    return y\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("`x`"));
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[0].confidence, 0.95);
    }

    #[test]
    fn test_module_level_is_not_reported() {
        let source = "CONSTANT = 1\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_js_unused_let() {
        let source = "function f() {\n  let used = 1;\n  let unused = 2;\n  return used;\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
    }
}
