//! Exception handlers that swallow errors silently.

use tree_sitter::Node;

use super::tables::states_intent;
use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::parser::{named_children, SourceTree};
use crate::registry::NodeVocabulary;

pub struct EmptyCatchDetector;

impl Detector for EmptyCatchDetector {
    fn name(&self) -> &'static str {
        "empty_catch"
    }

    fn check(&self) -> CheckKind {
        CheckKind::EmptyCatch
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;

        let findings = tree
            .nodes()
            .filter(|n| vocab.is_catch(n.kind()))
            .filter(|n| handler_body(vocab, *n).map(is_empty_body).unwrap_or(false))
            .map(|handler| {
                let intent = intent_comment(tree, vocab, handler);
                let severity = if intent.is_some() { Severity::Info } else { Severity::Warning };
                let finding = Finding::new(
                    "empty_catch",
                    severity,
                    0,
                    "Exception handler ignores the error",
                )
                .at_node(tree, handler)
                .with_suggestion("Log, handle or re-raise the error");
                match intent {
                    Some(comment) => finding
                        .with_confidence(0.2)
                        .with_reasoning(format!("comment `{comment}` says the error is ignored on purpose")),
                    None => finding
                        .with_confidence(0.85)
                        .with_reasoning("handler body has no statements and no intent comment"),
                }
            })
            .collect();

        Ok(findings)
    }
}

fn handler_body<'t>(vocab: &NodeVocabulary, handler: Node<'t>) -> Option<Node<'t>> {
    handler.child_by_field_name("body").or_else(|| {
        named_children(handler)
            .into_iter()
            .rev()
            .find(|n| vocab.is_block(n.kind()))
    })
}

/// First comment on the handler's lines that marks the ignored error as
/// deliberate. Grammars attach trailing comments to different parents, so
/// comments are matched by row.
fn intent_comment<'t>(tree: &'t SourceTree, vocab: &NodeVocabulary, handler: Node<'_>) -> Option<&'t str> {
    let rows = handler.start_position().row..=handler.end_position().row;
    tree.nodes()
        .filter(|n| vocab.is_comment(n.kind()))
        .filter(|n| rows.contains(&n.start_position().row))
        .map(|n| tree.text(n).trim())
        .find(|text| states_intent(text))
}

/// No statements, or only `pass`.
fn is_empty_body(body: Node<'_>) -> bool {
    named_children(body)
        .iter()
        .all(|n| n.kind() == "pass_statement")
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
        EmptyCatchDetector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_python_pass_only() {
        let source = "try:\n    run()\nexcept ValueError:\n    pass\nexcept KeyError as e:\n    log(e)\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn test_js_comment_only_is_empty() {
        let source = "try {\n  run();\n} catch (e) {\n  // swallowed\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].confidence, 0.85);
    }

    #[test]
    fn test_js_intent_comment_lowers_confidence() {
        let source = "try {\n  cache.warm();\n} catch (e) {\n  // intentionally ignored: cache is optional\n}\n";
        let findings = run(languages::javascript::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].confidence < 0.85);
        assert!(findings[0].reasoning.contains("intentionally ignored"));
    }

    #[test]
    fn test_python_intent_comment_after_pass() {
        let source = "try:\n    os.remove(path)\nexcept FileNotFoundError:\n    pass  # expected on first run\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].confidence, 0.2);
    }

    #[test]
    fn test_java_handled_catch() {
        let source = "class A { void f() { try { g(); } catch (Exception e) { throw new RuntimeException(e); } } }";
        let findings = run(languages::java::capability().unwrap(), source);
        assert!(findings.is_empty());
    }
}
