//! Duplicate and near-duplicate functions.
//!
//! Bodies are compared as normalized token sequences: identifiers become
//! `ID`, strings `STR`, numbers `NUM`, and every other leaf keeps its kind.
//! Similarity is the Dice coefficient over token 4-gram multisets.

use std::collections::HashMap;

use tree_sitter::Node;

use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::analysis::functions::{describe_function, function_nodes};
use crate::analysis::FunctionInfo;
use crate::parser::{descendants_until, SourceTree};
use crate::registry::NodeVocabulary;

const NGRAM: usize = 4;

pub struct DuplicatesDetector;

impl Detector for DuplicatesDetector {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn check(&self) -> CheckKind {
        CheckKind::Duplicates
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;

        let functions: Vec<(FunctionInfo, Vec<&'static str>)> = function_nodes(tree, vocab)
            .into_iter()
            .filter_map(|node| {
                let info = describe_function(tree, ctx.capability, node)?;
                let body = ctx.capability.extractor.function_body(node)?;
                Some((info, normalize(tree, vocab, body)))
            })
            .collect();

        let mut findings = Vec::new();
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for (later, (info, tokens)) in functions.iter().enumerate() {
            let qualified = info.qualified_name();
            if let Some(&first) = first_seen.get(&qualified) {
                findings.push(
                    duplicate_finding(info, 0.8)
                        .with_reasoning(format!(
                            "`{qualified}` is already defined at line {}",
                            functions[first].0.start_line
                        )),
                );
                continue;
            }
            first_seen.insert(qualified, later);

            if tokens.len() < ctx.config.duplicate_min_tokens {
                continue;
            }
            let earlier = functions[..later].iter().find_map(|(other, other_tokens)| {
                if other_tokens.len() < ctx.config.duplicate_min_tokens {
                    return None;
                }
                let similarity = dice(tokens, other_tokens);
                (similarity >= ctx.config.duplicate_similarity)
                    .then_some((other, other_tokens, similarity))
            });
            if let Some((other, other_tokens, similarity)) = earlier {
                let confidence = if other_tokens == tokens { 0.8 } else { 0.7 };
                findings.push(duplicate_finding(info, confidence).with_reasoning(format!(
                    "body is {:.0}% similar to `{}` at line {}",
                    similarity * 100.0,
                    other.qualified_name(),
                    other.start_line
                )));
            }
        }

        Ok(findings)
    }
}

fn duplicate_finding(info: &FunctionInfo, confidence: f64) -> Finding {
    Finding::new(
        "duplicate_function",
        Severity::Warning,
        info.start_line,
        format!("Function `{}` duplicates another function", info.qualified_name()),
    )
    .with_column(info.start_column)
    .with_end(info.end_line, info.end_column)
    .with_snippet(&info.code)
    .with_suggestion("Extract the shared logic into one function")
    .with_confidence(confidence)
}

/// Normalized token sequence of a body.
pub fn normalize(tree: &SourceTree, vocab: &NodeVocabulary, body: Node<'_>) -> Vec<&'static str> {
    // String contents are collapsed, so nothing below a string is visited.
    let inside_string = |n: Node<'_>| n.parent().map(|p| vocab.is_string(p.kind())).unwrap_or(false);

    descendants_until(body, inside_string)
        .into_iter()
        .filter_map(|n| {
            let kind = n.kind();
            if vocab.is_string(kind) {
                Some("STR")
            } else if n.child_count() > 0 || vocab.is_comment(kind) || kind.contains("comment") {
                None
            } else if kind.contains("identifier") {
                Some("ID")
            } else if is_number(kind) {
                Some("NUM")
            } else if tree.text(n).is_empty() {
                None
            } else {
                Some(kind)
            }
        })
        .collect()
}

fn is_number(kind: &str) -> bool {
    kind.contains("number")
        || kind.contains("int_literal")
        || kind.contains("float")
        || kind == "integer"
        || kind.contains("integer_literal")
}

/// Dice coefficient over 4-gram multisets.
pub fn dice(a: &[&str], b: &[&str]) -> f64 {
    if a.len() < NGRAM || b.len() < NGRAM {
        return if a == b { 1.0 } else { 0.0 };
    }
    fn grams<'s>(tokens: &[&'s str]) -> HashMap<Vec<&'s str>, usize> {
        let mut counts = HashMap::new();
        for window in tokens.windows(NGRAM) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
        counts
    }
    let ga = grams(a);
    let gb = grams(b);
    let shared: usize = ga
        .iter()
        .map(|(gram, count)| (*count).min(*gb.get(gram).unwrap_or(&0)))
        .sum();
    let total = (a.len() - NGRAM + 1) + (b.len() - NGRAM + 1);
    2.0 * shared as f64 / total as f64
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
        DuplicatesDetector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_dice() {
        let a = ["a", "b", "c", "d", "e"];
        assert_eq!(dice(&a, &a), 1.0);
        let b = ["x", "y", "z", "w", "v"];
        assert_eq!(dice(&a, &b), 0.0);
    }

    #[test]
    fn test_renamed_copy_is_duplicate() {
        let source = r#"
def total_price(items):
    result = 0
    for item in items:
        if item.price > 10:
            result += item.price * 2
    return result

def total_cost(things):
    acc = 0
    for thing in things:
        if thing.price > 10:
            acc += thing.price * 2
    return acc
"#;
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 9);
        assert_eq!(findings[0].confidence, 0.8);
    }

    #[test]
    fn test_redefinition() {
        let source = "def f():\n    return 1\n\ndef f():\n    return 2\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 4);
        assert!(findings[0].reasoning.contains("line 1"));
    }

    #[test]
    fn test_short_bodies_are_skipped() {
        let source = "def a():\n    return 1\n\ndef b():\n    return 1\n";
        let findings = run(languages::python::capability().unwrap(), source);
        assert!(findings.is_empty());
    }
}
