//! Delimiter mismatches recovered from partial parses.

use tree_sitter::Node;

use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::parser::{ancestor, SourceTree};

/// Delimiter classes, checked in order.
const DELIMITERS: &[(&str, char, char)] = &[
    ("brace", '{', '}'),
    ("bracket", '[', ']'),
    ("parenthesis", '(', ')'),
    ("template", '`', '`'),
];

pub struct BraceMismatchDetector;

impl Detector for BraceMismatchDetector {
    fn name(&self) -> &'static str {
        "brace_mismatch"
    }

    fn check(&self) -> CheckKind {
        CheckKind::BraceMismatch
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        if !tree.has_error() {
            return Ok(Vec::new());
        }
        let language = ctx.language();
        let mut findings = Vec::new();

        for node in tree.nodes() {
            let (delimiter, confidence) = if node.is_missing() {
                (classify_missing(node.kind()), 0.9)
            } else if node.is_error() && ancestor(node, |k| k == "ERROR").is_none() {
                (classify_error(tree.text(node), language), 0.8)
            } else {
                continue;
            };

            findings.push(
                Finding::new(
                    "brace_mismatch",
                    Severity::Error,
                    0,
                    format!("Parse error in {language} code, likely a mismatched {delimiter}"),
                )
                .at_node(tree, node)
                .with_suggestion(suggestion(delimiter, language))
                .with_confidence(confidence)
                .with_reasoning(describe(tree, node)),
            );
        }

        Ok(findings)
    }
}

fn describe(tree: &SourceTree, node: Node<'_>) -> String {
    if node.is_missing() {
        format!("parser inserted missing `{}`", node.kind())
    } else {
        let snippet: String = tree.text(node).chars().take(30).collect();
        format!("unparseable region `{}`", snippet.trim())
    }
}

/// Python checks brackets before braces; everything else follows the table.
fn ordered(language: &str) -> Vec<(&'static str, char, char)> {
    let mut order: Vec<_> = DELIMITERS
        .iter()
        .copied()
        .filter(|(name, _, _)| {
            *name != "template" || matches!(language, "javascript" | "typescript")
        })
        .collect();
    if language == "python" {
        order.rotate_left(1);
    }
    order
}

fn classify_missing(kind: &str) -> &'static str {
    DELIMITERS
        .iter()
        .find(|(_, open, close)| kind.contains(*open) || kind.contains(*close))
        .map(|(name, _, _)| *name)
        .unwrap_or("syntax")
}

/// First delimiter class out of balance, else the first one present.
fn classify_error(text: &str, language: &str) -> &'static str {
    let order = ordered(language);
    let count = |c: char| text.chars().filter(|x| *x == c).count();

    order
        .iter()
        .find(|(_, open, close)| {
            if open == close {
                count(*open) % 2 == 1
            } else {
                count(*open) != count(*close)
            }
        })
        .or_else(|| {
            order
                .iter()
                .find(|(_, open, close)| text.contains(*open) || text.contains(*close))
        })
        .map(|(name, _, _)| *name)
        .unwrap_or("syntax")
}

fn suggestion(delimiter: &str, language: &str) -> String {
    let base = format!("Check for an unbalanced {delimiter} near this location");
    let hint = match (language, delimiter) {
        ("go", "brace") => "Go blocks and composite literals need a closing `}`",
        ("go", "bracket") => "check slice, array and index expressions",
        ("go", "parenthesis") => "check calls, conversions and type assertions",
        ("javascript" | "typescript", "brace") => {
            "check object literals, destructuring and block statements"
        }
        ("javascript" | "typescript", "bracket") => "check array literals and computed access",
        ("javascript" | "typescript", "parenthesis") => "check calls and arrow function parameters",
        ("javascript" | "typescript", "template") => "a template literal is missing its closing backtick",
        ("python", "bracket") => "check list literals, comprehensions and subscripts",
        ("python", "parenthesis") => "check calls, tuples and generator expressions",
        ("python", "brace") => "check dict and set literals",
        ("java", "brace") => "check class, method and block bodies",
        ("java", "bracket") => "check array declarations and indexing",
        ("java", "parenthesis") => "check method calls and control statements",
        _ => return base,
    };
    format!("{base}: {hint}")
}
