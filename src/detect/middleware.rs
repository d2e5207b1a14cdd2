//! Security middleware recognition.
//!
//! Each function is scored against every scheme rule using three kinds of
//! evidence: its name, header names appearing in its string literals, and
//! scheme keywords in its text. A keyword is always required; the name and
//! header evidence decide the confidence.

use tree_sitter::Node;

use super::tables::{SchemeRule, GENERIC_MIDDLEWARE, SCHEME_RULES};
use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::parser::{line_of, SourceTree};

pub struct MiddlewareDetector;

impl Detector for MiddlewareDetector {
    fn name(&self) -> &'static str {
        "security_middleware"
    }

    fn check(&self) -> CheckKind {
        CheckKind::SecurityMiddleware
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;
        let mut findings = Vec::new();

        for function in tree
            .nodes()
            .filter(|n| n.is_named() && vocab.is_function(n.kind()))
        {
            let name = ctx
                .capability
                .extractor
                .function_name(tree, function)
                .unwrap_or_default();
            let evidence = Evidence::collect(ctx, function, &name);

            let mut matched = false;
            for rule in SCHEME_RULES {
                if let Some(finding) = evidence.score(tree, function, rule) {
                    findings.push(finding);
                    matched = true;
                }
            }

            if !matched && ctx.capability.detector.is_middleware_signature(tree, function) {
                let label = if name.is_empty() { "anonymous" } else { &name };
                findings.push(
                    Finding::new(
                        GENERIC_MIDDLEWARE,
                        Severity::Info,
                        line_of(function),
                        "Security middleware detected: Middleware",
                    )
                    .at_node(tree, function)
                    .with_scheme("Middleware")
                    .with_suggestion("Verify which security scheme this middleware enforces")
                    .with_confidence(0.7)
                    .with_reasoning(format!("`{label}` has a handler-wrapping signature")),
                );
            }
        }

        Ok(findings)
    }
}

/// Lowercased text evidence of one function.
///
/// Nested function literals count toward the enclosing function, so a
/// wrapper like `AuthMiddleware` earns the header checks of the closure it
/// returns. Both then report the same line and merge on (kind, line).
struct Evidence<'t> {
    name: String,
    name_lower: String,
    body_lower: String,
    /// String literals in source order, lowercased, nested functions included.
    literals: Vec<(Node<'t>, String)>,
}

impl<'t> Evidence<'t> {
    fn collect(ctx: &DetectContext<'t>, function: Node<'t>, name: &str) -> Self {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;
        // Only string fragments are skipped; nested functions are walked.
        let literals = crate::parser::descendants_until(function, |n| {
            n.parent().map(|p| vocab.is_string(p.kind())).unwrap_or(false)
        })
        .into_iter()
        .filter(|n| vocab.is_string(n.kind()))
        .map(|n| (n, tree.text(n).to_lowercase()))
        .collect();

        Self {
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            body_lower: tree.text(function).to_lowercase(),
            literals,
        }
    }

    fn score(&self, tree: &SourceTree, function: Node<'_>, rule: &SchemeRule) -> Option<Finding> {
        if !rule.keyword_in(&self.body_lower) {
            return None;
        }
        let by_name = !self.name_lower.is_empty() && rule.name_matches(&self.name_lower);
        let by_header = self.literals.iter().any(|(_, text)| rule.header_in(text));

        let (confidence, evidence) = match (by_name, by_header) {
            (true, true) => (0.95, "name, header literal and keyword"),
            (true, false) => (0.85, "name and keyword"),
            (false, true) => (0.75, "header literal and keyword"),
            (false, false) => return None,
        };

        let line = self.evidence_line(tree, function, rule);
        let label = if self.name.is_empty() {
            "anonymous function".to_string()
        } else {
            format!("`{}`", self.name)
        };

        Some(
            Finding::new(
                rule.kind,
                Severity::Info,
                line,
                format!("Security middleware detected: {}", rule.scheme),
            )
            .with_end(line, tree.line_text(line).len() + 1)
            .with_snippet(tree.line_text(line).trim())
            .with_scheme(rule.scheme)
            .with_suggestion(format!(
                "Middleware implements {} security scheme",
                rule.scheme
            ))
            .with_confidence(confidence)
            .with_reasoning(format!("{label} matched {} by {evidence}", rule.scheme)),
        )
    }

    /// Line of the first keyword-bearing literal, else the first text line
    /// with a keyword, else the function's first line.
    fn evidence_line(&self, tree: &SourceTree, function: Node<'_>, rule: &SchemeRule) -> usize {
        if let Some((node, _)) = self
            .literals
            .iter()
            .find(|(_, text)| rule.keyword_in(text))
        {
            return line_of(*node);
        }
        let start = line_of(function);
        tree.text(function)
            .lines()
            .position(|line| rule.keyword_in(&line.to_lowercase()))
            .map(|offset| start + offset)
            .unwrap_or(start)
    }
}
