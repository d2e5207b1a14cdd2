//! SQL, XSS and command injection.
//!
//! A call is flagged when its callee is a sink and the inspected argument is
//! built from runtime data: concatenation, interpolation, a formatting call,
//! or a local variable previously assigned one of those.

use tree_sitter::Node;

use super::nodes::{
    binary_operands, binary_operator, binding_parts, callee_text, enclosing_function,
    has_interpolation, is_constant, is_plain_string, keyword_argument,
    positional_arguments, unwrap_value,
};
use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::analysis::unquote;
use crate::parser::{descendants_until, SourceTree};
use crate::registry::LanguageCapability;

/// Recursion limit when following variables back to their assignments.
const MAX_TAINT_DEPTH: usize = 4;

/// Why an expression counts as dynamic, or `None` when it does not.
pub fn dynamic_reason(ctx: &DetectContext<'_>, node: Node<'_>) -> Option<&'static str> {
    reason_at_depth(ctx, node, 0)
}

fn reason_at_depth(ctx: &DetectContext<'_>, node: Node<'_>, depth: usize) -> Option<&'static str> {
    if depth > MAX_TAINT_DEPTH {
        return None;
    }
    let tree = ctx.tree;
    let vocab = &ctx.capability.vocabulary;
    let sinks = ctx.capability.detector.sinks();
    let node = unwrap_value(node);
    let kind = node.kind();

    if vocab.is_string(kind) {
        return has_interpolation(vocab, node).then_some("interpolated string");
    }

    if vocab.is_binary(kind) {
        let op = binary_operator(tree, node);
        if op != "+" && op != "%" {
            return None;
        }
        let operands = binary_operands(node);
        let dynamic = operands
            .iter()
            .any(|o| !is_constant(vocab, unwrap_value(*o)));
        return dynamic.then_some(if op == "%" {
            "format operator with runtime values"
        } else {
            "string concatenation with runtime values"
        });
    }

    if vocab.is_call(kind) {
        let callee = callee_text(tree, node);
        if sinks.is_sanitizer(&callee) {
            return None;
        }
        let args = positional_arguments(node);
        if sinks.is_formatter(&callee) {
            let formats_values = args.len() > 1
                || args
                    .first()
                    .map(|a| !is_constant(vocab, unwrap_value(*a)))
                    .unwrap_or(false);
            return formats_values.then_some("formatting call with runtime values");
        }
        // Single-argument conversions like []byte(s) or str(s).
        if args.len() == 1 {
            return reason_at_depth(ctx, args[0], depth + 1);
        }
        return None;
    }

    if vocab.is_identifier(kind) && is_tainted(ctx, node, depth) {
        return Some("variable assigned from runtime values");
    }

    None
}

/// Whether an identifier was assigned a dynamic expression earlier in the
/// same function.
fn is_tainted(ctx: &DetectContext<'_>, ident: Node<'_>, depth: usize) -> bool {
    let tree = ctx.tree;
    let vocab = &ctx.capability.vocabulary;
    let name = tree.text(ident);
    let scope = enclosing_function(vocab, ident).unwrap_or_else(|| tree.root());

    descendants_until(scope, |n| vocab.is_function(n.kind()))
        .into_iter()
        .filter(|n| vocab.is_assignment(n.kind()) && n.end_byte() <= ident.start_byte())
        .filter_map(binding_parts)
        .filter(|(target, _)| tree.text(*target) == name)
        .any(|(target, value)| {
            let op = tree
                .source()
                .get(target.end_byte()..value.start_byte())
                .unwrap_or("")
                .trim();
            (op == "+=" && !is_constant(vocab, value))
                || reason_at_depth(ctx, value, depth + 1).is_some()
        })
}

fn call_nodes<'t>(ctx: &DetectContext<'t>) -> impl Iterator<Item = (Node<'t>, String)> + 't {
    let tree: &'t SourceTree = ctx.tree;
    let capability: &'t LanguageCapability = ctx.capability;
    let vocab = &capability.vocabulary;
    tree.nodes()
        .filter(move |n| vocab.is_call(n.kind()))
        .map(move |n| (n, callee_text(tree, n)))
}

pub struct SqlInjectionDetector;

impl Detector for SqlInjectionDetector {
    fn name(&self) -> &'static str {
        "sql_injection"
    }

    fn check(&self) -> CheckKind {
        CheckKind::SqlInjection
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let sinks = ctx.capability.detector.sinks();
        let vocab = &ctx.capability.vocabulary;
        let mut findings = Vec::new();

        for (call, callee) in call_nodes(ctx) {
            if !sinks.is_sql(&callee) {
                continue;
            }
            let args = positional_arguments(call);
            match args.first() {
                None => continue,
                Some(first) if is_plain_string(vocab, unwrap_value(*first)) => continue,
                Some(_) => {}
            }
            if let Some(reason) = args.iter().take(2).find_map(|a| dynamic_reason(ctx, *a)) {
                findings.push(
                    Finding::new(
                        "sql_injection",
                        Severity::Critical,
                        0,
                        format!("SQL query built from dynamic input is passed to `{callee}`"),
                    )
                    .at_node(ctx.tree, call)
                    .with_suggestion("Use parameterized queries or prepared statements")
                    .with_confidence(0.9)
                    .with_reasoning(reason),
                );
            }
        }

        Ok(findings)
    }
}

pub struct XssDetector;

impl Detector for XssDetector {
    fn name(&self) -> &'static str {
        "xss"
    }

    fn check(&self) -> CheckKind {
        CheckKind::Xss
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let sinks = ctx.capability.detector.sinks();
        let vocab = &ctx.capability.vocabulary;
        let mut findings = Vec::new();

        for (call, callee) in call_nodes(ctx) {
            if !sinks.is_xss(&callee) {
                continue;
            }
            let args = positional_arguments(call);
            let reason = args
                .iter()
                .find_map(|a| dynamic_reason(ctx, *a))
                .or_else(|| {
                    // fmt.Fprintf(w, "<h1>%s</h1>", name)
                    let html_at = args.iter().position(|a| {
                        let a = unwrap_value(*a);
                        is_plain_string(vocab, a) && looks_like_html(tree.text(a))
                    })?;
                    args[html_at + 1..]
                        .iter()
                        .any(|a| !is_constant(vocab, unwrap_value(*a)))
                        .then_some("HTML template filled with runtime values")
                });
            if let Some(reason) = reason {
                findings.push(
                    Finding::new(
                        "xss",
                        Severity::Error,
                        0,
                        format!("Unescaped dynamic content is written as HTML by `{callee}`"),
                    )
                    .at_node(tree, call)
                    .with_suggestion("Escape output or render through an auto-escaping template")
                    .with_confidence(0.85)
                    .with_reasoning(reason),
                );
            }
        }

        for node in tree.nodes().filter(|n| vocab.is_assignment(n.kind())) {
            let Some((target, value)) = binding_parts(node) else {
                continue;
            };
            let target_text = tree.text(target);
            if !sinks.is_xss_property(target_text) {
                continue;
            }
            if let Some(reason) = dynamic_reason(ctx, value) {
                findings.push(
                    Finding::new(
                        "xss",
                        Severity::Error,
                        0,
                        format!("Dynamic content is assigned to `{target_text}`"),
                    )
                    .at_node(tree, node)
                    .with_suggestion("Use textContent or sanitize the HTML before assignment")
                    .with_confidence(0.85)
                    .with_reasoning(reason),
                );
            }
        }

        Ok(findings)
    }
}

fn looks_like_html(literal: &str) -> bool {
    let body = unquote(literal);
    body.contains('<') && body.contains('>')
}

pub struct CommandInjectionDetector;

impl Detector for CommandInjectionDetector {
    fn name(&self) -> &'static str {
        "command_injection"
    }

    fn check(&self) -> CheckKind {
        CheckKind::CommandInjection
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let sinks = ctx.capability.detector.sinks();
        let vocab = &ctx.capability.vocabulary;
        let mut findings = Vec::new();

        for (call, callee) in call_nodes(ctx) {
            if !sinks.is_command(&callee) {
                continue;
            }
            let args = positional_arguments(call);
            let words = command_words(&args);

            let shell_form = words.first().is_some_and(|program| {
                is_plain_string(vocab, *program) && sinks.is_shell(unquote(tree.text(*program)))
            });

            let reason = if shell_form {
                words[1..]
                    .iter()
                    .any(|w| !is_constant(vocab, unwrap_value(*w)))
                    .then_some("shell invocation with a non-literal argument")
            } else if sinks.needs_shell_kwarg(&callee) {
                let shell_true = keyword_argument(tree, call, "shell")
                    .map(|v| tree.text(v) == "True")
                    .unwrap_or(false);
                if shell_true {
                    args.first()
                        .and_then(|a| dynamic_reason(ctx, *a))
                        .map(|_| "shell=True with a dynamic command")
                } else {
                    None
                }
            } else {
                args.first().and_then(|a| dynamic_reason(ctx, *a))
            };

            if let Some(reason) = reason {
                findings.push(
                    Finding::new(
                        "command_injection",
                        Severity::Critical,
                        0,
                        format!("Command built from dynamic input is executed by `{callee}`"),
                    )
                    .at_node(tree, call)
                    .with_suggestion(
                        "Pass arguments as a fixed argv list and validate input against an allowlist",
                    )
                    .with_confidence(0.9)
                    .with_reasoning(reason),
                );
            }
        }

        Ok(findings)
    }
}

/// Program and arguments, unpacking a leading list literal
/// (`subprocess.run(["sh", "-c", cmd])`).
fn command_words<'t>(args: &[Node<'t>]) -> Vec<Node<'t>> {
    match args.first() {
        Some(first) if matches!(first.kind(), "list" | "array" | "array_initializer") => {
            crate::parser::named_children(*first)
        }
        _ => args.to_vec(),
    }
}
