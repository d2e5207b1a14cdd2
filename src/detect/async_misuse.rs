//! Async misuse: unawaited coroutines, blocking calls on the event loop and
//! goroutines capturing loop variables.
//!
//! The pass itself only dispatches to the language hook; the shared pattern
//! matchers below are what the hooks call.

use tree_sitter::Node;

use super::nodes::{call_arguments, callee_text};
use super::tables::{is_js_async_callee, last_segment, PYTHON_BLOCKING_CALLS, PYTHON_COROUTINES};
use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::parser::{descendants_until, named_children, SourceTree};

pub struct AsyncMisuseDetector;

impl Detector for AsyncMisuseDetector {
    fn name(&self) -> &'static str {
        "async_misuse"
    }

    fn check(&self) -> CheckKind {
        CheckKind::AsyncMisuse
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        ctx.capability.detector.detect_async_misuse(ctx)
    }
}

/// Whether a function node carries the `async` keyword.
pub fn is_async_function(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}

/// Calls directly inside `function`, not inside nested functions.
fn own_calls<'t>(ctx: &DetectContext<'_>, function: Node<'t>) -> Vec<Node<'t>> {
    let vocab = &ctx.capability.vocabulary;
    descendants_until(function, |n| vocab.is_function(n.kind()))
        .into_iter()
        .filter(|n| vocab.is_call(n.kind()))
        .collect()
}

/// Whether a call's value is thrown away (`foo();` as a statement).
fn is_discarded(call: Node<'_>) -> bool {
    call.parent()
        .map(|p| p.kind() == "expression_statement")
        .unwrap_or(false)
}

fn async_functions<'t>(ctx: &DetectContext<'t>) -> Vec<Node<'t>> {
    let vocab = &ctx.capability.vocabulary;
    ctx.tree
        .nodes()
        .filter(|n| vocab.is_function(n.kind()) && is_async_function(*n))
        .collect()
}

fn misuse(tree: &SourceTree, node: Node<'_>, kind: &str, message: String) -> Finding {
    Finding::new(kind, Severity::Warning, 0, message)
        .at_node(tree, node)
        .with_confidence(0.8)
}

/// Discarded promise-returning calls and `forEach` with async callbacks.
pub fn javascript_misuse(ctx: &DetectContext<'_>) -> Vec<Finding> {
    let tree = ctx.tree;
    let vocab = &ctx.capability.vocabulary;
    let mut findings = Vec::new();

    for function in async_functions(ctx) {
        for call in own_calls(ctx, function) {
            let callee = callee_text(tree, call);
            if is_discarded(call) && is_js_async_callee(&callee) {
                findings.push(
                    misuse(
                        tree,
                        call,
                        "missing_await",
                        format!("Promise from `{callee}` is not awaited"),
                    )
                    .with_suggestion(format!("Add `await` before `{callee}(...)`"))
                    .with_reasoning("promise-returning call discarded inside an async function"),
                );
            }
        }
    }

    for call in tree.nodes().filter(|n| vocab.is_call(n.kind())) {
        if last_segment(&callee_text(tree, call)) != "forEach" {
            continue;
        }
        let async_callback = call_arguments(call)
            .into_iter()
            .any(|arg| vocab.is_function(arg.kind()) && is_async_function(arg));
        if async_callback {
            findings.push(
                misuse(
                    tree,
                    call,
                    "async_foreach",
                    "forEach does not wait for async callbacks".to_string(),
                )
                .with_suggestion("Use `for...of` with `await` or `Promise.all(items.map(...))`")
                .with_confidence(0.85)
                .with_reasoning("async callback passed to forEach"),
            );
        }
    }

    findings
}

/// Unawaited coroutines and blocking calls inside `async def`.
pub fn python_misuse(ctx: &DetectContext<'_>) -> Vec<Finding> {
    let tree = ctx.tree;
    let mut findings = Vec::new();

    for function in async_functions(ctx) {
        for call in own_calls(ctx, function) {
            let callee = callee_text(tree, call);
            let awaited = call.parent().map(|p| p.kind() == "await").unwrap_or(false);

            if PYTHON_COROUTINES.contains(callee.as_str()) && is_discarded(call) {
                findings.push(
                    misuse(
                        tree,
                        call,
                        "missing_await",
                        format!("Coroutine `{callee}` is never awaited"),
                    )
                    .with_suggestion(format!("Write `await {callee}(...)`"))
                    .with_reasoning("coroutine call discarded inside async def"),
                );
            } else if !awaited
                && (PYTHON_BLOCKING_CALLS.contains(callee.as_str()) || callee.starts_with("requests."))
            {
                findings.push(
                    misuse(
                        tree,
                        call,
                        "blocking_call_in_async",
                        format!("Blocking call `{callee}` inside async function"),
                    )
                    .with_suggestion("Use the asyncio equivalent or run it in an executor")
                    .with_reasoning("synchronous call blocks the event loop"),
                );
            }
        }
    }

    findings
}

/// `go func() { ... }()` inside `for ... range` that reads the loop variable.
pub fn go_loop_capture(ctx: &DetectContext<'_>) -> Vec<Finding> {
    let tree = ctx.tree;
    let vocab = &ctx.capability.vocabulary;
    let mut findings = Vec::new();

    for loop_node in tree.nodes().filter(|n| n.kind() == "for_statement") {
        let Some(range) = named_children(loop_node)
            .into_iter()
            .find(|n| n.kind() == "range_clause")
        else {
            continue;
        };
        let loop_vars = range_variables(tree, range);
        if loop_vars.is_empty() {
            continue;
        }
        let Some(body) = loop_node.child_by_field_name("body") else {
            continue;
        };

        let go_statements = descendants_until(body, |n| vocab.is_function(n.kind()))
            .into_iter()
            .filter(|n| n.kind() == "go_statement");
        for statement in go_statements {
            let Some(literal) = goroutine_literal(statement) else {
                continue;
            };
            let params = literal_parameters(tree, literal);
            let captured = descendants_until(literal, |_| false)
                .into_iter()
                .filter(|n| n.kind() == "identifier")
                .map(|n| tree.text(n))
                .find(|name| {
                    loop_vars.iter().any(|v| v.as_str() == *name)
                        && !params.iter().any(|p| p.as_str() == *name)
                });
            if let Some(name) = captured {
                findings.push(
                    misuse(
                        tree,
                        statement,
                        "goroutine_loop_capture",
                        format!("Goroutine captures loop variable `{name}`"),
                    )
                    .with_suggestion(format!("Pass `{name}` as an argument to the goroutine"))
                    .with_reasoning("func literal started with `go` reads a range variable"),
                );
            }
        }
    }

    findings
}

fn range_variables(tree: &SourceTree, range: Node<'_>) -> Vec<String> {
    let Some(left) = range.child_by_field_name("left") else {
        return Vec::new();
    };
    let names = if left.kind() == "identifier" {
        vec![left]
    } else {
        named_children(left)
    };
    names
        .into_iter()
        .filter(|n| n.kind() == "identifier")
        .map(|n| tree.text(n).to_string())
        .filter(|name| name != "_")
        .collect()
}

fn goroutine_literal(statement: Node<'_>) -> Option<Node<'_>> {
    let call = named_children(statement)
        .into_iter()
        .find(|n| n.kind() == "call_expression")?;
    let function = call.child_by_field_name("function")?;
    (function.kind() == "func_literal").then_some(function)
}

fn literal_parameters(tree: &SourceTree, literal: Node<'_>) -> Vec<String> {
    let Some(params) = literal.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(params)
        .into_iter()
        .flat_map(|decl| {
            let mut cursor = decl.walk();
            let names: Vec<String> = decl
                .children_by_field_name("name", &mut cursor)
                .map(|n| tree.text(n).to_string())
                .collect();
            names
        })
        .collect()
}
