//! Functions nothing in the file calls or references.
//!
//! Methods are skipped: whether a method satisfies an interface or is
//! dispatched dynamically cannot be decided from one file.

use std::collections::HashSet;

use super::{CheckKind, DetectContext, Detector, Finding, Severity};
use crate::analysis::Visibility;
use crate::parser::is_field;

pub struct OrphanedDetector;

impl Detector for OrphanedDetector {
    fn name(&self) -> &'static str {
        "orphaned"
    }

    fn check(&self) -> CheckKind {
        CheckKind::Orphaned
    }

    fn detect(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        let tree = ctx.tree;
        let vocab = &ctx.capability.vocabulary;

        // Every identifier-like token that is not the name of a function
        // declaration.
        let used: HashSet<&str> = tree
            .nodes()
            .filter(|n| n.child_count() == 0 && n.kind().contains("identifier"))
            .filter(|n| {
                !n.parent()
                    .map(|p| vocab.is_function(p.kind()) && is_field(p, "name", *n))
                    .unwrap_or(false)
            })
            .map(|n| tree.text(n))
            .collect();

        let findings = ctx
            .functions()
            .iter()
            .filter(|f| f.receiver.is_none())
            .filter(|f| !ctx.config.is_excluded_function(&f.name))
            .filter(|f| !(ctx.config.trust_exported && f.visibility == Visibility::Exported))
            .filter(|f| !used.contains(f.name.as_str()))
            .map(|f| {
                let (confidence, reasoning) = if is_file_local(ctx, f.visibility) {
                    (0.95, "file-local function, no call or reference to its name")
                } else {
                    (0.6, "no call or reference to the function name in this file")
                };
                Finding::new(
                    "orphaned_code",
                    Severity::Info,
                    f.start_line,
                    format!("Function `{}` is never called in this file", f.name),
                )
                .with_column(f.start_column)
                .with_end(f.end_line, f.end_column)
                .with_snippet(&f.code)
                .with_suggestion(format!(
                    "Remove `{}` if nothing outside this file uses it",
                    f.name
                ))
                .with_confidence(confidence)
                .with_reasoning(reasoning)
            })
            .collect();

        Ok(findings)
    }
}

/// Whether no other file can call a function of this visibility.
/// Unexported JavaScript declarations are module-local.
fn is_file_local(ctx: &DetectContext<'_>, visibility: Visibility) -> bool {
    match visibility {
        Visibility::Private => true,
        Visibility::Public => matches!(ctx.capability.id.as_str(), "javascript" | "typescript"),
        Visibility::Exported => false,
    }
}
