//! Findings that need the whole file set: exports no other file uses,
//! imported names the source module does not define, import cycles and
//! functions defined in several files.
//!
//! Everything is read from the dependency graph's per-file facts, so no
//! file is parsed twice.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::confidence::{finalize, EdgeCases};
use super::{CheckKind, CheckSet, Finding, Severity};
use crate::analysis::{DependencyGraph, EdgeKind, FileFacts, SymbolKind};
use crate::config::EngineConfig;

/// A finding located in one file of a multi-file analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossFileFinding {
    pub path: String,
    #[serde(flatten)]
    pub finding: Finding,
}

impl CrossFileFinding {
    fn new(path: &str, finding: Finding) -> Self {
        Self {
            path: path.to_string(),
            finding,
        }
    }
}

/// Run the requested cross-file checks over a built graph. Per-file checks
/// in `checks` are ignored.
pub fn analyze_cross_file(
    graph: &DependencyGraph,
    checks: &CheckSet,
    config: &EngineConfig,
) -> Vec<CrossFileFinding> {
    let mut found = Vec::new();
    if checks.contains(CheckKind::UnusedExports) {
        found.extend(unused_exports(graph, config));
    }
    if checks.contains(CheckKind::UndefinedReferences) {
        found.extend(undefined_references(graph));
    }
    if checks.contains(CheckKind::CircularDependencies) {
        found.extend(import_cycles(graph));
    }
    if checks.contains(CheckKind::CrossFileDuplicates) {
        found.extend(duplicate_functions(graph, config));
    }

    for item in &mut found {
        let generated = graph.facts_for(&item.path).map(|f| f.generated).unwrap_or(false);
        let edge_cases = EdgeCases {
            dynamic_marker: None,
            generated,
        };
        finalize(std::slice::from_mut(&mut item.finding), &edge_cases);
    }
    found.sort_by(|a, b| {
        (&a.path, a.finding.line, a.finding.column, &a.finding.kind)
            .cmp(&(&b.path, b.finding.line, b.finding.column, &b.finding.kind))
    });
    tracing::debug!(files = graph.files().len(), findings = found.len(), "cross-file analysis done");
    found
}

/// How other files use one file's declarations.
#[derive(Debug, Default)]
struct Usage {
    /// Some importer takes the whole module (`import m`, `import * as m`,
    /// a Go package import), so any export may be reached through it.
    whole_module: bool,
    names: BTreeSet<String>,
    has_dependents: bool,
}

fn usage_of(graph: &DependencyGraph, target: &FileFacts) -> Usage {
    let mut usage = Usage::default();
    for other in graph.file_facts().filter(|f| f.path != target.path) {
        for import in &other.imports {
            if !graph.resolve_import(other, import).contains(&target.path) {
                continue;
            }
            usage.has_dependents = true;
            let names_the_module = graph.module_target(other, import).as_deref() == Some(target.path.as_str());
            if import.names.is_empty() || !names_the_module {
                // `from pkg import views` binds the whole `views` module.
                usage.whole_module = true;
            } else {
                usage.names.extend(import.names.iter().cloned());
            }
        }
    }
    for (from, to, edge) in graph.edges() {
        if to == target.path && from != target.path && edge.kind == EdgeKind::References {
            usage.has_dependents = true;
            usage.names.insert(edge.label.clone());
        }
    }
    usage
}

/// Exports of depended-on files that no dependent uses. A file nothing
/// depends on is an entry point or the public surface of the file set, and
/// is not reported.
fn unused_exports(graph: &DependencyGraph, config: &EngineConfig) -> Vec<CrossFileFinding> {
    let mut findings = Vec::new();
    for file in graph.file_facts().filter(|f| !f.generated) {
        let usage = usage_of(graph, file);
        if !usage.has_dependents || usage.whole_module {
            continue;
        }
        for decl in file.declarations.iter().filter(|d| d.exported) {
            if usage.names.contains(&decl.name) || config.is_excluded_function(&decl.name) {
                continue;
            }
            let kind = symbol_kind_name(decl.kind);
            findings.push(CrossFileFinding::new(
                &file.path,
                Finding::new(
                    "unused_export",
                    Severity::Warning,
                    decl.line,
                    format!("Exported {kind} `{}` is never used outside this file", decl.name),
                )
                .with_column(decl.column)
                .with_end(decl.line, decl.column + decl.name.len())
                .with_suggestion(format!("Stop exporting `{}` or remove it", decl.name))
                .with_confidence(0.9)
                .with_reasoning("no dependent file imports or references this name"),
            ));
        }
    }
    findings
}

/// Names a file imports explicitly from a project file that neither
/// declares nor re-binds them.
fn undefined_references(graph: &DependencyGraph) -> Vec<CrossFileFinding> {
    let mut findings = Vec::new();
    for file in graph.file_facts() {
        for import in file.imports.iter().filter(|i| !i.names.is_empty()) {
            let Some(owner_path) = graph.module_target(file, import) else {
                continue;
            };
            let Some(owner) = graph.facts_for(&owner_path) else {
                continue;
            };
            if owner.forwards_unknown {
                continue;
            }
            let submodules: Vec<String> = graph
                .resolve_import(file, import)
                .into_iter()
                .filter(|p| *p != owner_path)
                .collect();

            for name in &import.names {
                if name == "default" || name == "*" {
                    continue;
                }
                let defined = owner.top_level.contains(name)
                    || owner.bound.contains(name)
                    || submodules.iter().any(|p| module_stem(p) == last_segment(name));
                if defined {
                    continue;
                }
                findings.push(CrossFileFinding::new(
                    &file.path,
                    Finding::new(
                        "undefined_reference",
                        Severity::Error,
                        import.line,
                        format!("`{name}` is imported from `{owner_path}`, which does not define it"),
                    )
                    .with_column(import.column)
                    .with_suggestion(format!("Define `{name}` in {owner_path} or fix the import"))
                    .with_confidence(0.95)
                    .with_reasoning("name not declared or imported at the module's top level"),
                ));
            }
        }
    }
    findings
}

/// One finding per import cycle, on its first file at the import that
/// enters the cycle.
fn import_cycles(graph: &DependencyGraph) -> Vec<CrossFileFinding> {
    let edges = graph.edges();
    graph
        .find_import_cycles()
        .into_iter()
        .filter_map(|cycle| {
            let anchor = cycle.first()?;
            let line = edges
                .iter()
                .filter(|(from, to, e)| {
                    *from == anchor.as_str()
                        && e.kind == EdgeKind::Imports
                        && cycle.iter().any(|m| m.as_str() == *to)
                })
                .map(|(_, _, e)| e.line)
                .min()
                .unwrap_or(1);
            Some(CrossFileFinding::new(
                anchor,
                Finding::new(
                    "circular_dependency",
                    Severity::Error,
                    line,
                    format!("Import cycle between {}", cycle.join(", ")),
                )
                .with_suggestion("Move the shared code into a module both sides can import")
                .with_confidence(1.0)
                .with_reasoning(format!("{} files import each other", cycle.len())),
            ))
        })
        .collect()
}

/// File-scope functions sharing a name across files.
fn duplicate_functions(graph: &DependencyGraph, config: &EngineConfig) -> Vec<CrossFileFinding> {
    let mut by_name: BTreeMap<&str, Vec<(&str, usize, usize)>> = BTreeMap::new();
    for file in graph.file_facts().filter(|f| !f.generated) {
        for decl in &file.declarations {
            if decl.kind != SymbolKind::Function || config.is_excluded_function(&decl.name) {
                continue;
            }
            by_name
                .entry(decl.name.as_str())
                .or_default()
                .push((file.path.as_str(), decl.line, decl.column));
        }
    }

    let mut findings = Vec::new();
    for (name, sites) in by_name {
        let files: BTreeSet<&str> = sites.iter().map(|(path, _, _)| *path).collect();
        if files.len() < 2 {
            continue;
        }
        for (path, line, column) in &sites {
            let others: Vec<&str> = files.iter().copied().filter(|f| f != path).collect();
            findings.push(CrossFileFinding::new(
                path,
                Finding::new(
                    "cross_file_duplicate",
                    Severity::Warning,
                    *line,
                    format!("Function `{name}` is also defined in {}", others.join(", ")),
                )
                .with_column(*column)
                .with_suggestion("Consolidate the definitions into one shared function")
                .with_confidence(0.8)
                .with_reasoning(format!("same name in {} files", files.len())),
            ));
        }
    }
    findings
}

fn symbol_kind_name(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Function => "function",
        SymbolKind::Class => "class",
        SymbolKind::Variable => "variable",
        SymbolKind::Parameter => "parameter",
        SymbolKind::Import => "import",
    }
}

/// `pkg/views.py` and `pkg/views/__init__.py` are both module `views`.
fn module_stem(path: &str) -> &str {
    let path = path.strip_suffix("/__init__.py").unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
