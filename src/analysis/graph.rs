//! Cross-file dependency graph.
//!
//! Files are nodes. An `imports` edge points from a file to the file (or
//! external module) an import resolves to; a `references` edge points to a
//! file whose top-level symbol the importer uses. Per-file facts are kept so
//! one file can be re-extracted without reparsing the rest.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::{EdgeFiltered, EdgeRef};
use petgraph::Direction;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{build_symbol_table, ImportRef, SymbolKind};
use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::detect::tables::is_generated;
use crate::parser::{named_children, parse_with, SourceTree};
use crate::registry::{LanguageCapability, LanguageRegistry};

const JS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// One input file of a multi-file analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path with `/` separators, relative to the project root.
    pub path: String,
    pub source: String,
    /// Language id. An unknown id falls back to the path's extension.
    pub language: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into().replace('\\', "/"),
            source: source.into(),
            language: language.into(),
        }
    }
}

/// A graph node: a known file, or a module no known file provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    File { path: String, language: String },
    External { module: String },
}

impl GraphNode {
    /// Path for files, module string for externals.
    pub fn key(&self) -> &str {
        match self {
            GraphNode::File { path, .. } => path,
            GraphNode::External { module } => module,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, GraphNode::External { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Imports,
    References,
}

/// Edge weight: what links the two nodes and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub kind: EdgeKind,
    /// Module path for imports, symbol name for references.
    pub label: String,
    pub line: usize,
}

/// A file-scope declaration as other files see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub(crate) name: String,
    pub(crate) kind: SymbolKind,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) exported: bool,
}

/// What one file contributes to the graph.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileFacts {
    pub(crate) path: String,
    pub(crate) language: String,
    pub(crate) imports: Vec<ImportRef>,
    /// File-scope declarations, imports excluded, in source order.
    pub(crate) declarations: Vec<Declaration>,
    /// Names of `declarations`.
    pub(crate) top_level: BTreeSet<String>,
    /// File-scope names bound by imports.
    pub(crate) bound: BTreeSet<String>,
    /// A wildcard import or `export * from` leaves the provided names open.
    pub(crate) forwards_unknown: bool,
    /// The file carries a code generation header.
    pub(crate) generated: bool,
    /// Names used but not declared locally (or bound by an import), with
    /// the line of their first use.
    used: BTreeMap<String, usize>,
}

/// Directed dependency graph between files.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, DependencyEdge>,
    index: HashMap<String, NodeIndex>,
    facts: BTreeMap<String, FileFacts>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-extract one file (new or changed) and rebuild the edges that
    /// depend on it.
    pub fn update_file(&mut self, file: &SourceFile, registry: &LanguageRegistry) {
        let facts = extract_facts(file, registry);
        self.facts.insert(facts.path.clone(), facts);
        self.rebuild();
    }

    /// Drop a file and every edge touching it.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let removed = self.facts.remove(path).is_some();
        if removed {
            self.rebuild();
        }
        removed
    }

    /// Files with an edge into `path`, sorted.
    pub fn get_dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Files and external modules `path` has an edge to, sorted.
    pub fn get_dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Groups of files that depend on each other in a cycle.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        self.sorted_cycles(petgraph::algo::kosaraju_scc(&self.graph))
    }

    /// Cycles formed by import edges alone. Go files of one package
    /// reference each other freely and only show up in [`find_cycles`].
    ///
    /// [`find_cycles`]: DependencyGraph::find_cycles
    pub fn find_import_cycles(&self) -> Vec<Vec<String>> {
        let imports = EdgeFiltered::from_fn(&self.graph, |e: EdgeReference<'_, DependencyEdge>| {
            e.weight().kind == EdgeKind::Imports
        });
        self.sorted_cycles(petgraph::algo::kosaraju_scc(&imports))
    }

    fn sorted_cycles(&self, components: Vec<Vec<NodeIndex>>) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = components
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.iter().map(|&idx| self.graph[idx].key().to_string()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Paths of the known files, sorted.
    pub fn files(&self) -> Vec<&str> {
        self.facts.keys().map(String::as_str).collect()
    }

    /// Every edge as (from, to, weight), sorted by endpoints then line.
    pub fn edges(&self) -> Vec<(&str, &str, &DependencyEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].key(),
                    self.graph[e.target()].key(),
                    e.weight(),
                )
            })
            .collect();
        edges.sort_by(|a, b| {
            (a.0, a.1, a.2.kind, a.2.line, &a.2.label).cmp(&(b.0, b.1, b.2.kind, b.2.line, &b.2.label))
        });
        edges
    }

    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        self.index.get(key).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub(crate) fn file_facts(&self) -> impl Iterator<Item = &FileFacts> {
        self.facts.values()
    }

    pub(crate) fn facts_for(&self, path: &str) -> Option<&FileFacts> {
        self.facts.get(path)
    }

    /// The file an import statement names, ignoring submodules reached
    /// through its imported names.
    pub(crate) fn module_target(&self, from: &FileFacts, import: &ImportRef) -> Option<String> {
        let bare = ImportRef {
            names: Vec::new(),
            ..import.clone()
        };
        self.resolve_import(from, &bare).into_iter().next()
    }

    fn neighbors(&self, key: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let found: BTreeSet<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].key().to_string())
            .collect();
        found.into_iter().collect()
    }

    fn ensure_node(&mut self, key: &str, node: impl FnOnce() -> GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(node());
        self.index.insert(key.to_string(), idx);
        idx
    }

    /// Recompute nodes and edges from the stored facts.
    ///
    /// Resolution of one file depends on which other files exist, so a
    /// change anywhere can turn an external import into a file edge.
    fn rebuild(&mut self) {
        self.graph = DiGraph::new();
        self.index.clear();

        let facts: Vec<FileFacts> = self.facts.values().cloned().collect();
        for file in &facts {
            let path = file.path.clone();
            let language = file.language.clone();
            self.ensure_node(&file.path, || GraphNode::File { path, language });
        }

        for file in &facts {
            let from = self.index[&file.path];
            let mut targets: BTreeSet<String> = BTreeSet::new();
            let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

            for import in &file.imports {
                let resolved = self.resolve_import(file, import);
                let edge = DependencyEdge {
                    kind: EdgeKind::Imports,
                    label: import.path.clone(),
                    line: import.line,
                };
                if resolved.is_empty() {
                    let module = import.path.clone();
                    let to = self.ensure_node(&import.path, || GraphNode::External { module });
                    if seen.insert((import.path.clone(), import.path.clone())) {
                        self.graph.add_edge(from, to, edge);
                    }
                    continue;
                }
                for target in resolved {
                    if seen.insert((target.clone(), import.path.clone())) {
                        self.graph.add_edge(from, self.index[&target], edge.clone());
                    }
                    targets.insert(target);
                }
            }

            // Go packages span a directory; siblings share top-level names.
            if file.language == "go" {
                let dir = parent_dir(&file.path);
                targets.extend(
                    self.facts
                        .values()
                        .filter(|other| other.language == "go" && other.path != file.path)
                        .filter(|other| parent_dir(&other.path) == dir)
                        .map(|other| other.path.clone()),
                );
            }

            for target in targets {
                let Some(target_facts) = self.facts.get(&target) else {
                    continue;
                };
                let to = self.index[&target];
                for (name, line) in &file.used {
                    if target_facts.top_level.contains(name) {
                        self.graph.add_edge(
                            from,
                            to,
                            DependencyEdge {
                                kind: EdgeKind::References,
                                label: name.clone(),
                                line: *line,
                            },
                        );
                    }
                }
            }
        }
    }

    /// Known files an import refers to.
    pub(crate) fn resolve_import(&self, from: &FileFacts, import: &ImportRef) -> Vec<String> {
        let module = import.path.as_str();
        let candidates: Vec<String> = match from.language.as_str() {
            "javascript" | "typescript" => javascript_candidates(&from.path, module),
            "python" => return self.resolve_python(&from.path, module, &import.names),
            "go" => return self.resolve_go(&from.path, module),
            "java" => return self.resolve_java(module),
            _ => Vec::new(),
        };
        candidates
            .into_iter()
            .find(|c| self.facts.contains_key(c))
            .into_iter()
            .collect()
    }

    /// The module file, plus one file per imported name that is itself a
    /// submodule (`from pkg import views` reaches `pkg/views.py`).
    fn resolve_python(&self, from: &str, module: &str, names: &[String]) -> Vec<String> {
        let dots = module.chars().take_while(|&c| c == '.').count();
        let rest = module[dots..].replace('.', "/");

        let mut resolved: Vec<String> = self.resolve_python_module(from, dots, &rest).into_iter().collect();
        for name in names {
            let submodule = if rest.is_empty() {
                name.replace('.', "/")
            } else {
                format!("{rest}/{}", name.replace('.', "/"))
            };
            if let Some(path) = self.resolve_python_module(from, dots, &submodule) {
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
        }
        resolved
    }

    /// `rest` is the slash-separated module path after `dots` leading dots.
    fn resolve_python_module(&self, from: &str, dots: usize, rest: &str) -> Option<String> {
        if dots > 0 {
            let mut base = parent_dir(from).to_string();
            for _ in 1..dots {
                base = parent_dir(&base).to_string();
            }
            let stem = join_path(&base, rest);
            let candidates = if rest.is_empty() {
                vec![join_path(&stem, "__init__.py")]
            } else {
                vec![format!("{stem}.py"), join_path(&stem, "__init__.py")]
            };
            return candidates.into_iter().find(|c| self.facts.contains_key(c));
        }
        if rest.is_empty() {
            return None;
        }
        [format!("{rest}.py"), format!("{rest}/__init__.py")]
            .iter()
            .find_map(|suffix| self.shortest_with_suffix(suffix))
    }

    fn resolve_go(&self, from: &str, module: &str) -> Vec<String> {
        // The longest known directory the import path ends with.
        let best = self
            .facts
            .values()
            .filter(|f| f.language == "go" && f.path != from)
            .map(|f| parent_dir(&f.path))
            .filter(|dir| !dir.is_empty() && has_path_suffix(module, dir))
            .max_by_key(|dir| dir.len());
        let Some(dir) = best else {
            return Vec::new();
        };
        self.facts
            .values()
            .filter(|f| f.language == "go" && parent_dir(&f.path) == dir)
            .map(|f| f.path.clone())
            .collect()
    }

    fn resolve_java(&self, module: &str) -> Vec<String> {
        if let Some(package) = module.strip_suffix(".*") {
            let dir = package.replace('.', "/");
            return self
                .facts
                .values()
                .filter(|f| f.language == "java" && has_path_suffix(parent_dir(&f.path), &dir))
                .map(|f| f.path.clone())
                .collect();
        }
        // `a.b.C` is a class; `a.b.C.member` is a static import from it.
        let class_path = module.replace('.', "/");
        let owner = class_path.rsplit_once('/').map(|(owner, _)| owner.to_string());
        std::iter::once(class_path)
            .chain(owner)
            .find_map(|path| self.shortest_with_suffix(&format!("{path}.java")))
            .into_iter()
            .collect()
    }

    fn shortest_with_suffix(&self, suffix: &str) -> Option<String> {
        self.facts
            .keys()
            .filter(|path| has_path_suffix(path, suffix))
            .min_by_key(|path| path.len())
            .cloned()
    }
}

/// Build the dependency graph of `files`.
///
/// Files are parsed in parallel. A file in an unsupported language, or one
/// that fails to parse, becomes a node with no outgoing edges.
pub fn build_dependency_graph(
    files: &[SourceFile],
    registry: &LanguageRegistry,
    cancel: Option<&CancellationToken>,
) -> Result<DependencyGraph, EngineError> {
    let facts: Vec<FileFacts> = files
        .par_iter()
        .map(|file| {
            if let Some(token) = cancel {
                token.check()?;
            }
            Ok(extract_facts(file, registry))
        })
        .collect::<Result<_, EngineError>>()?;

    let mut graph = DependencyGraph::new();
    for file in facts {
        graph.facts.insert(file.path.clone(), file);
    }
    graph.rebuild();
    tracing::debug!(
        files = graph.facts.len(),
        edges = graph.edge_count(),
        "dependency graph built"
    );
    Ok(graph)
}

fn capability_for(
    file: &SourceFile,
    registry: &LanguageRegistry,
) -> Option<std::sync::Arc<LanguageCapability>> {
    registry.resolve(&file.language).or_else(|| {
        let ext = file.path.rsplit_once('.').map(|(_, ext)| ext)?;
        registry.for_extension(ext)
    })
}

fn extract_facts(file: &SourceFile, registry: &LanguageRegistry) -> FileFacts {
    let mut facts = FileFacts {
        path: file.path.clone(),
        language: file.language.clone(),
        ..FileFacts::default()
    };

    let Some(capability) = capability_for(file, registry) else {
        tracing::warn!(path = %file.path, language = %file.language, "no language support, file has no edges");
        return facts;
    };
    facts.language = capability.id.clone();

    let outcome = parse_with(&file.source, &capability);
    let Some(tree) = outcome.tree() else {
        tracing::warn!(path = %file.path, "parse failed, file has no edges");
        return facts;
    };

    facts.imports = capability.extractor.imports(tree).unwrap_or_else(|e| {
        tracing::warn!(path = %file.path, "import extraction failed: {e:#}");
        Vec::new()
    });

    facts.generated = is_generated(&file.source);
    facts.forwards_unknown = forwards_unknown_names(tree);

    let table = build_symbol_table(tree, &capability);
    for symbol in table.top_level() {
        if symbol.kind == SymbolKind::Import {
            facts.bound.insert(symbol.name.clone());
            continue;
        }
        facts.top_level.insert(symbol.name.clone());
        facts.declarations.push(Declaration {
            name: symbol.name.clone(),
            kind: symbol.kind,
            line: symbol.line,
            column: symbol.column,
            exported: symbol.exported,
        });
    }
    for reference in table.references() {
        let external = match table.resolution(reference) {
            None => true,
            Some(symbol) => symbol.kind == SymbolKind::Import,
        };
        if external {
            facts
                .used
                .entry(reference.name.clone())
                .or_insert(reference.line);
        }
    }
    facts
}

/// `from m import *` or `export * from "m"`.
fn forwards_unknown_names(tree: &SourceTree) -> bool {
    tree.nodes().any(|n| match n.kind() {
        "wildcard_import" | "namespace_export" => true,
        "export_statement" => {
            n.child_by_field_name("source").is_some()
                && !named_children(n).iter().any(|c| c.kind() == "export_clause")
        }
        _ => false,
    })
}

fn javascript_candidates(from: &str, module: &str) -> Vec<String> {
    if !module.starts_with('.') {
        return Vec::new();
    }
    let base = join_path(parent_dir(from), module);
    let mut candidates = vec![base.clone()];
    candidates.extend(JS_EXTENSIONS.iter().map(|ext| format!("{base}.{ext}")));
    candidates.extend(JS_EXTENSIONS.iter().map(|ext| format!("{base}/index.{ext}")));
    candidates
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Join and normalize `.` / `..` segments.
fn join_path(dir: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Whether `path` ends with `suffix` on a segment boundary.
fn has_path_suffix(path: &str, suffix: &str) -> bool {
    path == suffix || path.ends_with(&format!("/{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;

    fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        languages::register_all(&registry);
        registry
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("src/app", "./util"), "src/app/util");
        assert_eq!(join_path("src/app", "../lib/x"), "src/lib/x");
        assert_eq!(join_path("", "./a"), "a");
    }

    #[test]
    fn test_javascript_imports_and_references() {
        let files = vec![
            SourceFile::new(
                "src/app.js",
                "import { helper } from './util';\nimport express from 'express';\n\nhelper();\n",
                "javascript",
            ),
            SourceFile::new("src/util/index.js", "export function helper() {}\n", "javascript"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();

        assert_eq!(
            graph.get_dependencies("src/app.js"),
            vec!["express", "src/util/index.js"]
        );
        assert_eq!(graph.get_dependents("src/util/index.js"), vec!["src/app.js"]);
        assert!(graph.node("express").unwrap().is_external());

        let references: Vec<_> = graph
            .edges()
            .into_iter()
            .filter(|(_, _, e)| e.kind == EdgeKind::References)
            .map(|(from, to, e)| (from, to, e.label.as_str()))
            .collect();
        assert_eq!(references, vec![("src/app.js", "src/util/index.js", "helper")]);
    }

    #[test]
    fn test_python_relative_and_cycle() {
        let files = vec![
            SourceFile::new("pkg/a.py", "from .b import run\n\ndef start():\n    run()\n", "python"),
            SourceFile::new("pkg/b.py", "from pkg.a import start\n\ndef run():\n    start()\n", "python"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependencies("pkg/a.py"), vec!["pkg/b.py"]);
        assert_eq!(graph.get_dependencies("pkg/b.py"), vec!["pkg/a.py"]);
        assert_eq!(graph.find_cycles(), vec![vec!["pkg/a.py".to_string(), "pkg/b.py".to_string()]]);
    }

    #[test]
    fn test_python_from_package_imports_submodule() {
        let files = vec![
            SourceFile::new("pkg/__init__.py", "", "python"),
            SourceFile::new("pkg/views.py", "def index():\n    return 1\n", "python"),
            SourceFile::new("pkg/app.py", "from . import views\n\nviews.index()\n", "python"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependents("pkg/views.py"), vec!["pkg/app.py"]);
        assert_eq!(
            graph.get_dependencies("pkg/app.py"),
            vec!["pkg/__init__.py", "pkg/views.py"]
        );
    }

    #[test]
    fn test_python_absolute_from_import_of_submodule() {
        let files = vec![
            SourceFile::new("pkg/__init__.py", "", "python"),
            SourceFile::new("pkg/views.py", "def index():\n    return 1\n", "python"),
            SourceFile::new("main.py", "from pkg import views as v\n\nv.index()\n", "python"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependents("pkg/views.py"), vec!["main.py"]);
    }

    #[test]
    fn test_python_from_import_without_package_init() {
        let files = vec![
            SourceFile::new("pkg/views.py", "def index():\n    return 1\n", "python"),
            SourceFile::new("pkg/app.py", "from . import views\n", "python"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependencies("pkg/app.py"), vec!["pkg/views.py"]);
    }

    #[test]
    fn test_python_from_import_of_plain_names_stays_on_module() {
        let files = vec![
            SourceFile::new("pkg/models.py", "class User:\n    pass\n", "python"),
            SourceFile::new("pkg/app.py", "from .models import User\n\nUser()\n", "python"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependencies("pkg/app.py"), vec!["pkg/models.py"]);
    }

    #[test]
    fn test_go_same_directory_references() {
        let files = vec![
            SourceFile::new("cmd/main.go", "package main\n\nfunc main() {\n\tserve()\n}\n", "go"),
            SourceFile::new("cmd/server.go", "package main\n\nfunc serve() {}\n", "go"),
        ];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.get_dependents("cmd/server.go"), vec!["cmd/main.go"]);
        assert!(graph.get_dependents("cmd/main.go").is_empty());
    }

    #[test]
    fn test_update_file_matches_fresh_build() {
        let registry = registry();
        let before = vec![
            SourceFile::new("a.py", "import b\n", "python"),
            SourceFile::new("b.py", "x = 1\n", "python"),
        ];
        let mut graph = build_dependency_graph(&before, &registry, None).unwrap();
        assert_eq!(graph.get_dependents("b.py"), vec!["a.py"]);

        let changed = SourceFile::new("a.py", "import c\n", "python");
        graph.update_file(&changed, &registry);
        assert!(graph.get_dependents("b.py").is_empty());
        assert_eq!(graph.get_dependencies("a.py"), vec!["c"]);

        let fresh = build_dependency_graph(&[changed, before[1].clone()], &registry, None).unwrap();
        assert_eq!(graph.edges(), fresh.edges());
    }

    #[test]
    fn test_unsupported_file_is_isolated() {
        let files = vec![SourceFile::new("notes.txt", "import x", "text")];
        let graph = build_dependency_graph(&files, &registry(), None).unwrap();
        assert_eq!(graph.files(), vec!["notes.txt"]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_cancelled_build() {
        let token = CancellationToken::new();
        token.cancel();
        let files = vec![SourceFile::new("a.py", "x = 1\n", "python")];
        let result = build_dependency_graph(&files, &registry(), Some(&token));
        assert_eq!(result.err(), Some(EngineError::Cancelled));
    }
}
