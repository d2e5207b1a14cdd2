//! Command-line interface for treescan.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::analysis::SourceFile;
use crate::config::EngineConfig;
use crate::detect::{CheckSet, Severity};
use crate::engine::Analyzer;
use crate::error::EngineError;
use crate::registry::{self, LanguageRegistry};
use crate::report::{self, FileReport};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Multi-language parse-tree analysis engine.
///
/// Treescan reports security middleware, injection sinks, weak crypto,
/// hardcoded secrets, dead and duplicate code, and extracts functions and
/// cross-file dependencies. Files that do not parse cleanly are still
/// analyzed at a degraded tier.
#[derive(Parser)]
#[command(name = "treescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run detectors over a file or directory
    #[command(visible_alias = "check")]
    Analyze(AnalyzeArgs),
    /// Print the functions of one file as JSON
    Functions(FunctionsArgs),
    /// Build the dependency graph of a directory
    Deps(DepsArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Language id for every file (default: from the file extension)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Comma-separated checks, e.g. "sql_injection,xss" or "security"
    #[arg(long, value_delimiter = ',')]
    pub checks: Vec<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the functions command.
#[derive(Parser)]
pub struct FunctionsArgs {
    /// Source file
    pub file: PathBuf,

    /// Case-insensitive name substring
    #[arg(long, default_value = "")]
    pub filter: String,

    /// Language id (default: from the file extension)
    #[arg(short, long)]
    pub language: Option<String>,
}

/// Arguments for the deps command.
#[derive(Parser)]
pub struct DepsArgs {
    /// Project root
    pub path: PathBuf,

    /// Also list the files depending on this one (path relative to root)
    #[arg(long)]
    pub dependents_of: Option<String>,

    /// Run the cross-file checks, e.g. "cross_file" or "unused_exports"
    /// (default: the config's default checks)
    #[arg(long, value_delimiter = ',')]
    pub checks: Vec<String>,

    /// Skip the cross-file checks and print only the graph
    #[arg(long)]
    pub graph_only: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Load the explicit config, or discover one next to the scanned path or
/// in the current directory.
pub fn load_config(
    explicit: Option<&Path>,
    scan_root: &Path,
) -> anyhow::Result<(EngineConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((EngineConfig::parse_file(path)?, Some(path.to_path_buf())));
    }

    let root_dir = if scan_root.is_dir() {
        Some(scan_root)
    } else {
        scan_root.parent()
    };
    let discovered = root_dir
        .and_then(EngineConfig::discover)
        .or_else(|| EngineConfig::discover(Path::new(".")));

    match discovered {
        Some(path) => Ok((EngineConfig::parse_file(&path)?, Some(path))),
        None => Ok((EngineConfig::default(), None)),
    }
}

/// Language id for a file: the override, the registered extension, or the
/// bare extension (which routes to the generic tier).
fn language_for(path: &Path, registry: &LanguageRegistry, explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    registry
        .for_extension(ext)
        .map(|cap| cap.id.clone())
        .unwrap_or_else(|| ext.to_string())
}

/// Collect files with a registered extension, skipping hidden, vendored and
/// excluded paths.
pub fn collect_files(
    root: &Path,
    config: &EngineConfig,
    registry: &LanguageRegistry,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories, but never the root itself
            if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            // Skip vendor and node_modules
            !(e.file_type().is_dir() && (name == "vendor" || name == "node_modules"))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if config.is_path_excluded(relative) {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if registry.for_extension(ext).is_some() {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Files to scan under `path`: the path itself for a file, else a walk.
fn scan_targets(
    path: &Path,
    config: &EngineConfig,
    registry: &LanguageRegistry,
) -> anyhow::Result<Vec<PathBuf>> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("cannot access path {}", path.display()))?;
    if metadata.is_dir() {
        collect_files(path, config, registry)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

/// Read a file as text, replacing invalid UTF-8.
fn read_source(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn validate_format(format: &str) -> bool {
    if format != "pretty" && format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", format);
        return false;
    }
    true
}

/// Analyze every file with one analyzer, in parallel.
pub fn analyze_files(
    analyzer: &Analyzer<'_>,
    root: &Path,
    files: &[PathBuf],
    language: Option<&str>,
    checks: &CheckSet,
) -> Vec<FileReport> {
    files
        .par_iter()
        .map(|path| {
            let relative = report::make_relative_path(path, root);
            let language = language_for(path, analyzer.registry(), language);
            let (analysis, error) = match read_source(path) {
                Ok(source) => match analyzer.analyze_ast(&source, &language, checks) {
                    Ok(analysis) => (Some(analysis), None),
                    Err(EngineError::EmptySource) => (None, Some("empty file".to_string())),
                    Err(e) => (None, Some(e.to_string())),
                },
                Err(e) => (None, Some(format!("{e:#}"))),
            };
            FileReport {
                path: relative,
                language,
                analysis,
                error,
            }
        })
        .collect()
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if !validate_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    let (config, config_path) = match load_config(args.config.as_deref(), &args.path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let registry = registry::global();
    let files = scan_targets(&args.path, &config, registry)?;
    if files.is_empty() {
        eprintln!("Warning: no files to scan");
        return Ok(EXIT_SUCCESS);
    }

    let checks = if args.checks.is_empty() {
        config.default_check_set()
    } else {
        CheckSet::from_names(args.checks.as_slice())
    };

    let analyzer = Analyzer::with_registry(registry).with_config(config);
    let reports = analyze_files(&analyzer, &args.path, &files, args.language.as_deref(), &checks);

    let path_str = args.path.to_string_lossy().to_string();
    let config_str = config_path.map(|p| p.to_string_lossy().to_string());
    match args.format.as_str() {
        "json" => report::write_json(&path_str, config_str.as_deref(), &reports)?,
        _ => report::write_pretty(&path_str, config_str.as_deref(), &reports),
    }

    if report::has_blocking_findings(&reports) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the functions command.
pub fn run_functions(args: &FunctionsArgs) -> anyhow::Result<i32> {
    let source = read_source(&args.file)?;
    let registry = registry::global();
    let language = language_for(&args.file, registry, args.language.as_deref());

    if !registry.is_supported(&language) {
        eprintln!("Error: unsupported language {:?}", language);
        return Ok(EXIT_ERROR);
    }

    let functions = Analyzer::with_registry(registry).extract_functions(&source, &language, &args.filter)?;
    report::write_functions_json(&functions)?;
    Ok(EXIT_SUCCESS)
}

/// Run the deps command.
pub fn run_deps(args: &DepsArgs) -> anyhow::Result<i32> {
    if !validate_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    let (config, _) = match load_config(args.config.as_deref(), &args.path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let registry = registry::global();
    let files = scan_targets(&args.path, &config, registry)?;
    let sources = files
        .iter()
        .map(|path| {
            Ok(SourceFile::new(
                report::make_relative_path(path, &args.path),
                read_source(path)?,
                language_for(path, registry, None),
            ))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let checks = if args.checks.is_empty() {
        config.default_check_set()
    } else {
        CheckSet::from_names(args.checks.as_slice())
    };
    let analyzer = Analyzer::with_registry(registry).with_config(config);
    let graph = analyzer.build_dependency_graph(&sources)?;
    let findings = if args.graph_only {
        Vec::new()
    } else {
        analyzer.analyze_graph(&graph, &checks)
    };

    let dependents = args
        .dependents_of
        .as_deref()
        .map(|target| (target, graph.get_dependents(target)));

    match args.format.as_str() {
        "json" => report::write_deps_json(
            &graph,
            dependents.as_ref().map(|(_, d)| d.as_slice()),
            &findings,
        )?,
        _ => report::write_deps_pretty(
            &graph,
            dependents.as_ref().map(|(t, d)| (*t, d.as_slice())),
            &findings,
        ),
    }

    if findings.iter().any(|f| f.finding.severity >= Severity::Error) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::languages;
    use tempfile::TempDir;

    fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        languages::register_all(&registry);
        registry
    }

    #[test]
    fn test_collect_files_skips_vendor_and_excluded() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("vendor/lib")).unwrap();
        std::fs::create_dir_all(root.join("gen")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/main.go"), "package main\n").unwrap();
        std::fs::write(root.join("src/util.py"), "x = 1\n").unwrap();
        std::fs::write(root.join("src/notes.txt"), "hello\n").unwrap();
        std::fs::write(root.join("vendor/lib/dep.go"), "package lib\n").unwrap();
        std::fs::write(root.join("gen/out.go"), "package gen\n").unwrap();
        std::fs::write(root.join(".git/hook.py"), "x = 1\n").unwrap();

        let config = EngineConfig {
            excluded_paths: vec!["gen/**".to_string()],
            ..EngineConfig::default()
        };
        let files = collect_files(root, &config, &registry()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| report::make_relative_path(p, root))
            .collect();
        assert_eq!(names, vec!["src/main.go", "src/util.py"]);
    }

    #[test]
    fn test_language_for() {
        let registry = registry();
        assert_eq!(language_for(Path::new("a/b.tsx"), &registry, None), "typescript");
        assert_eq!(language_for(Path::new("a/b.rb"), &registry, None), "rb");
        assert_eq!(language_for(Path::new("a/b.rb"), &registry, Some("go")), "go");
    }

    #[test]
    fn test_load_config_discovery() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("treescan.yaml"), "generic_cap: 0.5\n").unwrap();

        let (config, path) = load_config(None, temp.path()).unwrap();
        assert_eq!(config.generic_cap, 0.5);
        assert_eq!(path, Some(temp.path().join("treescan.yaml")));

        let explicit = temp.path().join("custom.yaml");
        std::fs::write(&explicit, "partial_penalty: 0.7\n").unwrap();
        let (config, _) = load_config(Some(&explicit), temp.path()).unwrap();
        assert_eq!(config.partial_penalty, 0.7);
    }

    #[test]
    fn test_analyze_files_reports_per_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("empty.go"), "").unwrap();
        std::fs::write(
            root.join("db.py"),
            "def find(cursor, name):\n    cursor.execute(\"SELECT * FROM users WHERE name = '\" + name + \"'\")\n",
        )
        .unwrap();

        let registry = registry();
        let analyzer = Analyzer::with_registry(&registry);
        let files = collect_files(root, &EngineConfig::default(), &registry).unwrap();
        let reports = analyze_files(&analyzer, root, &files, None, &CheckSet::all());

        assert_eq!(reports.len(), 2);
        let db = reports.iter().find(|r| r.path == "db.py").unwrap();
        assert!(db.findings().iter().any(|f| f.kind == "sql_injection"));
        assert!(report::has_blocking_findings(&reports));

        let empty = reports.iter().find(|r| r.path == "empty.go").unwrap();
        assert_eq!(empty.error.as_deref(), Some("empty file"));
    }
}
