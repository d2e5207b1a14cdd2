//! Output formatting for treescan results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;
use std::path::Path;

use crate::analysis::{DependencyEdge, DependencyGraph, FunctionInfo};
use crate::detect::{CrossFileFinding, Finding, Severity};
use crate::engine::{Analysis, Tier};

/// Outcome of analyzing one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Path relative to the scan root, with `/` separators.
    pub path: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    /// Why the file produced no analysis (unreadable, empty, cancelled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn findings(&self) -> &[Finding] {
        self.analysis
            .as_ref()
            .map(|a| a.findings.as_slice())
            .unwrap_or_default()
    }
}

/// Whether any finding is severe enough to fail the run.
pub fn has_blocking_findings(reports: &[FileReport]) -> bool {
    reports
        .iter()
        .flat_map(|r| r.findings())
        .any(|f| f.severity >= Severity::Error)
}

/// Path of `file` relative to `base`, or just the file name for a
/// single-file scan.
pub fn make_relative_path(file: &Path, base: &Path) -> String {
    if file == base {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string_lossy().to_string());
    }

    file.strip_prefix(base)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file.to_string_lossy().replace('\\', "/"))
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a str>,
    files_scanned: usize,
    finding_count: usize,
    passed: bool,
    files: &'a [FileReport],
}

/// Write analysis results in JSON format.
pub fn write_json(path: &str, config_path: Option<&str>, reports: &[FileReport]) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        path,
        config: config_path,
        files_scanned: reports.len(),
        finding_count: reports.iter().map(|r| r.findings().len()).sum(),
        passed: !has_blocking_findings(reports),
        files: reports,
    };

    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

/// Write extracted functions as a JSON array.
pub fn write_functions_json(functions: &[FunctionInfo]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(functions)?;
    println!("{}", json);
    Ok(())
}

#[derive(Serialize)]
struct JsonEdge<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(flatten)]
    edge: &'a DependencyEdge,
}

#[derive(Serialize)]
struct JsonDeps<'a> {
    files: Vec<&'a str>,
    edges: Vec<JsonEdge<'a>>,
    cycles: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependents: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    findings: Option<&'a [CrossFileFinding]>,
}

/// Write the dependency graph and cross-file findings in JSON format.
pub fn write_deps_json(
    graph: &DependencyGraph,
    dependents: Option<&[String]>,
    findings: &[CrossFileFinding],
) -> anyhow::Result<()> {
    let report = JsonDeps {
        files: graph.files(),
        edges: graph
            .edges()
            .into_iter()
            .map(|(from, to, edge)| JsonEdge { from, to, edge })
            .collect(),
        cycles: graph.find_cycles(),
        dependents,
        findings: (!findings.is_empty()).then_some(findings),
    };

    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write analysis results in pretty (human-readable) format.
pub fn write_pretty(path: &str, config_path: Option<&str>, reports: &[FileReport]) {
    write_header();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    if let Some(config) = config_path {
        print!("  {}", "Config:   ".dimmed());
        println!("{}", config);
    }
    println!();

    let total: usize = reports.iter().map(|r| r.findings().len()).sum();
    if total > 0 {
        println!("  {} ({}):", "Findings".bold(), total);
        println!();
        for report in reports {
            write_file_findings(report);
        }
    }

    let skipped: Vec<&FileReport> = reports.iter().filter(|r| r.error.is_some()).collect();
    if !skipped.is_empty() {
        println!("  {} ({}):", "Skipped".dimmed(), skipped.len());
        for report in skipped {
            println!(
                "    {}  {}",
                report.path.blue(),
                report.error.as_deref().unwrap_or_default().dimmed()
            );
        }
        println!();
    }

    write_summary(reports, total);
    println!();
}

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "treescan".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn write_file_findings(report: &FileReport) {
    let Some(analysis) = &report.analysis else {
        return;
    };

    for f in &analysis.findings {
        write_finding(&report.path, f);
    }

    if analysis.stats.tier.is_degraded() && !analysis.findings.is_empty() {
        println!(
            "            {}",
            format!("{}: analyzed at {} tier", report.path, analysis.stats.tier).dimmed()
        );
        println!();
    }
}

fn write_finding(path: &str, f: &Finding) {
    write_severity_tag(&f.severity);
    print!("   ");
    print!("{:<22}", f.kind.dimmed());
    print!("{}", path.blue());
    if f.line > 0 {
        print!("{}", format!(":{}", f.line).dimmed());
    }
    print!("  {}", format!("({:.2})", f.confidence).dimmed());
    println!();

    // Message on next line, indented
    println!("            {}", f.message);
    if !f.suggestion.is_empty() {
        println!("            {}", f.suggestion.dimmed());
    }
    println!();
}

fn write_severity_tag(severity: &Severity) {
    match severity {
        Severity::Critical => print!("    {} ", "CRIT ".red().bold()),
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_summary(reports: &[FileReport], total: usize) {
    let degraded = reports
        .iter()
        .filter_map(|r| r.analysis.as_ref())
        .filter(|a| a.stats.tier != Tier::Structural)
        .count();

    if has_blocking_findings(reports) {
        print!("  {}", "✗ FAIL".red());
    } else {
        print!("  {}", "✓ PASS".green());
    }
    print!("  {} files, {} findings", reports.len(), total);
    if degraded > 0 {
        print!("  {}", format!("({} degraded)", degraded).dimmed());
    }
    println!();
}

/// Write the dependency graph and cross-file findings in pretty format.
pub fn write_deps_pretty(
    graph: &DependencyGraph,
    dependents_of: Option<(&str, &[String])>,
    findings: &[CrossFileFinding],
) {
    write_header();

    let edges = graph.edges();
    println!(
        "  {} ({} files, {} edges):",
        "Dependencies".bold(),
        graph.files().len(),
        edges.len()
    );
    for (from, to, edge) in &edges {
        print!("    {} {} {}", from.blue(), "->".dimmed(), to);
        println!(
            "  {}",
            format!("{:?} {} (line {})", edge.kind, edge.label, edge.line).dimmed()
        );
    }
    println!();

    if let Some((target, dependents)) = dependents_of {
        println!("  {} {} ({}):", "Dependents of".bold(), target.blue(), dependents.len());
        for path in dependents {
            println!("    {}", path);
        }
        println!();
    }

    let cycles = graph.find_cycles();
    if cycles.is_empty() {
        println!("  {}", "No cycles".green());
    } else {
        println!("  {} ({}):", "Cycles".yellow().bold(), cycles.len());
        for cycle in cycles {
            println!("    {}", cycle.join(" -> "));
        }
    }
    println!();

    if !findings.is_empty() {
        println!("  {} ({}):", "Cross-file findings".bold(), findings.len());
        println!();
        for item in findings {
            write_finding(&item.path, &item.finding);
        }
    }
}
