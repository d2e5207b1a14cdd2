//! Core types for detection results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::parser::SourceTree;

/// Severity levels for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A detection pass a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckKind {
    #[serde(rename = "security_middleware")]
    SecurityMiddleware,
    #[serde(rename = "sql_injection")]
    SqlInjection,
    #[serde(rename = "xss")]
    Xss,
    #[serde(rename = "command_injection")]
    CommandInjection,
    #[serde(rename = "crypto_misuse")]
    CryptoMisuse,
    #[serde(rename = "secrets")]
    Secrets,
    #[serde(rename = "unused")]
    Unused,
    #[serde(rename = "duplicates")]
    Duplicates,
    #[serde(rename = "unreachable")]
    Unreachable,
    #[serde(rename = "async_misuse")]
    AsyncMisuse,
    #[serde(rename = "empty_catch")]
    EmptyCatch,
    #[serde(rename = "brace_mismatch")]
    BraceMismatch,
    #[serde(rename = "orphaned")]
    Orphaned,
    #[serde(rename = "unused_exports")]
    UnusedExports,
    #[serde(rename = "undefined_references")]
    UndefinedReferences,
    #[serde(rename = "circular_dependencies")]
    CircularDependencies,
    #[serde(rename = "cross_file_duplicates")]
    CrossFileDuplicates,
}

impl CheckKind {
    pub const ALL: [CheckKind; 17] = [
        CheckKind::SecurityMiddleware,
        CheckKind::SqlInjection,
        CheckKind::Xss,
        CheckKind::CommandInjection,
        CheckKind::CryptoMisuse,
        CheckKind::Secrets,
        CheckKind::Unused,
        CheckKind::Duplicates,
        CheckKind::Unreachable,
        CheckKind::AsyncMisuse,
        CheckKind::EmptyCatch,
        CheckKind::BraceMismatch,
        CheckKind::Orphaned,
        CheckKind::UnusedExports,
        CheckKind::UndefinedReferences,
        CheckKind::CircularDependencies,
        CheckKind::CrossFileDuplicates,
    ];

    /// Checks that only run over a set of files.
    pub const CROSS_FILE: [CheckKind; 4] = [
        CheckKind::UnusedExports,
        CheckKind::UndefinedReferences,
        CheckKind::CircularDependencies,
        CheckKind::CrossFileDuplicates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::SecurityMiddleware => "security_middleware",
            CheckKind::SqlInjection => "sql_injection",
            CheckKind::Xss => "xss",
            CheckKind::CommandInjection => "command_injection",
            CheckKind::CryptoMisuse => "crypto_misuse",
            CheckKind::Secrets => "secrets",
            CheckKind::Unused => "unused",
            CheckKind::Duplicates => "duplicates",
            CheckKind::Unreachable => "unreachable",
            CheckKind::AsyncMisuse => "async_misuse",
            CheckKind::EmptyCatch => "empty_catch",
            CheckKind::BraceMismatch => "brace_mismatch",
            CheckKind::Orphaned => "orphaned",
            CheckKind::UnusedExports => "unused_exports",
            CheckKind::UndefinedReferences => "undefined_references",
            CheckKind::CircularDependencies => "circular_dependencies",
            CheckKind::CrossFileDuplicates => "cross_file_duplicates",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "security_middleware" => Some(CheckKind::SecurityMiddleware),
            "sql_injection" => Some(CheckKind::SqlInjection),
            "xss" => Some(CheckKind::Xss),
            "command_injection" => Some(CheckKind::CommandInjection),
            "crypto_misuse" => Some(CheckKind::CryptoMisuse),
            "secrets" => Some(CheckKind::Secrets),
            "unused" => Some(CheckKind::Unused),
            "duplicates" => Some(CheckKind::Duplicates),
            "unreachable" => Some(CheckKind::Unreachable),
            "async_misuse" => Some(CheckKind::AsyncMisuse),
            "empty_catch" => Some(CheckKind::EmptyCatch),
            "brace_mismatch" => Some(CheckKind::BraceMismatch),
            "orphaned" => Some(CheckKind::Orphaned),
            "unused_exports" => Some(CheckKind::UnusedExports),
            "undefined_references" => Some(CheckKind::UndefinedReferences),
            "circular_dependencies" => Some(CheckKind::CircularDependencies),
            "cross_file_duplicates" => Some(CheckKind::CrossFileDuplicates),
            _ => None,
        }
    }

    /// Expansion of a group alias.
    fn alias(s: &str) -> Option<&'static [CheckKind]> {
        match s {
            "vibe" => Some(&[
                CheckKind::EmptyCatch,
                CheckKind::AsyncMisuse,
                CheckKind::BraceMismatch,
            ]),
            "missing_await" => Some(&[CheckKind::AsyncMisuse]),
            "security" => Some(&[
                CheckKind::SecurityMiddleware,
                CheckKind::SqlInjection,
                CheckKind::Xss,
                CheckKind::CommandInjection,
                CheckKind::CryptoMisuse,
                CheckKind::Secrets,
            ]),
            "cross_file" => Some(&CheckKind::CROSS_FILE),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of passes requested for one call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckSet {
    checks: BTreeSet<CheckKind>,
}

impl CheckSet {
    /// Every check except `orphaned` and `cross_file_duplicates`, which
    /// are opt-in.
    pub fn all() -> Self {
        Self {
            checks: CheckKind::ALL
                .iter()
                .copied()
                .filter(|c| !matches!(c, CheckKind::Orphaned | CheckKind::CrossFileDuplicates))
                .collect(),
        }
    }

    /// Build from caller-supplied names. Unknown names are ignored with a
    /// warning; an empty list means [`CheckSet::all`].
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut checks = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            if let Some(kind) = CheckKind::parse(&name) {
                checks.insert(kind);
            } else if let Some(group) = CheckKind::alias(&name) {
                checks.extend(group.iter().copied());
            } else {
                tracing::warn!(check = %name, "ignoring unknown check");
            }
        }
        if checks.is_empty() && names.iter().all(|n| n.as_ref().trim().is_empty()) {
            return Self::all();
        }
        Self { checks }
    }

    pub fn only(kinds: &[CheckKind]) -> Self {
        Self {
            checks: kinds.iter().copied().collect(),
        }
    }

    pub fn contains(&self, kind: CheckKind) -> bool {
        self.checks.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CheckKind> + '_ {
        self.checks.iter().copied()
    }
}

/// How a finding is expected to be fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    Delete,
    Refactor,
    Rewrite,
    Manual,
}

/// A single detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Finding kind, e.g. `jwt_middleware` or `sql_injection`.
    pub kind: String,
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: String,
    #[serde(default)]
    pub code_snippet: String,
    #[serde(default)]
    pub suggestion: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    /// Auth scheme tag for middleware findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    pub fix_type: FixType,
    #[serde(default)]
    pub auto_fix_safe: bool,
}

impl Finding {
    pub fn new(kind: &str, severity: Severity, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            line,
            column: 1,
            end_line: line,
            end_column: 1,
            message: message.into(),
            code_snippet: String::new(),
            suggestion: String::new(),
            confidence: 1.0,
            reasoning: String::new(),
            scheme: None,
            fix_type: FixType::Manual,
            auto_fix_safe: false,
        }
    }

    /// Position and snippet taken from a node.
    pub fn at_node(mut self, tree: &SourceTree, node: Node<'_>) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        self.line = start.row + 1;
        self.column = start.column + 1;
        self.end_line = end.row + 1;
        self.end_column = end.column + 1;
        self.code_snippet = snippet(tree.text(node));
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    pub fn with_end(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }

    pub fn with_snippet(mut self, snippet_text: &str) -> Self {
        self.code_snippet = snippet(snippet_text);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    /// Append a note to the reasoning.
    pub fn note(&mut self, note: &str) {
        if self.reasoning.is_empty() {
            self.reasoning = note.to_string();
        } else if !self.reasoning.split("; ").any(|part| part == note) {
            self.reasoning.push_str("; ");
            self.reasoning.push_str(note);
        }
    }

    /// Whether this is a middleware recognition finding.
    pub fn is_middleware(&self) -> bool {
        self.kind.ends_with("_middleware")
    }
}

/// First line of a node's text, capped for display.
fn snippet(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim_end();
    if first.chars().count() > 120 {
        let cut: String = first.chars().take(117).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_empty_check_set_excludes_orphaned() {
        let names: [&str; 0] = [];
        let set = CheckSet::from_names(&names);
        assert!(set.contains(CheckKind::SecurityMiddleware));
        assert!(set.contains(CheckKind::BraceMismatch));
        assert!(!set.contains(CheckKind::Orphaned));
        assert!(set.contains(CheckKind::UnusedExports));
        assert!(!set.contains(CheckKind::CrossFileDuplicates));
    }

    #[test]
    fn test_cross_file_alias() {
        let set = CheckSet::from_names(&["cross_file"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), CheckKind::CROSS_FILE.to_vec());
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_check_aliases() {
        let set = CheckSet::from_names(&["vibe"]);
        assert!(set.contains(CheckKind::EmptyCatch));
        assert!(set.contains(CheckKind::AsyncMisuse));
        assert!(set.contains(CheckKind::BraceMismatch));
        assert!(!set.contains(CheckKind::Xss));

        let set = CheckSet::from_names(&["missing_await", "orphaned"]);
        assert!(set.contains(CheckKind::AsyncMisuse));
        assert!(set.contains(CheckKind::Orphaned));
    }

    #[test]
    fn test_unknown_checks_are_ignored() {
        let set = CheckSet::from_names(&["nonsense", "xss"]);
        assert!(set.contains(CheckKind::Xss));
        assert_eq!(set.iter().count(), 1);

        let set = CheckSet::from_names(&["nonsense"]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_note_does_not_repeat() {
        let mut f = Finding::new("xss", Severity::Error, 3, "msg");
        f.note("a");
        f.note("b");
        f.note("a");
        assert_eq!(f.reasoning, "a; b");
    }
}
