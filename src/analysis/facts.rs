//! Fact structures extracted from syntax trees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Visibility of a function as the language defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Go identifiers starting with an uppercase letter.
    Exported,
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Exported => "exported",
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Whether other files can see the function.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// A function, method or named closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub language: String,
    pub parameters: Vec<ParameterInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    pub visibility: Visibility,
    /// Receiver type for Go methods, enclosing class for methods elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Full source text of the function.
    pub code: String,
}

impl FunctionInfo {
    /// Get the fully qualified name (receiver.name for methods).
    pub fn qualified_name(&self) -> String {
        if let Some(ref recv) = self.receiver {
            format!("{}.{}", recv, self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// How a module dependency was expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// Static import statement.
    Import,
    /// CommonJS `require(...)`.
    Require,
    /// Dynamic `import(...)`.
    Dynamic,
}

/// A module reference taken from an import's literal argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    /// Module path as written, without quotes.
    pub path: String,
    pub kind: ImportKind,
    pub line: usize,
    pub column: usize,
    /// Names taken from the module (`from m import a, b`,
    /// `import { a } from "m"`), as the module spells them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

/// Strip the quoting from a string literal's source text.
///
/// Handles Go/JS/Java quotes, backticks and Python prefixes like `f"..."`,
/// `r'...'` and triple quotes.
pub fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = trimmed.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if body.len() >= quote.len() * 2 && body.starts_with(quote) && body.ends_with(quote) {
            return &body[quote.len()..body.len() - quote.len()];
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"net/http\""), "net/http");
        assert_eq!(unquote("'./util'"), "./util");
        assert_eq!(unquote("`raw`"), "raw");
        assert_eq!(unquote("f\"hello {x}\""), "hello {x}");
        assert_eq!(unquote("\"\"\"doc\"\"\""), "doc");
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn test_qualified_name() {
        let f = FunctionInfo {
            name: "Validate".to_string(),
            language: "go".to_string(),
            parameters: vec![],
            return_type: Some("error".to_string()),
            start_line: 1,
            start_column: 1,
            end_line: 3,
            end_column: 2,
            doc_comment: None,
            visibility: Visibility::Exported,
            receiver: Some("Config".to_string()),
            code: String::new(),
        };
        assert_eq!(f.qualified_name(), "Config.Validate");
        assert!(f.contains_line(2));
        assert!(!f.contains_line(4));
    }
}
