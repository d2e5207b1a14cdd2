//! Regex-based function discovery for source no grammar could parse.
//!
//! Recognizes the common declaration forms (`func`, `def`, `function`, `fn`,
//! arrow-function bindings and class methods). The end of a function is
//! found by brace balance, or by indentation after a trailing `:`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::FunctionInfo;

lazy_static! {
    static ref DECLARATION_PATTERNS: Vec<Regex> = vec![
        // Go: func Name( / func (r *T) Name(
        Regex::new(r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[\[(]").unwrap(),
        // Python: def name( / async def name(
        Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap(),
        // JavaScript: function name(
        Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(").unwrap(),
        // JavaScript: const name = (...) =>
        Regex::new(r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>").unwrap(),
        // Rust: fn name
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)").unwrap(),
        // Class methods: [modifiers] [type] name(...) {
        Regex::new(r"^\s*(?:(?:public|private|protected|static|final|async|override|synchronized)\s+)*(?:[\w<>\[\],.]+\s+)?([A-Za-z_]\w*)\s*\([^;]*\)\s*(?:throws\s+[\w.,\s]+)?\{\s*$").unwrap(),
    ];
}

/// Control-flow keywords the method pattern would otherwise accept.
const NOT_FUNCTIONS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "do", "try", "synchronized", "with",
];

/// Name and line range of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSpan {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl FunctionSpan {
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

impl From<&FunctionInfo> for FunctionSpan {
    fn from(info: &FunctionInfo) -> Self {
        Self {
            name: info.name.clone(),
            start_line: info.start_line,
            end_line: info.end_line,
        }
    }
}

/// Functions found in raw text, in source order.
pub fn extract_text_functions(source: &str) -> Vec<FunctionSpan> {
    let lines: Vec<&str> = source.lines().collect();
    let mut functions = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(name) = declared_name(line) else {
            continue;
        };
        functions.push(FunctionSpan {
            name,
            start_line: idx + 1,
            end_line: end_line(&lines, idx),
        });
    }

    functions
}

fn declared_name(line: &str) -> Option<String> {
    DECLARATION_PATTERNS.iter().find_map(|pattern| {
        let name = pattern.captures(line)?.get(1)?.as_str();
        (!NOT_FUNCTIONS.contains(&name)).then(|| name.to_string())
    })
}

/// 1-indexed end line of the function starting at `start` (0-indexed).
fn end_line(lines: &[&str], start: usize) -> usize {
    let header = lines[start];
    if code_of(header).contains('{') {
        return brace_end(lines, start);
    }
    if header.trim_end().ends_with(':') {
        return indent_end(lines, start);
    }
    // Brace on the next line (Allman style).
    match lines.get(start + 1) {
        Some(next) if next.trim_start().starts_with('{') => brace_end(lines, start),
        _ => start + 1,
    }
}

fn brace_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut opened = false;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        for c in code_of(line).chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return idx + 1;
        }
    }
    lines.len()
}

fn indent_end(lines: &[&str], start: usize) -> usize {
    let base = indent_of(lines[start]);
    let mut end = start;
    for (idx, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base {
            break;
        }
        end = idx;
    }
    end + 1
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// The line with string literal contents and `//` / `#` comments removed.
fn code_of(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '#' => break,
            '/' if chars.peek() == Some(&'/') => break,
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_languages() {
        let source = r#"package main

func AuthMiddleware(next http.Handler) http.Handler {
	if x {
		y := "}"
	}
}

function verifyToken(req) {
  return req.headers.authorization;
}
"#;
        let functions = extract_text_functions(source);
        assert_eq!(
            functions,
            vec![
                FunctionSpan {
                    name: "AuthMiddleware".to_string(),
                    start_line: 3,
                    end_line: 7,
                },
                FunctionSpan {
                    name: "verifyToken".to_string(),
                    start_line: 9,
                    end_line: 11,
                },
            ]
        );
    }

    #[test]
    fn test_python_indentation() {
        let source = "def check_auth(request):\n    token = request.headers['x']\n\n    return token\n\nx = 1\n";
        let functions = extract_text_functions(source);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "check_auth");
        assert_eq!(functions[0].end_line, 4);
    }

    #[test]
    fn test_control_flow_is_not_a_method() {
        let source = "    if (ready) {\n    }\n    public void handle(Request r) {\n    }\n";
        let names: Vec<_> = extract_text_functions(source)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["handle"]);
    }

    #[test]
    fn test_arrow_binding() {
        let functions = extract_text_functions("const guard = async (req, res) => {\n  next();\n};\n");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "guard");
        assert_eq!(functions[0].end_line, 3);
    }
}
