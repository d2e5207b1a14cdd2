//! Text matcher used when no tree could be produced.
//!
//! Reuses the scheme table, the qualified sink names of every registered
//! language and the secret patterns. Middleware evidence must fall inside
//! one text-discovered function, mirroring the per-function structural pass.
//! Confidence never exceeds the configured generic cap.

use lazy_static::lazy_static;
use regex::Regex;

use super::pipeline::Ranked;
use super::tables::{
    is_placeholder, Sinks, AWS_KEY_PATTERN, PRIVATE_KEY_PATTERN, SCHEME_RULES,
    SECRET_ASSIGNMENT_PATTERN,
};
use super::{CheckKind, CheckSet, Finding, Severity};
use crate::analysis::FunctionSpan;
use crate::config::EngineConfig;

// Same positions as the corresponding passes of the standard pipeline.
const ORDER_MIDDLEWARE: usize = 0;
const ORDER_SQL: usize = 1;
const ORDER_XSS: usize = 2;
const ORDER_COMMAND: usize = 3;
const ORDER_CRYPTO: usize = 4;
const ORDER_SECRETS: usize = 5;

lazy_static! {
    /// String concatenation or formatting inside call arguments.
    static ref DYNAMIC_STRING: Regex = Regex::new(
        r#"["'`]\s*\+|\+\s*["'`]|\$\{|\bf["']|\.format\(|["']\s*%\s*[\w(]|Sprintf\(|String\.format\("#
    )
    .unwrap();
}

/// Run the text checks over raw source. `spans` are the functions found by
/// text discovery; middleware is only reported inside one of them.
pub fn detect_text(
    source: &str,
    spans: &[FunctionSpan],
    checks: &CheckSet,
    sinks: &[&Sinks],
    config: &EngineConfig,
) -> Vec<Ranked> {
    let lines: Vec<&str> = source.lines().collect();
    let mut found = Vec::new();

    if checks.contains(CheckKind::SecurityMiddleware) {
        found.extend(middleware(&lines, spans).into_iter().map(|f| rank(ORDER_MIDDLEWARE, f)));
    }
    let injection: [(CheckKind, usize, &str, Severity, fn(&Sinks) -> &'static [&'static str]); 3] = [
        (CheckKind::SqlInjection, ORDER_SQL, "sql_injection", Severity::Critical, |s| s.sql),
        (CheckKind::Xss, ORDER_XSS, "xss", Severity::Error, |s| s.xss),
        (CheckKind::CommandInjection, ORDER_COMMAND, "command_injection", Severity::Critical, |s| s.command),
    ];
    for (check, order, kind, severity, entries) in injection {
        if !checks.contains(check) {
            continue;
        }
        let mut names = qualified(sinks, entries);
        if check == CheckKind::CommandInjection {
            // These only reach a shell with `shell=True`, which text cannot see.
            names.retain(|name| !sinks.iter().any(|s| s.shell_kwarg.contains(name)));
        }
        found.extend(
            dynamic_sink_calls(&lines, &names, kind, severity)
                .into_iter()
                .map(|f| rank(order, f)),
        );
    }
    if checks.contains(CheckKind::CryptoMisuse) {
        let names = qualified(sinks, |s| s.weak_crypto);
        found.extend(weak_crypto(&lines, &names).into_iter().map(|f| rank(ORDER_CRYPTO, f)));
    }
    if checks.contains(CheckKind::Secrets) {
        found.extend(secrets(&lines).into_iter().map(|f| rank(ORDER_SECRETS, f)));
    }

    for ranked in &mut found {
        let finding = &mut ranked.finding;
        finding.confidence = finding.confidence.min(config.generic_cap);
    }
    found
}

/// Dotted sink entries only. A bare name like `execute` or `Query` is a
/// method of some language's driver; without a grammar the receiver is
/// unknown, and another language's bare name would flag unrelated calls.
fn qualified(sinks: &[&Sinks], entries: fn(&Sinks) -> &'static [&'static str]) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = sinks
        .iter()
        .flat_map(|s| entries(s).iter().copied())
        .filter(|name| name.contains('.'))
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

fn rank(order: usize, finding: Finding) -> Ranked {
    Ranked { order, finding }
}

fn at_line(kind: &str, severity: Severity, line: usize, text: &str, message: String) -> Finding {
    Finding::new(kind, severity, line, message)
        .with_end(line, text.len() + 1)
        .with_snippet(text.trim())
}

/// Per span: a scheme keyword plus either a matching function name or a
/// header name, both inside the span.
fn middleware(lines: &[&str], spans: &[FunctionSpan]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for span in spans {
        let start = span.start_line.saturating_sub(1);
        let end = span.end_line.min(lines.len());
        if start >= end {
            continue;
        }
        let body: Vec<(usize, String)> = lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, l)| (start + i + 1, l.to_lowercase()))
            .collect();
        let text = body.iter().map(|(_, l)| l.as_str()).collect::<Vec<_>>().join("\n");
        let name_lower = span.name.to_lowercase();

        for rule in SCHEME_RULES {
            if !rule.keyword_in(&text) {
                continue;
            }
            let by_name = rule.name_matches(&name_lower);
            let by_header = rule.header_in(&text);
            let evidence = match (by_name, by_header) {
                (true, true) => "name, header and keyword",
                (true, false) => "name and keyword",
                (false, true) => "header and keyword",
                (false, false) => continue,
            };
            let Some(line) = body
                .iter()
                .find(|(_, l)| rule.header_in(l) && rule.keyword_in(l))
                .or_else(|| body.iter().find(|(_, l)| rule.keyword_in(l)))
                .map(|(line, _)| *line)
            else {
                continue;
            };
            findings.push(
                at_line(
                    rule.kind,
                    Severity::Info,
                    line,
                    lines[line - 1],
                    format!("Security middleware detected: {}", rule.scheme),
                )
                .with_scheme(rule.scheme)
                .with_suggestion(format!("Middleware implements {} security scheme", rule.scheme))
                .with_confidence(0.75)
                .with_reasoning(format!("`{}` matched by {evidence} in source text", span.name)),
            );
        }
    }
    findings
}

/// Byte offsets just past each `entry(` on the line.
fn call_sites(line: &str, entry: &str) -> Vec<usize> {
    let needle = format!("{entry}(");
    line.match_indices(&needle)
        .map(|(pos, _)| pos + needle.len())
        .collect()
}

fn dynamic_sink_calls(lines: &[&str], names: &[&str], kind: &str, severity: Severity) -> Vec<Finding> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let sink = names.iter().find(|name| {
                call_sites(text, name)
                    .into_iter()
                    .any(|args| DYNAMIC_STRING.is_match(&text[args..]))
            })?;
            Some(
                at_line(
                    kind,
                    severity,
                    idx + 1,
                    text,
                    format!("Possible {} via `{sink}`", kind.replace('_', " ")),
                )
                .with_suggestion("Pass untrusted values as parameters instead of building strings")
                .with_confidence(0.7)
                .with_reasoning(format!("`{sink}` called with a string built in its arguments")),
            )
        })
        .collect()
}

fn weak_crypto(lines: &[&str], names: &[&str]) -> Vec<Finding> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let call = names.iter().find(|name| !call_sites(text, name).is_empty())?;
            Some(
                at_line(
                    "insecure_crypto",
                    Severity::Error,
                    idx + 1,
                    text,
                    format!("Weak cryptographic primitive `{call}`"),
                )
                .with_suggestion("Use SHA-256 or stronger, or AES-GCM for encryption")
                .with_confidence(0.75)
                .with_reasoning("weak hash or cipher call name in source text"),
            )
        })
        .collect()
}

fn secrets(lines: &[&str]) -> Vec<Finding> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let reason = if AWS_KEY_PATTERN.is_match(text) {
                "line matches the AWS access key format"
            } else if PRIVATE_KEY_PATTERN.is_match(text) {
                "line contains a PEM private key"
            } else {
                let captures = SECRET_ASSIGNMENT_PATTERN.captures(text)?;
                if &captures[2] == ":" {
                    return None;
                }
                let value = captures.get(3)?.as_str();
                if is_placeholder(value) {
                    return None;
                }
                "credential-named assignment of a string literal"
            };
            Some(
                at_line(
                    "hardcoded_secret",
                    Severity::Critical,
                    idx + 1,
                    text,
                    "Hardcoded credential in source text".to_string(),
                )
                .with_suggestion("Load credentials from the environment or a secret manager")
                .with_confidence(0.75)
                .with_reasoning(reason),
            )
        })
        .collect()
}
