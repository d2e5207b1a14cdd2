//! Go capability bundle.
//!
//! Methods carry their receiver type, visibility follows Go's capitalization
//! rule, and imports bind the package name (the alias, or the last path
//! segment). The async pass looks for goroutines capturing range variables.

use tree_sitter::{Language, Node, Parser, Query};

use super::{captures, field_children, import_ref, parser_for, pattern_identifiers};
use crate::analysis::{
    unquote, Declared, ImportKind, ImportRef, LanguageDetector, LanguageExtractor,
    ParameterInfo, SymbolKind, Visibility,
};
use crate::detect::{go_loop_capture, DetectContext, Finding, Sinks};
use crate::parser::SourceTree;
use crate::registry::{LanguageCapability, NodeVocabulary};

const IMPORT_QUERY: &str = r#"
(import_spec
  path: (_) @path)
"#;

static GO_SINKS: Sinks = Sinks {
    sql: &[
        "Query",
        "QueryRow",
        "QueryContext",
        "QueryRowContext",
        "Exec",
        "ExecContext",
        "Raw",
        "Prepare",
    ],
    xss: &[
        "fmt.Fprintf",
        "fmt.Fprint",
        "io.WriteString",
        "template.HTML",
        "w.Write",
    ],
    xss_properties: &[],
    command: &[
        "exec.Command",
        "exec.CommandContext",
        "syscall.Exec",
        "os.StartProcess",
    ],
    shell_kwarg: &[],
    shells: &["sh", "bash", "zsh", "cmd", "powershell", "pwsh"],
    weak_crypto: &[
        "md5.New",
        "md5.Sum",
        "sha1.New",
        "sha1.Sum",
        "des.NewCipher",
        "rc4.NewCipher",
    ],
    crypto_factories: &[],
    formatters: &["fmt.Sprintf"],
    sanitizers: &["html.EscapeString", "template.HTMLEscapeString", "url.QueryEscape"],
};

/// Build the Go capability.
pub fn capability() -> anyhow::Result<LanguageCapability> {
    Ok(LanguageCapability {
        id: "go".to_string(),
        extensions: &["go"],
        parser_factory: create_parser,
        detector: Box::new(GoDetector),
        extractor: Box::new(GoExtractor::new()?),
        vocabulary: vocabulary(),
    })
}

fn create_parser() -> anyhow::Result<Parser> {
    parser_for(&tree_sitter_go::LANGUAGE.into())
}

fn vocabulary() -> NodeVocabulary {
    NodeVocabulary {
        functions: &["function_declaration", "method_declaration", "func_literal"],
        classes: &["type_spec"],
        calls: &["call_expression"],
        blocks: &["block", "statement_list"],
        scopes: &[
            "function_declaration",
            "method_declaration",
            "func_literal",
            "block",
            "for_statement",
            "if_statement",
            "expression_switch_statement",
            "type_switch_statement",
            "expression_case",
            "type_case",
            "communication_case",
        ],
        terminators: &[
            "return_statement",
            "break_statement",
            "continue_statement",
            "goto_statement",
        ],
        strings: &["interpreted_string_literal", "raw_string_literal"],
        interpolations: &[],
        binary_ops: &["binary_expression"],
        identifiers: &["identifier"],
        assignments: &[
            "short_var_declaration",
            "assignment_statement",
            "var_spec",
            "const_spec",
            "keyed_element",
        ],
        catches: &[],
        comments: &["comment"],
        hoisted: &[],
    }
}

fn is_exported_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

pub struct GoDetector;

impl LanguageDetector for GoDetector {
    fn sinks(&self) -> &Sinks {
        &GO_SINKS
    }

    fn detect_async_misuse(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        Ok(go_loop_capture(ctx))
    }

    fn is_middleware_signature(&self, tree: &SourceTree, function: Node<'_>) -> bool {
        let wraps_handler = |field: &str| {
            function
                .child_by_field_name(field)
                .is_some_and(|n| tree.text(n).contains("http.Handler"))
        };
        wraps_handler("parameters") && wraps_handler("result")
    }
}

pub struct GoExtractor {
    imports: Query,
}

impl GoExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let language: Language = tree_sitter_go::LANGUAGE.into();
        Ok(Self {
            imports: Query::new(&language, IMPORT_QUERY)?,
        })
    }

    fn import_declaration<'t>(&self, tree: &SourceTree, spec: Node<'t>) -> Option<Declared<'t>> {
        if let Some(alias) = spec.child_by_field_name("name") {
            // `_` and `.` imports bind no name.
            if alias.kind() != "package_identifier" {
                return None;
            }
            return Some(Declared::new(tree, alias, SymbolKind::Import));
        }
        let path = spec.child_by_field_name("path")?;
        let package = unquote(tree.text(path))
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Some(Declared::named(package, path, SymbolKind::Import))
    }
}

impl LanguageExtractor for GoExtractor {
    fn receiver(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        let receiver = node.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let declaration = receiver
            .named_children(&mut cursor)
            .find(|n| n.kind() == "parameter_declaration")?;
        let type_text = tree.text(declaration.child_by_field_name("type")?);
        let base = type_text
            .trim_start_matches('*')
            .split('[')
            .next()
            .unwrap_or_default()
            .trim();
        (!base.is_empty()).then(|| base.to_string())
    }

    fn parameters(&self, tree: &SourceTree, node: Node<'_>) -> Vec<ParameterInfo> {
        let Some(list) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut params = Vec::new();
        let mut cursor = list.walk();
        for declaration in list.named_children(&mut cursor) {
            let variadic = match declaration.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let type_name = declaration.child_by_field_name("type").map(|t| {
                let text = tree.text(t);
                if variadic {
                    format!("...{text}")
                } else {
                    text.to_string()
                }
            });
            let names = field_children(declaration, "name");
            if names.is_empty() {
                params.push(ParameterInfo {
                    name: "_".to_string(),
                    type_name,
                });
                continue;
            }
            for name in names {
                params.push(ParameterInfo {
                    name: tree.text(name).to_string(),
                    type_name: type_name.clone(),
                });
            }
        }
        params
    }

    fn return_type(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        node.child_by_field_name("result")
            .map(|n| tree.text(n).to_string())
    }

    fn visibility(&self, _tree: &SourceTree, _node: Node<'_>, name: &str) -> Visibility {
        if is_exported_name(name) {
            Visibility::Exported
        } else {
            Visibility::Private
        }
    }

    fn declarations<'t>(&self, tree: &SourceTree, node: Node<'t>) -> Vec<Declared<'t>> {
        match node.kind() {
            "function_declaration" | "type_spec" => {
                let kind = if node.kind() == "type_spec" {
                    SymbolKind::Class
                } else {
                    SymbolKind::Function
                };
                node.child_by_field_name("name")
                    .map(|name| {
                        let decl = Declared::new(tree, name, kind);
                        let exported = is_exported_name(&decl.name);
                        vec![decl.exported(exported)]
                    })
                    .unwrap_or_default()
            }
            "parameter_declaration" | "variadic_parameter_declaration" => {
                field_children(node, "name")
                    .into_iter()
                    .filter(|n| tree.text(*n) != "_")
                    .map(|n| Declared::new(tree, n, SymbolKind::Parameter))
                    .collect()
            }
            "short_var_declaration" => node
                .child_by_field_name("left")
                .map(|left| {
                    pattern_identifiers(tree, left, &["identifier"])
                        .into_iter()
                        .map(|n| Declared::new(tree, n, SymbolKind::Variable))
                        .collect()
                })
                .unwrap_or_default(),
            "range_clause" => {
                let mut cursor = node.walk();
                let defines = node.children(&mut cursor).any(|c| c.kind() == ":=");
                match node.child_by_field_name("left") {
                    Some(left) if defines => pattern_identifiers(tree, left, &["identifier"])
                        .into_iter()
                        .map(|n| Declared::new(tree, n, SymbolKind::Variable))
                        .collect(),
                    _ => Vec::new(),
                }
            }
            "var_spec" | "const_spec" => field_children(node, "name")
                .into_iter()
                .filter(|n| tree.text(*n) != "_")
                .map(|n| {
                    let decl = Declared::new(tree, n, SymbolKind::Variable);
                    let exported = is_exported_name(&decl.name);
                    decl.exported(exported)
                })
                .collect(),
            "import_spec" => self.import_declaration(tree, node).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn is_reference(&self, tree: &SourceTree, node: Node<'_>) -> bool {
        match node.kind() {
            "identifier" => tree.text(node) != "_",
            // `http` in `http.Handler`.
            "package_identifier" => node
                .parent()
                .is_some_and(|p| p.kind() == "qualified_type"),
            _ => false,
        }
    }

    fn imports(&self, tree: &SourceTree) -> anyhow::Result<Vec<ImportRef>> {
        Ok(captures(&self.imports, tree)
            .into_iter()
            .map(|(_, node)| import_ref(tree, node, ImportKind::Import))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_symbol_table;
    use crate::parser::parse_with;

    const SOURCE: &str = r#"package greet

import (
	"fmt"
	str "strings"
)

func Greet(name string) string {
	msg := str.ToUpper(name)
	return fmt.Sprintf("hi %s", msg)
}

func helper() {}
"#;

    #[test]
    fn test_symbols_and_imports() {
        let cap = capability().unwrap();
        let outcome = parse_with(SOURCE, &cap);
        let tree = outcome.tree().unwrap();
        let table = build_symbol_table(tree, &cap);

        let exported: Vec<_> = table.exported().map(|s| s.name.as_str()).collect();
        assert_eq!(exported, vec!["Greet"]);

        for name in ["fmt", "str", "name", "msg"] {
            let symbols = table.lookup(name);
            assert_eq!(symbols.len(), 1, "{name}");
            assert!(!symbols[0].references.is_empty(), "{name} unreferenced");
        }

        let imports = cap.extractor.imports(tree).unwrap();
        let paths: Vec<_> = imports.iter().map(|i| (i.path.as_str(), i.line)).collect();
        assert_eq!(paths, vec![("fmt", 4), ("strings", 5)]);
    }

    #[test]
    fn test_middleware_signature() {
        let cap = capability().unwrap();
        let source = "package m\n\nfunc Wrap(next http.Handler) http.Handler { return next }\n\nfunc Plain(x int) int { return x }\n";
        let outcome = parse_with(source, &cap);
        let tree = outcome.tree().unwrap();
        let functions: Vec<_> = tree
            .nodes()
            .filter(|n| n.kind() == "function_declaration")
            .collect();
        assert!(cap.detector.is_middleware_signature(tree, functions[0]));
        assert!(!cap.detector.is_middleware_signature(tree, functions[1]));
    }
}
