//! Java capability bundle.

use tree_sitter::{Language, Node, Parser, Query};

use super::{captures, parser_for};
use crate::analysis::{
    Declared, ImportKind, ImportRef, LanguageDetector, LanguageExtractor, ParameterInfo,
    SymbolKind, Visibility,
};
use crate::detect::Sinks;
use crate::parser::{ancestor, column_of, is_field, line_of, named_children, SourceTree};
use crate::registry::{LanguageCapability, NodeVocabulary};

const IMPORT_QUERY: &str = "(import_declaration) @import";

static JAVA_SINKS: Sinks = Sinks {
    sql: &[
        "executeQuery",
        "executeUpdate",
        "execute",
        "prepareStatement",
        "createQuery",
        "createNativeQuery",
        "addBatch",
    ],
    xss: &[
        "getWriter().print",
        "getWriter().println",
        "getWriter().write",
    ],
    xss_properties: &[],
    command: &["Runtime.getRuntime().exec", "getRuntime().exec", "ProcessBuilder"],
    shell_kwarg: &[],
    shells: &["sh", "bash", "cmd", "cmd.exe", "powershell"],
    weak_crypto: &["DESKeySpec"],
    crypto_factories: &["MessageDigest.getInstance", "Cipher.getInstance"],
    formatters: &["String.format"],
    sanitizers: &["StringEscapeUtils.escapeHtml4", "Encode.forHtml", "HtmlUtils.htmlEscape"],
};

const CLASS_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const FUNCTION_KINDS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "lambda_expression",
];

/// Build the Java capability.
pub fn capability() -> anyhow::Result<LanguageCapability> {
    Ok(LanguageCapability {
        id: "java".to_string(),
        extensions: &["java"],
        parser_factory: create_parser,
        detector: Box::new(JavaDetector),
        extractor: Box::new(JavaExtractor::new()?),
        vocabulary: vocabulary(),
    })
}

fn create_parser() -> anyhow::Result<Parser> {
    parser_for(&tree_sitter_java::LANGUAGE.into())
}

fn vocabulary() -> NodeVocabulary {
    NodeVocabulary {
        functions: FUNCTION_KINDS,
        classes: CLASS_KINDS,
        calls: &["method_invocation", "object_creation_expression"],
        blocks: &["block", "constructor_body", "switch_block_statement_group"],
        scopes: &[
            "method_declaration",
            "constructor_declaration",
            "lambda_expression",
            "block",
            "constructor_body",
            "for_statement",
            "enhanced_for_statement",
            "catch_clause",
            "class_body",
        ],
        terminators: &[
            "return_statement",
            "throw_statement",
            "break_statement",
            "continue_statement",
        ],
        strings: &["string_literal"],
        interpolations: &[],
        binary_ops: &["binary_expression"],
        identifiers: &["identifier"],
        assignments: &["variable_declarator", "assignment_expression"],
        catches: &["catch_clause"],
        comments: &["line_comment", "block_comment"],
        hoisted: &[],
    }
}

/// Java has no async keyword; the default hooks apply.
pub struct JavaDetector;

impl LanguageDetector for JavaDetector {
    fn sinks(&self) -> &Sinks {
        &JAVA_SINKS
    }
}

pub struct JavaExtractor {
    imports: Query,
}

impl JavaExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let language: Language = tree_sitter_java::LANGUAGE.into();
        Ok(Self {
            imports: Query::new(&language, IMPORT_QUERY)?,
        })
    }
}

fn has_modifier(tree: &SourceTree, node: Node<'_>, modifier: &str) -> bool {
    named_children(node)
        .into_iter()
        .find(|n| n.kind() == "modifiers")
        .is_some_and(|m| tree.text(m).split_whitespace().any(|w| w == modifier))
}

fn in_interface(node: Node<'_>) -> bool {
    node.parent().is_some_and(|p| p.kind() == "interface_body")
}

/// `(name, type)` nodes of each formal parameter.
fn formal_parameters(function: Node<'_>) -> Vec<(Node<'_>, Option<Node<'_>>)> {
    let Some(list) = function.child_by_field_name("parameters") else {
        return Vec::new();
    };
    match list.kind() {
        // `x -> ...`
        "identifier" => vec![(list, None)],
        "inferred_parameters" => named_children(list)
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .map(|n| (n, None))
            .collect(),
        _ => named_children(list)
            .into_iter()
            .filter_map(|param| match param.kind() {
                "formal_parameter" => Some((
                    param.child_by_field_name("name")?,
                    param.child_by_field_name("type"),
                )),
                "spread_parameter" => {
                    let declarator = named_children(param)
                        .into_iter()
                        .find(|n| n.kind() == "variable_declarator")?;
                    let type_node = named_children(param)
                        .into_iter()
                        .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator"));
                    Some((declarator.child_by_field_name("name")?, type_node))
                }
                _ => None,
            })
            .collect(),
    }
}

impl LanguageExtractor for JavaExtractor {
    fn receiver(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        let owner = ancestor(node, |k| CLASS_KINDS.contains(&k) || FUNCTION_KINDS.contains(&k))?;
        if !CLASS_KINDS.contains(&owner.kind()) {
            return None;
        }
        owner
            .child_by_field_name("name")
            .map(|n| tree.text(n).to_string())
    }

    fn parameters(&self, tree: &SourceTree, node: Node<'_>) -> Vec<ParameterInfo> {
        formal_parameters(node)
            .into_iter()
            .map(|(name, type_node)| {
                let spread = name
                    .parent()
                    .and_then(|p| p.parent())
                    .is_some_and(|p| p.kind() == "spread_parameter");
                ParameterInfo {
                    name: tree.text(name).to_string(),
                    type_name: type_node.map(|t| {
                        let text = tree.text(t);
                        if spread {
                            format!("{text}...")
                        } else {
                            text.to_string()
                        }
                    }),
                }
            })
            .collect()
    }

    fn return_type(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        if node.kind() != "method_declaration" {
            return None;
        }
        node.child_by_field_name("type")
            .map(|n| tree.text(n).to_string())
    }

    fn visibility(&self, tree: &SourceTree, node: Node<'_>, _name: &str) -> Visibility {
        if has_modifier(tree, node, "public") || in_interface(node) {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    fn declarations<'t>(&self, tree: &SourceTree, node: Node<'t>) -> Vec<Declared<'t>> {
        let kind = node.kind();
        if FUNCTION_KINDS.contains(&kind) || CLASS_KINDS.contains(&kind) {
            let mut declared = Vec::new();
            if let Some(name) = node.child_by_field_name("name") {
                let symbol_kind = if CLASS_KINDS.contains(&kind) {
                    SymbolKind::Class
                } else {
                    SymbolKind::Function
                };
                let public = has_modifier(tree, node, "public") || in_interface(node);
                declared.push(Declared::new(tree, name, symbol_kind).exported(public));
            }
            declared.extend(
                formal_parameters(node)
                    .into_iter()
                    .map(|(name, _)| Declared::new(tree, name, SymbolKind::Parameter).inner()),
            );
            return declared;
        }

        match kind {
            "variable_declarator"
                if node
                    .parent()
                    .is_some_and(|p| p.kind() == "local_variable_declaration") =>
            {
                node.child_by_field_name("name")
                    .map(|n| vec![Declared::new(tree, n, SymbolKind::Variable)])
                    .unwrap_or_default()
            }
            "catch_formal_parameter" => node
                .child_by_field_name("name")
                .map(|n| vec![Declared::new(tree, n, SymbolKind::Parameter)])
                .unwrap_or_default(),
            "enhanced_for_statement" => node
                .child_by_field_name("name")
                .map(|n| vec![Declared::new(tree, n, SymbolKind::Variable).inner()])
                .unwrap_or_default(),
            "import_declaration" => {
                // `import a.b.C;` binds `C`; wildcard imports bind nothing.
                let Some(path) = named_children(node)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                else {
                    return Vec::new();
                };
                if named_children(node).iter().any(|n| n.kind() == "asterisk") {
                    return Vec::new();
                }
                let bound = path.child_by_field_name("name").unwrap_or(path);
                vec![Declared::new(tree, bound, SymbolKind::Import)]
            }
            _ => Vec::new(),
        }
    }

    fn is_reference(&self, _tree: &SourceTree, node: Node<'_>) -> bool {
        if node.kind() != "identifier" {
            return false;
        }
        if let Some(parent) = node.parent() {
            let member = parent.kind() == "field_access" && is_field(parent, "field", node);
            // `obj.name()` is a member; a bare `name()` may be a static import.
            let method = parent.kind() == "method_invocation"
                && is_field(parent, "name", node)
                && parent.child_by_field_name("object").is_some();
            if member || method {
                return false;
            }
        }
        ancestor(node, |k| k == "import_declaration" || k == "package_declaration").is_none()
    }

    fn imports(&self, tree: &SourceTree) -> anyhow::Result<Vec<ImportRef>> {
        Ok(captures(&self.imports, tree)
            .into_iter()
            .map(|(_, node)| {
                let path = tree
                    .text(node)
                    .trim()
                    .trim_start_matches("import")
                    .trim_end_matches(';')
                    .trim();
                let path = path.strip_prefix("static ").unwrap_or(path).trim();
                ImportRef {
                    path: path.to_string(),
                    kind: ImportKind::Import,
                    line: line_of(node),
                    column: column_of(node),
                    names: Vec::new(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{build_symbol_table, collect_functions};
    use crate::parser::parse_with;

    const SOURCE: &str = r#"package com.example;

import java.util.List;
import static java.util.Collections.emptyList;

public class Users {
    /** Look up every user. */
    public List<String> all(int limit, String... tags) {
        List<String> out = emptyList();
        for (String tag : tags) {
            out.add(tag);
        }
        return out;
    }

    void reset() {}
}
"#;

    #[test]
    fn test_methods() {
        let cap = capability().unwrap();
        let outcome = parse_with(SOURCE, &cap);
        let functions = collect_functions(outcome.tree().unwrap(), &cap);
        assert_eq!(functions.len(), 2);

        let all = &functions[0];
        assert_eq!(all.receiver.as_deref(), Some("Users"));
        assert_eq!(all.visibility, Visibility::Public);
        assert_eq!(all.return_type.as_deref(), Some("List<String>"));
        assert_eq!(all.doc_comment.as_deref(), Some("Look up every user."));
        let params: Vec<_> = all
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_name.as_deref()))
            .collect();
        assert_eq!(params, vec![("limit", Some("int")), ("tags", Some("String..."))]);

        assert_eq!(functions[1].visibility, Visibility::Private);
    }

    #[test]
    fn test_imports_and_symbols() {
        let cap = capability().unwrap();
        let outcome = parse_with(SOURCE, &cap);
        let tree = outcome.tree().unwrap();

        let imports = cap.extractor.imports(tree).unwrap();
        let paths: Vec<_> = imports.iter().map(|i| (i.path.as_str(), i.line)).collect();
        assert_eq!(
            paths,
            vec![("java.util.List", 3), ("java.util.Collections.emptyList", 4)]
        );

        let table = build_symbol_table(tree, &cap);
        for name in ["emptyList", "tags", "out", "tag"] {
            let symbols = table.lookup(name);
            assert_eq!(symbols.len(), 1, "{name}");
            assert!(!symbols[0].references.is_empty(), "{name} unreferenced");
        }
    }
}
