//! JavaScript capability bundle.
//!
//! The extractor also understands the TypeScript-only parameter and
//! annotation nodes, so the TypeScript bundle reuses it with its own
//! grammar.

use tree_sitter::{Language, Node, Parser, Query};

use super::{captures, import_ref, parser_for, pattern_identifiers};
use crate::analysis::{
    unquote, Declared, ImportKind, ImportRef, LanguageDetector, LanguageExtractor, ParameterInfo,
    SymbolKind, Visibility,
};
use crate::detect::{javascript_misuse, DetectContext, Finding, Sinks};
use crate::parser::{ancestor, descendants_until, is_field, named_children, SourceTree};
use crate::registry::{LanguageCapability, NodeVocabulary};

const IMPORT_QUERY: &str = r#"
(import_statement
  source: (string) @import)

(export_statement
  source: (string) @import)

((call_expression
  function: (identifier) @_callee
  arguments: (arguments . (string) @require))
 (#eq? @_callee "require"))

(call_expression
  function: (import)
  arguments: (arguments . (string) @dynamic))
"#;

pub(crate) static JS_SINKS: Sinks = Sinks {
    sql: &["query", "execute", "raw", "$queryRawUnsafe", "$executeRawUnsafe"],
    xss: &[
        "document.write",
        "document.writeln",
        "res.send",
        "res.write",
        "insertAdjacentHTML",
    ],
    xss_properties: &["innerHTML", "outerHTML"],
    command: &["child_process.exec", "execSync", "spawn", "spawnSync", "execFile"],
    shell_kwarg: &[],
    shells: &["sh", "bash", "zsh", "cmd", "powershell"],
    weak_crypto: &[],
    crypto_factories: &["createHash", "createCipheriv", "createHmac"],
    formatters: &["util.format"],
    sanitizers: &["DOMPurify.sanitize", "encodeURIComponent", "escapeHtml"],
};

pub(crate) const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "arrow_function",
    "method_definition",
    "generator_function_declaration",
    "generator_function",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "class", "abstract_class_declaration"];

/// Node kinds a destructuring pattern binds.
const BINDING_KINDS: &[&str] = &["identifier", "shorthand_property_identifier_pattern"];

/// Build the JavaScript capability.
pub fn capability() -> anyhow::Result<LanguageCapability> {
    let language: Language = tree_sitter_javascript::LANGUAGE.into();
    Ok(LanguageCapability {
        id: "javascript".to_string(),
        extensions: &["js", "jsx", "mjs", "cjs"],
        parser_factory: create_parser,
        detector: Box::new(JavaScriptDetector),
        extractor: Box::new(JavaScriptExtractor::new(&language)?),
        vocabulary: vocabulary(),
    })
}

fn create_parser() -> anyhow::Result<Parser> {
    parser_for(&tree_sitter_javascript::LANGUAGE.into())
}

pub(crate) fn vocabulary() -> NodeVocabulary {
    NodeVocabulary {
        functions: FUNCTION_KINDS,
        classes: &["class_declaration"],
        calls: &["call_expression", "new_expression"],
        blocks: &["statement_block", "program", "switch_case"],
        scopes: &[
            "function_declaration",
            "function_expression",
            "arrow_function",
            "method_definition",
            "generator_function_declaration",
            "generator_function",
            "statement_block",
            "for_statement",
            "for_in_statement",
            "catch_clause",
        ],
        terminators: &[
            "return_statement",
            "throw_statement",
            "break_statement",
            "continue_statement",
        ],
        strings: &["string", "template_string"],
        interpolations: &["template_substitution"],
        binary_ops: &["binary_expression"],
        identifiers: &["identifier", "shorthand_property_identifier"],
        assignments: &[
            "assignment_expression",
            "augmented_assignment_expression",
            "variable_declarator",
            "pair",
        ],
        catches: &["catch_clause"],
        comments: &["comment"],
        hoisted: &["function_declaration", "generator_function_declaration"],
    }
}

pub struct JavaScriptDetector;

impl LanguageDetector for JavaScriptDetector {
    fn sinks(&self) -> &Sinks {
        &JS_SINKS
    }

    fn detect_async_misuse(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        Ok(javascript_misuse(ctx))
    }
}

pub struct JavaScriptExtractor {
    imports: Query,
}

impl JavaScriptExtractor {
    /// Compile the import query against `language` (JavaScript or TypeScript).
    pub fn new(language: &Language) -> anyhow::Result<Self> {
        Ok(Self {
            imports: Query::new(language, IMPORT_QUERY)?,
        })
    }
}

/// Names in `import { a, b as c }` or `export { a } from`, as the source
/// module spells them. Default and namespace imports carry no name.
fn named_imports(tree: &SourceTree, statement: Node<'_>) -> Vec<String> {
    descendants_until(statement, |_| false)
        .into_iter()
        .filter(|n| matches!(n.kind(), "import_specifier" | "export_specifier"))
        .filter_map(|n| n.child_by_field_name("name"))
        .map(|n| unquote(tree.text(n)).to_string())
        .collect()
}

/// Whether a declaration sits under `export`, looking through
/// `const x = ...` wrappers.
fn is_exported(node: Node<'_>) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "export_statement" => return true,
            "variable_declarator" | "lexical_declaration" | "variable_declaration" => {
                current = parent
            }
            _ => return false,
        }
    }
    false
}

/// Type text of a `: T` annotation.
fn annotation_text(tree: &SourceTree, annotation: Node<'_>) -> String {
    tree.text(annotation)
        .trim_start_matches(':')
        .trim()
        .to_string()
}

/// Parameter node, the node naming it, and its type annotation.
fn parameter_parts(param: Node<'_>) -> Option<(Node<'_>, Option<Node<'_>>)> {
    match param.kind() {
        "required_parameter" | "optional_parameter" => Some((
            param.child_by_field_name("pattern")?,
            param.child_by_field_name("type"),
        )),
        "assignment_pattern" => Some((param.child_by_field_name("left")?, None)),
        _ => Some((param, None)),
    }
}

fn parameter_list(function: Node<'_>) -> Vec<Node<'_>> {
    // `x => x` keeps its lone parameter under a different field.
    if let Some(single) = function.child_by_field_name("parameter") {
        return vec![single];
    }
    function
        .child_by_field_name("parameters")
        .map(named_children)
        .unwrap_or_default()
}

fn name_and_kind<'t>(tree: &SourceTree, node: Node<'t>) -> Option<Declared<'t>> {
    let kind = if CLASS_KINDS.contains(&node.kind()) || node.kind() == "interface_declaration" {
        SymbolKind::Class
    } else {
        SymbolKind::Function
    };
    let name = node.child_by_field_name("name")?;
    Some(Declared::new(tree, name, kind).exported(is_exported(node)))
}

fn import_bindings<'t>(tree: &SourceTree, statement: Node<'t>) -> Vec<Declared<'t>> {
    let Some(clause) = named_children(statement)
        .into_iter()
        .find(|n| n.kind() == "import_clause")
    else {
        return Vec::new();
    };

    let mut bound = Vec::new();
    for child in named_children(clause) {
        match child.kind() {
            "identifier" => bound.push(child),
            "namespace_import" => bound.extend(
                named_children(child)
                    .into_iter()
                    .filter(|n| n.kind() == "identifier"),
            ),
            "named_imports" => {
                for spec in named_children(child)
                    .into_iter()
                    .filter(|n| n.kind() == "import_specifier")
                {
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(local) = local.filter(|n| n.kind() == "identifier") {
                        bound.push(local);
                    }
                }
            }
            _ => {}
        }
    }
    bound
        .into_iter()
        .map(|n| Declared::new(tree, n, SymbolKind::Import))
        .collect()
}

impl LanguageExtractor for JavaScriptExtractor {
    fn function_name(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            let text = tree.text(name);
            return (!text.is_empty()).then(|| text.to_string());
        }

        // Anonymous functions take the name they are bound to.
        let parent = node.parent()?;
        let bound = match parent.kind() {
            "variable_declarator" if is_field(parent, "value", node) => {
                parent.child_by_field_name("name")
            }
            "pair" if is_field(parent, "value", node) => parent.child_by_field_name("key"),
            "assignment_expression" if is_field(parent, "right", node) => {
                parent.child_by_field_name("left")
            }
            "field_definition" => parent.child_by_field_name("property"),
            "public_field_definition" => parent.child_by_field_name("name"),
            _ => None,
        }?;
        if bound.kind().ends_with("pattern") {
            return None;
        }
        let text = unquote(tree.text(bound));
        let name = text.rsplit('.').next().unwrap_or(text);
        (!name.is_empty()).then(|| name.to_string())
    }

    fn receiver(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        let owner = ancestor(node, |k| FUNCTION_KINDS.contains(&k) || CLASS_KINDS.contains(&k))?;
        if !CLASS_KINDS.contains(&owner.kind()) {
            return None;
        }
        owner
            .child_by_field_name("name")
            .map(|n| tree.text(n).to_string())
    }

    fn parameters(&self, tree: &SourceTree, node: Node<'_>) -> Vec<ParameterInfo> {
        parameter_list(node)
            .into_iter()
            .filter_map(parameter_parts)
            .map(|(name, type_node)| ParameterInfo {
                name: tree.text(name).to_string(),
                type_name: type_node.map(|t| annotation_text(tree, t)),
            })
            .collect()
    }

    fn return_type(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        node.child_by_field_name("return_type")
            .map(|n| annotation_text(tree, n))
    }

    fn visibility(&self, tree: &SourceTree, node: Node<'_>, name: &str) -> Visibility {
        let mut cursor = node.walk();
        let private_modifier = node.children(&mut cursor).any(|c| {
            c.kind() == "accessibility_modifier" && matches!(tree.text(c), "private" | "protected")
        });
        if name.starts_with('#') || private_modifier {
            Visibility::Private
        } else if is_exported(node) {
            Visibility::Exported
        } else {
            Visibility::Public
        }
    }

    fn declarations<'t>(&self, tree: &SourceTree, node: Node<'t>) -> Vec<Declared<'t>> {
        let params = || {
            parameter_list(node)
                .into_iter()
                .filter_map(parameter_parts)
                .flat_map(|(name, _)| pattern_identifiers(tree, name, BINDING_KINDS))
                .map(|n| Declared::new(tree, n, SymbolKind::Parameter).inner())
                .collect::<Vec<_>>()
        };

        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let mut declared: Vec<_> = name_and_kind(tree, node).into_iter().collect();
                declared.extend(params());
                declared
            }
            "function_expression" | "generator_function" | "arrow_function"
            | "method_definition" => params(),
            "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                name_and_kind(tree, node).into_iter().collect()
            }
            "variable_declarator" => {
                let exported = is_exported(node);
                node.child_by_field_name("name")
                    .map(|name| {
                        pattern_identifiers(tree, name, BINDING_KINDS)
                            .into_iter()
                            .map(|n| Declared::new(tree, n, SymbolKind::Variable).exported(exported))
                            .collect()
                    })
                    .unwrap_or_default()
            }
            "catch_clause" => node
                .child_by_field_name("parameter")
                .map(|param| {
                    pattern_identifiers(tree, param, BINDING_KINDS)
                        .into_iter()
                        .map(|n| Declared::new(tree, n, SymbolKind::Parameter).inner())
                        .collect()
                })
                .unwrap_or_default(),
            // Only `for (const x of xs)` declares; `for (x of xs)` assigns.
            "for_in_statement" if node.child_by_field_name("kind").is_some() => node
                .child_by_field_name("left")
                .map(|left| {
                    pattern_identifiers(tree, left, BINDING_KINDS)
                        .into_iter()
                        .map(|n| Declared::new(tree, n, SymbolKind::Variable).inner())
                        .collect()
                })
                .unwrap_or_default(),
            "import_statement" => import_bindings(tree, node),
            _ => Vec::new(),
        }
    }

    fn is_reference(&self, _tree: &SourceTree, node: Node<'_>) -> bool {
        matches!(node.kind(), "identifier" | "shorthand_property_identifier")
            && ancestor(node, |k| k == "import_statement").is_none()
    }

    fn imports(&self, tree: &SourceTree) -> anyhow::Result<Vec<ImportRef>> {
        let mut imports: Vec<ImportRef> = captures(&self.imports, tree)
            .into_iter()
            .filter_map(|(capture, node)| {
                let kind = match capture {
                    "import" => ImportKind::Import,
                    "require" => ImportKind::Require,
                    "dynamic" => ImportKind::Dynamic,
                    _ => return None,
                };
                let mut import = import_ref(tree, node, kind);
                if kind == ImportKind::Import {
                    if let Some(statement) = node.parent() {
                        import.names = named_imports(tree, statement);
                    }
                }
                Some(import)
            })
            .collect();
        imports.sort_by_key(|i| (i.line, i.column));
        Ok(imports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{build_symbol_table, collect_functions};
    use crate::parser::parse_with;

    #[test]
    fn test_import_forms() {
        let cap = capability().unwrap();
        let source = r#"import React from 'react';
const fs = require('fs');
export { helper } from './helper';

async function load() {
  const mod = await import('./lazy');
  return mod;
}
"#;
        let outcome = parse_with(source, &cap);
        let imports = cap.extractor.imports(outcome.tree().unwrap()).unwrap();
        let found: Vec<_> = imports
            .iter()
            .map(|i| (i.path.as_str(), i.kind, i.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("react", ImportKind::Import, 1),
                ("fs", ImportKind::Require, 2),
                ("./helper", ImportKind::Import, 3),
                ("./lazy", ImportKind::Dynamic, 6),
            ]
        );
    }

    #[test]
    fn test_bound_names_and_visibility() {
        let cap = capability().unwrap();
        let source = r#"export const handler = async (req, res) => {
  res.end();
};

class Store {
  get(key) { return key; }
}

function local() {}
"#;
        let outcome = parse_with(source, &cap);
        let functions = collect_functions(outcome.tree().unwrap(), &cap);
        let summary: Vec<_> = functions
            .iter()
            .map(|f| (f.name.as_str(), f.visibility, f.receiver.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("handler", Visibility::Exported, None),
                ("get", Visibility::Public, Some("Store")),
                ("local", Visibility::Public, None),
            ]
        );
        let params: Vec<_> = functions[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["req", "res"]);
    }

    #[test]
    fn test_named_imports_are_carried() {
        let cap = capability().unwrap();
        let source = "import React, { useState, useEffect as effect } from 'react';\nimport * as path from 'path';\nexport { helper } from './helper';\n";
        let outcome = parse_with(source, &cap);
        let imports = cap.extractor.imports(outcome.tree().unwrap()).unwrap();
        let names: Vec<_> = imports
            .iter()
            .map(|i| (i.path.as_str(), i.names.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("react", vec!["useState".to_string(), "useEffect".to_string()]),
                ("path", Vec::new()),
                ("./helper", vec!["helper".to_string()]),
            ]
        );
    }

    #[test]
    fn test_destructured_parameters_and_imports_resolve() {
        let cap = capability().unwrap();
        let source = "import { join as pathJoin } from 'path';\n\nfunction build({ root }, ...parts) {\n  return pathJoin(root, ...parts);\n}\n";
        let outcome = parse_with(source, &cap);
        let table = build_symbol_table(outcome.tree().unwrap(), &cap);
        for name in ["pathJoin", "root", "parts"] {
            let symbols = table.lookup(name);
            assert_eq!(symbols.len(), 1, "{name}");
            assert!(!symbols[0].references.is_empty(), "{name} unreferenced");
        }
        assert!(table.lookup("join").is_empty());
    }
}
