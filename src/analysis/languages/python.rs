//! Python capability bundle.

use tree_sitter::{Language, Node, Parser, Query};

use super::{captures, field_children, import_ref, parser_for};
use crate::analysis::{
    leading_comment, unquote, Declared, ImportKind, ImportRef, LanguageDetector,
    LanguageExtractor, ParameterInfo, SymbolKind, Visibility,
};
use crate::detect::{python_misuse, DetectContext, Finding, Sinks};
use crate::parser::{ancestor, is_field, named_children, SourceTree};
use crate::registry::{LanguageCapability, NodeVocabulary};

const IMPORT_QUERY: &str = r#"
(import_statement
  name: (dotted_name) @module)

(import_statement
  name: (aliased_import
    name: (dotted_name) @module))

(import_from_statement
  module_name: (_) @module)
"#;

static PYTHON_SINKS: Sinks = Sinks {
    sql: &[
        "execute",
        "executemany",
        "executescript",
        "raw",
        "read_sql",
        "read_sql_query",
    ],
    xss: &[
        "render_template_string",
        "Markup",
        "mark_safe",
        "HttpResponse",
        "make_response",
    ],
    xss_properties: &[],
    command: &[
        "os.system",
        "os.popen",
        "subprocess.run",
        "subprocess.call",
        "subprocess.Popen",
        "subprocess.check_output",
        "subprocess.check_call",
    ],
    shell_kwarg: &[
        "subprocess.run",
        "subprocess.call",
        "subprocess.Popen",
        "subprocess.check_output",
        "subprocess.check_call",
    ],
    shells: &["sh", "bash", "zsh"],
    weak_crypto: &["hashlib.md5", "hashlib.sha1"],
    crypto_factories: &["hashlib.new"],
    formatters: &["format"],
    sanitizers: &["html.escape", "shlex.quote", "bleach.clean"],
};

/// Parameter node kinds inside `parameters` and `lambda_parameters`.
const PARAMETER_KINDS: &[&str] = &[
    "identifier",
    "default_parameter",
    "typed_parameter",
    "typed_default_parameter",
    "list_splat_pattern",
    "dictionary_splat_pattern",
];

/// Build the Python capability.
pub fn capability() -> anyhow::Result<LanguageCapability> {
    Ok(LanguageCapability {
        id: "python".to_string(),
        extensions: &["py", "pyi"],
        parser_factory: create_parser,
        detector: Box::new(PythonDetector),
        extractor: Box::new(PythonExtractor::new()?),
        vocabulary: vocabulary(),
    })
}

fn create_parser() -> anyhow::Result<Parser> {
    parser_for(&tree_sitter_python::LANGUAGE.into())
}

fn vocabulary() -> NodeVocabulary {
    NodeVocabulary {
        functions: &["function_definition", "lambda"],
        classes: &["class_definition"],
        calls: &["call"],
        blocks: &["block", "module"],
        scopes: &[
            "function_definition",
            "lambda",
            "class_definition",
            "list_comprehension",
            "dictionary_comprehension",
            "set_comprehension",
            "generator_expression",
        ],
        terminators: &[
            "return_statement",
            "raise_statement",
            "break_statement",
            "continue_statement",
        ],
        strings: &["string", "concatenated_string"],
        interpolations: &["interpolation"],
        binary_ops: &["binary_operator"],
        identifiers: &["identifier"],
        assignments: &["assignment", "augmented_assignment", "pair"],
        catches: &["except_clause"],
        comments: &["comment"],
        hoisted: &[],
    }
}

pub struct PythonDetector;

impl LanguageDetector for PythonDetector {
    fn sinks(&self) -> &Sinks {
        &PYTHON_SINKS
    }

    fn detect_async_misuse(&self, ctx: &DetectContext<'_>) -> anyhow::Result<Vec<Finding>> {
        Ok(python_misuse(ctx))
    }
}

pub struct PythonExtractor {
    imports: Query,
}

impl PythonExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        Ok(Self {
            imports: Query::new(&language, IMPORT_QUERY)?,
        })
    }
}

/// Imported names of `from m import a, b as c`, skipping `*`.
fn from_import_names(tree: &SourceTree, statement: Node<'_>) -> Vec<String> {
    field_children(statement, "name")
        .into_iter()
        .filter_map(|name| match name.kind() {
            "aliased_import" => name.child_by_field_name("name"),
            "dotted_name" => Some(name),
            _ => None,
        })
        .map(|name| tree.text(name).to_string())
        .collect()
}

/// Node holding the bound name of one parameter.
fn parameter_name(param: Node<'_>) -> Option<Node<'_>> {
    match param.kind() {
        "identifier" => Some(param),
        "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
        "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            let first = param.named_child(0)?;
            if first.kind() == "identifier" {
                Some(first)
            } else {
                parameter_name(first)
            }
        }
        _ => None,
    }
}

fn parameter_nodes(function: Node<'_>) -> Vec<Node<'_>> {
    function
        .child_by_field_name("parameters")
        .map(|list| {
            named_children(list)
                .into_iter()
                .filter(|p| PARAMETER_KINDS.contains(&p.kind()))
                .collect()
        })
        .unwrap_or_default()
}

/// Identifiers bound by an assignment or loop target.
fn binding_targets(node: Node<'_>) -> Vec<Node<'_>> {
    match node.kind() {
        "identifier" => vec![node],
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" | "tuple"
        | "list" | "expression_list" => named_children(node)
            .into_iter()
            .flat_map(binding_targets)
            .collect(),
        _ => Vec::new(),
    }
}

fn is_private_name(name: &str) -> bool {
    name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__"))
}

fn in_import(node: Node<'_>) -> bool {
    ancestor(node, |k| k == "import_statement" || k == "import_from_statement").is_some()
}

impl PythonExtractor {
    fn import_declarations<'t>(&self, tree: &SourceTree, statement: Node<'t>) -> Vec<Declared<'t>> {
        let from_import = statement.kind() == "import_from_statement";
        field_children(statement, "name")
            .into_iter()
            .filter_map(|name| {
                if name.kind() == "aliased_import" {
                    let alias = name.child_by_field_name("alias")?;
                    return Some(Declared::new(tree, alias, SymbolKind::Import));
                }
                let dotted = tree.text(name);
                // `import a.b` binds `a`; `from m import a` binds `a`.
                let bound = if from_import {
                    dotted.rsplit('.').next()
                } else {
                    dotted.split('.').next()
                }?;
                Some(Declared::named(bound.to_string(), name, SymbolKind::Import))
            })
            .collect()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn receiver(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        let owner = ancestor(node, |k| k == "class_definition" || k == "function_definition")?;
        if owner.kind() != "class_definition" {
            return None;
        }
        owner
            .child_by_field_name("name")
            .map(|n| tree.text(n).to_string())
    }

    fn parameters(&self, tree: &SourceTree, node: Node<'_>) -> Vec<ParameterInfo> {
        parameter_nodes(node)
            .into_iter()
            .filter_map(|param| {
                let name_node = parameter_name(param)?;
                let name = tree.text(name_node);
                if name == "self" || name == "cls" {
                    return None;
                }
                let label = match name_node.parent() {
                    Some(p) if p.kind().ends_with("splat_pattern") => tree.text(p),
                    _ => name,
                };
                Some(ParameterInfo {
                    name: label.to_string(),
                    type_name: param
                        .child_by_field_name("type")
                        .map(|t| tree.text(t).to_string()),
                })
            })
            .collect()
    }

    fn return_type(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        node.child_by_field_name("return_type")
            .map(|n| tree.text(n).to_string())
    }

    fn doc_comment(&self, tree: &SourceTree, node: Node<'_>) -> Option<String> {
        let docstring = node
            .child_by_field_name("body")
            .and_then(|body| named_children(body).into_iter().next())
            .filter(|first| first.kind() == "expression_statement")
            .and_then(|stmt| stmt.named_child(0))
            .filter(|expr| expr.kind() == "string");
        match docstring {
            Some(string) => {
                let doc = unquote(tree.text(string)).trim();
                (!doc.is_empty()).then(|| doc.to_string())
            }
            None => leading_comment(tree, node),
        }
    }

    fn visibility(&self, _tree: &SourceTree, _node: Node<'_>, name: &str) -> Visibility {
        if is_private_name(name) {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    fn declarations<'t>(&self, tree: &SourceTree, node: Node<'t>) -> Vec<Declared<'t>> {
        match node.kind() {
            "function_definition" | "lambda" => {
                let mut declared = Vec::new();
                if let Some(name) = node.child_by_field_name("name") {
                    let decl = Declared::new(tree, name, SymbolKind::Function);
                    let exported = !decl.name.starts_with('_');
                    declared.push(decl.exported(exported));
                }
                declared.extend(
                    parameter_nodes(node)
                        .into_iter()
                        .filter_map(parameter_name)
                        .map(|n| Declared::new(tree, n, SymbolKind::Parameter).inner()),
                );
                declared
            }
            "class_definition" => node
                .child_by_field_name("name")
                .map(|name| {
                    let decl = Declared::new(tree, name, SymbolKind::Class);
                    let exported = !decl.name.starts_with('_');
                    vec![decl.exported(exported)]
                })
                .unwrap_or_default(),
            "assignment" | "for_statement" => node
                .child_by_field_name("left")
                .map(|left| {
                    binding_targets(left)
                        .into_iter()
                        .map(|n| Declared::new(tree, n, SymbolKind::Variable))
                        .collect()
                })
                .unwrap_or_default(),
            "except_clause" => {
                // `except E as e` binds the identifier after `as`.
                let mut cursor = node.walk();
                let children: Vec<_> = node.children(&mut cursor).collect();
                children
                    .windows(2)
                    .find(|pair| pair[0].kind() == "as" && pair[1].kind() == "identifier")
                    .map(|pair| vec![Declared::new(tree, pair[1], SymbolKind::Variable)])
                    .unwrap_or_default()
            }
            "import_statement" | "import_from_statement" => self.import_declarations(tree, node),
            _ => Vec::new(),
        }
    }

    fn is_reference(&self, _tree: &SourceTree, node: Node<'_>) -> bool {
        if node.kind() != "identifier" {
            return false;
        }
        if let Some(parent) = node.parent() {
            let member = parent.kind() == "attribute" && is_field(parent, "attribute", node);
            let keyword = parent.kind() == "keyword_argument" && is_field(parent, "name", node);
            if member || keyword {
                return false;
            }
        }
        !in_import(node)
    }

    fn imports(&self, tree: &SourceTree) -> anyhow::Result<Vec<ImportRef>> {
        Ok(captures(&self.imports, tree)
            .into_iter()
            .map(|(_, node)| {
                let mut import = import_ref(tree, node, ImportKind::Import);
                if let Some(statement) = node.parent().filter(|p| p.kind() == "import_from_statement") {
                    import.names = from_import_names(tree, statement);
                }
                import
            })
            .collect())
    }
}
