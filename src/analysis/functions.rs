//! Function extraction shared by every language.

use tree_sitter::Node;

use super::FunctionInfo;
use crate::parser::{line_of, SourceTree};
use crate::registry::{LanguageCapability, NodeVocabulary};

/// Every function-like node in the tree, in source order.
pub fn function_nodes<'t>(tree: &'t SourceTree, vocab: &NodeVocabulary) -> Vec<Node<'t>> {
    tree.nodes()
        .filter(|n| n.is_named() && vocab.is_function(n.kind()))
        .collect()
}

/// Describe one function node. Anonymous functions yield `None`.
pub fn describe_function(
    tree: &SourceTree,
    capability: &LanguageCapability,
    node: Node<'_>,
) -> Option<FunctionInfo> {
    let extractor = &capability.extractor;
    let name = extractor.function_name(tree, node)?;
    let end = node.end_position();

    Some(FunctionInfo {
        visibility: extractor.visibility(tree, node, &name),
        parameters: extractor.parameters(tree, node),
        return_type: extractor.return_type(tree, node),
        doc_comment: extractor.doc_comment(tree, node),
        receiver: extractor.receiver(tree, node),
        language: capability.id.clone(),
        start_line: line_of(node),
        start_column: node.start_position().column + 1,
        end_line: end.row + 1,
        end_column: end.column + 1,
        code: tree.text(node).to_string(),
        name,
    })
}

/// All named functions, sorted by position.
pub fn collect_functions(tree: &SourceTree, capability: &LanguageCapability) -> Vec<FunctionInfo> {
    let mut functions: Vec<FunctionInfo> = function_nodes(tree, &capability.vocabulary)
        .into_iter()
        .filter_map(|node| describe_function(tree, capability, node))
        .collect();

    // Sort by position for deterministic output
    functions.sort_by_key(|f| (f.start_line, f.start_column));
    functions
}

/// Keep functions whose name contains `filter`, ignoring case.
///
/// An empty filter keeps everything.
pub fn filter_by_name(functions: Vec<FunctionInfo>, filter: &str) -> Vec<FunctionInfo> {
    let needle = filter.trim().to_lowercase();
    if needle.is_empty() {
        return functions;
    }
    functions
        .into_iter()
        .filter(|f| f.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{languages, Visibility};
    use crate::parser::{parse_with, ParseOutcome};

    fn extract(language: LanguageCapability, source: &str) -> Vec<FunctionInfo> {
        match parse_with(source, &language) {
            ParseOutcome::Full(tree) | ParseOutcome::Partial(tree, _) => {
                collect_functions(&tree, &language)
            }
            ParseOutcome::Failed(e) => panic!("parse failed: {e}"),
        }
    }

    #[test]
    fn test_go_functions_and_methods() {
        let source = r#"
package main

// Validate checks the config.
func (c *Config) Validate() error {
    return nil
}

func helper(a, b int, name string) (int, error) {
    return a + b, nil
}
"#;
        let functions = extract(languages::go::capability().unwrap(), source);
        assert_eq!(functions.len(), 2);

        let validate = &functions[0];
        assert_eq!(validate.name, "Validate");
        assert_eq!(validate.receiver.as_deref(), Some("Config"));
        assert_eq!(validate.visibility, Visibility::Exported);
        assert_eq!(validate.doc_comment.as_deref(), Some("Validate checks the config."));
        assert_eq!(validate.start_line, 5);
        assert_eq!(validate.end_line, 7);

        let helper = &functions[1];
        assert_eq!(helper.visibility, Visibility::Private);
        let names: Vec<_> = helper.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "name"]);
        assert_eq!(helper.parameters[2].type_name.as_deref(), Some("string"));
        assert_eq!(helper.return_type.as_deref(), Some("(int, error)"));
    }

    #[test]
    fn test_filter_by_name() {
        let source = "def AuthHandler():\n    pass\n\ndef other():\n    pass\n";
        let functions = extract(languages::python::capability().unwrap(), source);
        let filtered = filter_by_name(functions.clone(), "auth");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "AuthHandler");
        assert_eq!(filter_by_name(functions, "").len(), 2);
    }
}
