//! TypeScript capability bundle.
//!
//! Shares the JavaScript detector and extractor; only the grammar and the
//! class-like declarations differ. `.tsx` files use the plain TypeScript
//! grammar.

use tree_sitter::{Language, Parser};

use super::javascript::{self, JavaScriptDetector, JavaScriptExtractor};
use super::parser_for;
use crate::registry::{LanguageCapability, NodeVocabulary};

/// Build the TypeScript capability.
pub fn capability() -> anyhow::Result<LanguageCapability> {
    let language: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
    Ok(LanguageCapability {
        id: "typescript".to_string(),
        extensions: &["ts", "tsx", "mts", "cts"],
        parser_factory: create_parser,
        detector: Box::new(JavaScriptDetector),
        extractor: Box::new(JavaScriptExtractor::new(&language)?),
        vocabulary: vocabulary(),
    })
}

fn create_parser() -> anyhow::Result<Parser> {
    parser_for(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
}

fn vocabulary() -> NodeVocabulary {
    NodeVocabulary {
        classes: &[
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
        ],
        hoisted: &[
            "function_declaration",
            "generator_function_declaration",
            "interface_declaration",
            "type_alias_declaration",
        ],
        ..javascript::vocabulary()
    }
}
