//! Language registry: maps a language id to its capability bundle.
//!
//! Every other component asks the registry for a [`LanguageCapability`]
//! instead of branching on language names. A miss is not an error; it routes
//! the call to the generic text tier.
//!
//! Registration happens once at start-up through
//! [`register_builtin_languages`]. Late registration is allowed and guarded
//! by the lock, but is expected to be rare.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::analysis::{LanguageDetector, LanguageExtractor};

/// Factory producing a parser configured for one grammar.
pub type ParserFactory = fn() -> anyhow::Result<tree_sitter::Parser>;

/// Grammar-specific node kind names.
///
/// Different grammars label the same construct differently (`call` vs
/// `call_expression`); detectors work through these lists.
#[derive(Debug, Clone, Default)]
pub struct NodeVocabulary {
    /// Function-like nodes, including anonymous ones.
    pub functions: &'static [&'static str],
    /// Class-like declarations.
    pub classes: &'static [&'static str],
    /// Call and construction expressions.
    pub calls: &'static [&'static str],
    /// Statement containers checked for unreachable code.
    pub blocks: &'static [&'static str],
    /// Nodes that open a lexical scope.
    pub scopes: &'static [&'static str],
    /// Unconditional control transfer statements.
    pub terminators: &'static [&'static str],
    /// String literal nodes (outermost kind only).
    pub strings: &'static [&'static str],
    /// Interpolation nodes inside template strings.
    pub interpolations: &'static [&'static str],
    /// Binary operator expressions.
    pub binary_ops: &'static [&'static str],
    /// Identifier kinds that count as uses.
    pub identifiers: &'static [&'static str],
    /// Assignment, declaration and key/value binding nodes.
    pub assignments: &'static [&'static str],
    /// Catch / except clauses.
    pub catches: &'static [&'static str],
    /// Comment kinds.
    pub comments: &'static [&'static str],
    /// Declarations bound before the enclosing block runs, so their
    /// position after a terminator is not dead code.
    pub hoisted: &'static [&'static str],
}

impl NodeVocabulary {
    pub fn is_function(&self, kind: &str) -> bool {
        self.functions.contains(&kind)
    }

    pub fn is_class(&self, kind: &str) -> bool {
        self.classes.contains(&kind)
    }

    pub fn is_call(&self, kind: &str) -> bool {
        self.calls.contains(&kind)
    }

    pub fn is_block(&self, kind: &str) -> bool {
        self.blocks.contains(&kind)
    }

    pub fn is_scope(&self, kind: &str) -> bool {
        self.scopes.contains(&kind)
    }

    pub fn is_terminator(&self, kind: &str) -> bool {
        self.terminators.contains(&kind)
    }

    pub fn is_string(&self, kind: &str) -> bool {
        self.strings.contains(&kind)
    }

    pub fn is_interpolation(&self, kind: &str) -> bool {
        self.interpolations.contains(&kind)
    }

    pub fn is_binary(&self, kind: &str) -> bool {
        self.binary_ops.contains(&kind)
    }

    pub fn is_identifier(&self, kind: &str) -> bool {
        self.identifiers.contains(&kind)
    }

    pub fn is_assignment(&self, kind: &str) -> bool {
        self.assignments.contains(&kind)
    }

    pub fn is_catch(&self, kind: &str) -> bool {
        self.catches.contains(&kind)
    }

    pub fn is_comment(&self, kind: &str) -> bool {
        self.comments.contains(&kind)
    }

    pub fn is_hoisted(&self, kind: &str) -> bool {
        self.hoisted.contains(&kind)
    }
}

/// Everything the engine needs to analyze one language.
pub struct LanguageCapability {
    /// Language id (e.g., "go", "python").
    pub id: String,
    /// File extensions without the dot.
    pub extensions: &'static [&'static str],
    pub parser_factory: ParserFactory,
    pub detector: Box<dyn LanguageDetector>,
    pub extractor: Box<dyn LanguageExtractor>,
    pub vocabulary: NodeVocabulary,
}

impl std::fmt::Debug for LanguageCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageCapability")
            .field("id", &self.id)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Normalize a caller-supplied language id.
///
/// Lowercases and maps common aliases. Unknown ids pass through unchanged.
pub fn normalize_language_id(id: &str) -> String {
    let lower = id.trim().to_lowercase();
    match lower.as_str() {
        "golang" => "go".to_string(),
        "js" | "jsx" | "node" => "javascript".to_string(),
        "ts" | "tsx" => "typescript".to_string(),
        "py" | "python3" => "python".to_string(),
        _ => lower,
    }
}

/// Read-mostly table of language capabilities.
#[derive(Default)]
pub struct LanguageRegistry {
    entries: RwLock<HashMap<String, Arc<LanguageCapability>>>,
}

impl LanguageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the capability for its language id.
    ///
    /// A duplicate id overwrites the previous entry and logs a warning.
    pub fn register(&self, capability: LanguageCapability) {
        let id = normalize_language_id(&capability.id);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&id) {
            tracing::warn!(language = %id, "language registered twice, replacing previous capability");
        }
        entries.insert(id, Arc::new(capability));
    }

    /// Look up a capability. `None` means "use the generic fallback".
    pub fn resolve(&self, language_id: &str) -> Option<Arc<LanguageCapability>> {
        let id = normalize_language_id(language_id);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).cloned()
    }

    /// Find the capability handling a file extension (with or without dot).
    pub fn for_extension(&self, ext: &str) -> Option<Arc<LanguageCapability>> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<_> = entries
            .values()
            .filter(|cap| cap.extensions.contains(&ext.as_str()))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.into_iter().next()
    }

    /// Registered language ids, sorted.
    pub fn supported_languages(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_supported(&self, language_id: &str) -> bool {
        self.resolve(language_id).is_some()
    }

    /// All capabilities, sorted by id for deterministic iteration.
    pub fn capabilities(&self) -> Vec<Arc<LanguageCapability>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut caps: Vec<_> = entries.values().cloned().collect();
        caps.sort_by(|a, b| a.id.cmp(&b.id));
        caps
    }
}

lazy_static::lazy_static! {
    /// Process-wide registry used by the crate-level entry points.
    static ref GLOBAL: LanguageRegistry = LanguageRegistry::new();
}

/// Whether the built-in languages have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// The process-wide registry.
pub fn global() -> &'static LanguageRegistry {
    &GLOBAL
}

/// Register a capability in the process-wide registry.
pub fn register(capability: LanguageCapability) {
    GLOBAL.register(capability);
}

/// Resolve a language id in the process-wide registry.
pub fn resolve(language_id: &str) -> Option<Arc<LanguageCapability>> {
    GLOBAL.resolve(language_id)
}

/// Register the built-in languages into the process-wide registry.
///
/// Call this once at startup, before concurrent analysis begins.
/// This is idempotent - calling it multiple times is safe.
pub fn register_builtin_languages() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }
    crate::analysis::languages::register_all(&GLOBAL);
}
