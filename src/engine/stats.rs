//! Per-call statistics.

use serde::{Deserialize, Serialize};

/// Which tier produced the findings of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Clean tree, full detector pipeline.
    Structural,
    /// Tree with recovered syntax errors; confidences are penalized.
    Partial,
    /// No tree; text matching only.
    Generic,
    /// No tree and no text match; only function-name suggestions.
    HeuristicOnly,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Structural => "structural",
            Tier::Partial => "partial",
            Tier::Generic => "generic",
            Tier::HeuristicOnly => "heuristic-only",
        }
    }

    /// Whether analysis ran on less than a clean tree.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Tier::Structural)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one `analyze_ast` call went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Language id as passed by the caller.
    pub language: String,
    pub tier: Tier,
    /// Time spent in the parser, in microseconds.
    pub parse_micros: u64,
    /// Nodes in the tree; zero when no tree was produced.
    pub node_count: usize,
    /// Findings returned after merging.
    pub finding_count: usize,
    /// Findings contributed by the name heuristic.
    pub heuristic_count: usize,
    /// Syntax errors recovered from a partial tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    /// Names of detector passes that failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detector_errors: Vec<String>,
}

impl Stats {
    pub(crate) fn new(language: &str, tier: Tier) -> Self {
        Self {
            language: language.to_string(),
            tier,
            parse_micros: 0,
            node_count: 0,
            finding_count: 0,
            heuristic_count: 0,
            diagnostics: Vec::new(),
            detector_errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_wire_names() {
        assert_eq!(
            serde_json::to_string(&Tier::HeuristicOnly).unwrap(),
            "\"heuristic-only\""
        );
        assert_eq!(serde_json::to_string(&Tier::Structural).unwrap(), "\"structural\"");
        assert_eq!(Tier::Partial.to_string(), "partial");
        assert!(!Tier::Structural.is_degraded());
        assert!(Tier::Generic.is_degraded());
    }

    #[test]
    fn test_empty_lists_omitted() {
        let stats = Stats::new("go", Tier::Structural);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("diagnostics").is_none());
        assert_eq!(json["tier"], "structural");
        assert_eq!(json["parse_micros"], 0);
    }
}
