//! Engine configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! The numeric thresholds were chosen empirically and are meant to be tuned
//! against labeled corpora rather than treated as fixed contracts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::detect::CheckSet;

/// Config file names discovered by the CLI, in priority order.
pub const CONFIG_FILE_NAMES: &[&str] = &["treescan.yaml", ".treescan.yaml"];

/// Tunable engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Dice similarity at or above which two bodies are near-duplicates.
    pub duplicate_similarity: f64,
    /// Bodies with fewer normalized tokens are not compared.
    pub duplicate_min_tokens: usize,
    /// Confidence multiplier for findings on partial trees.
    pub partial_penalty: f64,
    /// Confidence ceiling of the generic text tier.
    pub generic_cap: f64,
    /// Confidence of name-heuristic findings for generic fragments.
    pub heuristic_confidence: f64,
    /// Function names never reported as orphaned.
    pub excluded_functions: Vec<String>,
    /// Name prefixes never reported as orphaned.
    pub excluded_prefixes: Vec<String>,
    /// Skip exported functions in the orphaned pass.
    pub trust_exported: bool,
    /// Checks used when the caller requests none.
    pub default_checks: Vec<String>,
    /// Glob patterns for paths the CLI walker skips (e.g., "**/vendor/**").
    pub excluded_paths: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_similarity: 0.9,
            duplicate_min_tokens: 12,
            partial_penalty: 0.85,
            generic_cap: 0.75,
            heuristic_confidence: 0.55,
            excluded_functions: vec!["main".to_string(), "init".to_string()],
            excluded_prefixes: vec![
                "Test".to_string(),
                "Example".to_string(),
                "Benchmark".to_string(),
            ],
            trust_exported: true,
            default_checks: Vec::new(),
            excluded_paths: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse and validate a config from YAML text.
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Find a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> anyhow::Result<()> {
        let unit_fields = [
            ("duplicate_similarity", self.duplicate_similarity),
            ("partial_penalty", self.partial_penalty),
            ("generic_cap", self.generic_cap),
            ("heuristic_confidence", self.heuristic_confidence),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be between 0 and 1, got {value}");
            }
        }
        if self.duplicate_min_tokens < 4 {
            anyhow::bail!(
                "duplicate_min_tokens must be at least 4, got {}",
                self.duplicate_min_tokens
            );
        }
        for pattern in &self.excluded_paths {
            globset::Glob::new(pattern)
                .with_context(|| format!("invalid excluded_paths glob {pattern:?}"))?;
        }
        Ok(())
    }

    /// Checks to run when a caller passes none.
    pub fn default_check_set(&self) -> CheckSet {
        CheckSet::from_names(self.default_checks.as_slice())
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether a function name is exempt from the orphaned pass.
    pub fn is_excluded_function(&self, name: &str) -> bool {
        self.excluded_functions.iter().any(|f| f == name)
            || self
                .excluded_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.duplicate_similarity, 0.9);
        assert_eq!(config.duplicate_min_tokens, 12);
        assert!(config.validate().is_ok());
        assert!(config.is_excluded_function("main"));
        assert!(config.is_excluded_function("TestParse"));
        assert!(!config.is_excluded_function("handler"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
generic_cap: 0.6
excluded_paths:
  - "**/vendor/**"
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.generic_cap, 0.6);
        assert_eq!(config.partial_penalty, 0.85);
        assert!(config.is_path_excluded(Path::new("src/vendor/lib.go")));
        assert!(!config.is_path_excluded(Path::new("src/main.go")));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(EngineConfig::from_yaml_str("partial_penalty: 1.5\n").is_err());
        assert!(EngineConfig::from_yaml_str("duplicate_min_tokens: 2\n").is_err());
        assert!(EngineConfig::from_yaml_str("excluded_paths: [\"[\"]\n").is_err());
    }

    #[test]
    fn test_empty_document() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
