//! Engine configuration.
//!
//! Read from `helicon.toml` (or the path in `HELICON_CONFIG`). Every section
//! is optional; missing values fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HeliconError, Result};

/// Env var overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "HELICON_CONFIG";

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "helicon.toml";

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub weights: WeightsConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub path_scoring: PathScoringConfig,

    #[serde(default)]
    pub learning: LearningConfig,
}

// ── Graph Store ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// JSON snapshot loaded into the in-memory store
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Upper bound for a single store call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Pause before the single retry of a timed-out call
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_snapshot_path() -> PathBuf { PathBuf::from("data/graph.json") }
fn default_call_timeout_ms() -> u64 { 5_000 }
fn default_retry_backoff_ms() -> u64 { 200 }

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            call_timeout_ms: default_call_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

// ── Weight Persistence ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightsConfig {
    #[serde(default = "default_weights_path")]
    pub path: PathBuf,
}

fn default_weights_path() -> PathBuf { PathBuf::from("data/processed/relation_weights.json") }

impl Default for WeightsConfig {
    fn default() -> Self {
        Self { path: default_weights_path() }
    }
}

// ── Ranking ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Concurrent path searches in a batch
    #[serde(default = "default_path_parallelism")]
    pub path_parallelism: usize,
}

fn default_top_k() -> usize { 20 }
fn default_path_parallelism() -> usize { 4 }

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            path_parallelism: default_path_parallelism(),
        }
    }
}

// ── Path Scoring ──────────────────────────────────────────────────────────────

/// Per-relation constants for evidence path strength.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathScoringConfig {
    /// Multiplier for ASSOCIATED_WITH edges
    #[serde(default = "default_direct_constant")]
    pub direct: f64,

    /// Multiplier for SIMILAR_TO edges
    #[serde(default = "default_similarity_constant")]
    pub similarity: f64,

    /// Multiplier for TARGETS / BINDS_TO / MODULATES edges
    #[serde(default = "default_therapeutic_constant")]
    pub therapeutic: f64,

    /// Fixed discount applied to the therapeutic constant for USED_FOR edges
    #[serde(default = "default_used_for_discount")]
    pub used_for_discount: f64,

    #[serde(default = "default_max_hops")]
    pub default_max_hops: usize,

    #[serde(default = "default_max_paths")]
    pub default_max_paths: usize,

    /// Hard ceiling on requested hop bounds
    #[serde(default = "default_max_hops_limit")]
    pub max_hops_limit: usize,
}

fn default_direct_constant() -> f64 { 1.0 }
fn default_similarity_constant() -> f64 { 0.55 }
fn default_therapeutic_constant() -> f64 { 0.50 }
fn default_used_for_discount() -> f64 { 0.8 }
fn default_max_hops() -> usize { 4 }
fn default_max_paths() -> usize { 5 }
fn default_max_hops_limit() -> usize { 6 }

impl Default for PathScoringConfig {
    fn default() -> Self {
        Self {
            direct: default_direct_constant(),
            similarity: default_similarity_constant(),
            therapeutic: default_therapeutic_constant(),
            used_for_discount: default_used_for_discount(),
            default_max_hops: default_max_hops(),
            default_max_paths: default_max_paths(),
            max_hops_limit: default_max_hops_limit(),
        }
    }
}

// ── Weight Learning ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningConfig {
    /// Ridge (L2) regularization strength
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Share of examples held out for the diagnostic validation error
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_alpha() -> f64 { 0.1 }
fn default_validation_fraction() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            validation_fraction: default_validation_fraction(),
            seed: default_seed(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load from `HELICON_CONFIG` or `./helicon.toml`.
    /// A missing file is not an error; defaults are used.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| HeliconError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HeliconError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let ps = &self.path_scoring;
        if ps.default_max_hops == 0 || ps.default_max_paths == 0 || ps.max_hops_limit == 0 {
            return Err(HeliconError::Config(
                "path search bounds must be at least 1".to_string(),
            ));
        }
        if ps.default_max_hops > ps.max_hops_limit {
            return Err(HeliconError::Config(format!(
                "default_max_hops ({}) exceeds max_hops_limit ({})",
                ps.default_max_hops, ps.max_hops_limit
            )));
        }
        if !(0.0..1.0).contains(&self.learning.validation_fraction) {
            return Err(HeliconError::Config(
                "validation_fraction must be in [0, 1)".to_string(),
            ));
        }
        if self.learning.alpha < 0.0 {
            return Err(HeliconError::Config("alpha must be non-negative".to_string()));
        }
        if self.ranking.path_parallelism == 0 {
            return Err(HeliconError::Config("path_parallelism must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.path_scoring.similarity, 0.55);
        assert_eq!(config.path_scoring.default_max_hops, 4);
        assert_eq!(config.learning.alpha, 0.1);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [path_scoring]
            similarity = 0.6

            [ranking]
            default_top_k = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.path_scoring.similarity, 0.6);
        assert_eq!(config.path_scoring.therapeutic, 0.50);
        assert_eq!(config.ranking.default_top_k, 5);
        assert_eq!(config.ranking.path_parallelism, 4);
    }

    #[test]
    fn test_rejects_zero_hop_bound() {
        let err = EngineConfig::from_toml_str("[path_scoring]\ndefault_max_hops = 0\n").unwrap_err();
        assert!(matches!(err, HeliconError::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[graph\nsnapshot_path = 3").unwrap_err();
        assert!(matches!(err, HeliconError::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load_from("/nonexistent/helicon.toml").unwrap();
        assert_eq!(config.graph.call_timeout_ms, 5_000);
    }
}
