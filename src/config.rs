use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::checkpoint::DEFAULT_PATTERNS;
use crate::engine::error::EngineError;
use crate::engine::scorer::AlgorithmWeights;
use crate::engine::types::Strategy;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DistillConfig {
    pub log_level: String,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub report_dir: String,
}

/// Knobs for the deduplication and consolidation engine.
///
/// Passed explicitly into every entry point — never module-level state — so
/// runs are reproducible and testable in isolation.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Composite score at or above which two records are duplicates.
    pub similarity_threshold: f64,
    /// Minimum checkpoint group size worth consolidating.
    pub consolidation_threshold: usize,
    /// Relative weights of the four similarity algorithms; must sum to 1.0.
    pub algorithm_weights: AlgorithmWeights,
    /// Page size for record fetches; also bounds blocking bucket size and
    /// the exhaustive-comparison ceiling.
    pub batch_size: usize,
    /// Default policy applied to duplicate groups.
    pub resolution_strategy: Strategy,
    /// Produce and report plans without ever invoking the write adapter.
    pub dry_run: bool,
    /// Content patterns that mark a record as a checkpoint.
    pub checkpoint_patterns: Vec<String>,
}

impl Default for DistillConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_distill_dir();
        Self {
            db_path: base.join("records.db").to_string_lossy().into_owned(),
            report_dir: base.join("reports").to_string_lossy().into_owned(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            consolidation_threshold: 5,
            algorithm_weights: AlgorithmWeights::default(),
            batch_size: 1000,
            resolution_strategy: Strategy::KeepLatest,
            dry_run: false,
            checkpoint_patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Fail-fast validation, run before any record is fetched.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.algorithm_weights.validate()?;
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EngineError::ThresholdRange(self.similarity_threshold));
        }
        if self.batch_size == 0 {
            return Err(EngineError::ZeroBatchSize);
        }
        if self.consolidation_threshold < 2 {
            return Err(EngineError::ConsolidationThreshold(
                self.consolidation_threshold,
            ));
        }
        Ok(())
    }
}

/// Returns `~/.distill/`
pub fn default_distill_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".distill")
}

/// Returns the default config file path: `~/.distill/config.toml`
pub fn default_config_path() -> PathBuf {
    default_distill_dir().join("config.toml")
}

impl DistillConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            DistillConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (DISTILL_DB, DISTILL_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DISTILL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("DISTILL_LOG_LEVEL") {
            self.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the report output directory, expanding `~` if needed.
    pub fn resolved_report_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.report_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DistillConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.storage.db_path.ends_with("records.db"));
        assert_eq!(config.engine.similarity_threshold, 0.85);
        assert_eq!(config.engine.consolidation_threshold, 5);
        assert_eq!(config.engine.batch_size, 1000);
        assert_eq!(config.engine.resolution_strategy, Strategy::KeepLatest);
        assert!(!config.engine.dry_run);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[engine]
similarity_threshold = 0.9
resolution_strategy = "merge"
dry_run = true

[engine.algorithm_weights]
exact_match = 0.4
sequence_similarity = 0.2
levenshtein_similarity = 0.2
jaccard_similarity = 0.2
"#;
        let config: DistillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.engine.similarity_threshold, 0.9);
        assert_eq!(config.engine.resolution_strategy, Strategy::Merge);
        assert!(config.engine.dry_run);
        assert_eq!(config.engine.algorithm_weights.exact_match, 0.4);
        // defaults still apply for unset fields
        assert_eq!(config.engine.batch_size, 1000);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_engine_config() {
        let mut config = EngineConfig::default();
        config.similarity_threshold = 1.2;
        assert!(matches!(
            config.validate(),
            Err(EngineError::ThresholdRange(_))
        ));

        let mut config = EngineConfig::default();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(EngineError::ZeroBatchSize)));

        let mut config = EngineConfig::default();
        config.consolidation_threshold = 1;
        assert!(matches!(
            config.validate(),
            Err(EngineError::ConsolidationThreshold(1))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = DistillConfig::default();
        std::env::set_var("DISTILL_DB", "/tmp/override.db");
        std::env::set_var("DISTILL_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.log_level, "trace");

        // Clean up
        std::env::remove_var("DISTILL_DB");
        std::env::remove_var("DISTILL_LOG_LEVEL");
    }
}
