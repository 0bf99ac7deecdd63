//! Configuration loading, validation, and management for CCOM.
//!
//! Loads configuration from `<project>/.ccom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ccom_core::GroupingPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the project root holding the database and config.
pub const CCOM_DIR: &str = ".ccom";

/// The root configuration structure.
///
/// Maps directly to `<project>/.ccom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location and display settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Search result limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Near-duplicate consolidation
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// Checkpoint settings
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Capture defaults
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Override for the database file (default: `<project>/.ccom/context.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Characters of content shown by listing commands
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_preview_chars() -> usize {
    400
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    #[serde(default = "default_tag_result_limit")]
    pub tag_result_limit: usize,

    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,
}

fn default_result_limit() -> usize {
    10
}
fn default_tag_result_limit() -> usize {
    15
}
fn default_similar_limit() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_limit: default_result_limit(),
            tag_result_limit: default_tag_result_limit(),
            similar_limit: default_similar_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Minimum pair similarity for two entries to be merged
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// How similar pairs become merge groups
    #[serde(default)]
    pub grouping: GroupingPolicy,
}

fn default_threshold() -> f64 {
    0.8
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            grouping: GroupingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Entry count at which `checkpoint auto` saves a snapshot
    #[serde(default = "default_auto_threshold")]
    pub auto_threshold: i64,
}

fn default_auto_threshold() -> i64 {
    100
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            auto_threshold: default_auto_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Channel to use instead of the branch-derived one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,
}

impl AppConfig {
    /// Load configuration for a project root.
    ///
    /// Environment overrides (highest priority):
    /// - `CCOM_DB_PATH`: database file
    /// - `CCOM_CHANNEL`: default channel
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let config_path = Self::config_dir(project_root).join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(db_path) = std::env::var("CCOM_DB_PATH") {
            if !db_path.trim().is_empty() {
                config.store.db_path = Some(PathBuf::from(db_path));
            }
        }

        if let Ok(channel) = std::env::var("CCOM_CHANNEL") {
            if !channel.trim().is_empty() {
                config.capture.default_channel = Some(channel);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory for a project.
    pub fn config_dir(project_root: &Path) -> PathBuf {
        project_root.join(CCOM_DIR)
    }

    /// Resolve the database file, relative overrides taken from the project root.
    pub fn database_path(&self, project_root: &Path) -> PathBuf {
        match &self.store.db_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => project_root.join(p),
            None => Self::config_dir(project_root).join("context.db"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.consolidation.threshold;
        if !(threshold > 0.0 && threshold <= 1.2) {
            return Err(ConfigError::ValidationError(
                "consolidation.threshold must be in (0.0, 1.2]".into(),
            ));
        }

        if self.store.preview_chars < 50 {
            return Err(ConfigError::ValidationError(
                "store.preview_chars must be at least 50".into(),
            ));
        }

        if self.search.result_limit == 0
            || self.search.tag_result_limit == 0
            || self.search.similar_limit == 0
        {
            return Err(ConfigError::ValidationError(
                "search limits must be greater than 0".into(),
            ));
        }

        if self.checkpoint.auto_threshold <= 0 {
            return Err(ConfigError::ValidationError(
                "checkpoint.auto_threshold must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.preview_chars, 400);
        assert_eq!(config.search.result_limit, 10);
        assert_eq!(config.search.tag_result_limit, 15);
        assert!((config.consolidation.threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.consolidation.grouping, GroupingPolicy::Connected);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.preview_chars, config.store.preview_chars);
        assert_eq!(parsed.checkpoint.auto_threshold, config.checkpoint.auto_threshold);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.consolidation.threshold = 0.0;
        assert!(config.validate().is_err());
        config.consolidation.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_preview_rejected() {
        let mut config = AppConfig::default();
        config.store.preview_chars = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().search.similar_limit, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[consolidation]
threshold = 0.6
grouping = "single_pass"

[store]
db_path = "data/ctx.db"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.consolidation.threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.consolidation.grouping, GroupingPolicy::SinglePass);
        assert_eq!(config.store.preview_chars, 400);
        assert_eq!(
            config.database_path(Path::new("/work/app")),
            PathBuf::from("/work/app/data/ctx.db")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\npreview_chars = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_database_lives_under_ccom_dir() {
        let config = AppConfig::default();
        assert_eq!(
            config.database_path(Path::new("/work/app")),
            PathBuf::from("/work/app/.ccom/context.db")
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("preview_chars"));
        assert!(toml_str.contains("connected"));
    }
}
