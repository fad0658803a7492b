// crates/core/src/config.rs
//! Pipeline configuration: TOML file with serde defaults, API key layered
//! from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when `[ai]` has no inline key.
pub const API_KEY_ENV: &str = "NOMENORM_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("ai.enabled is set but no API key found (set {API_KEY_ENV})")]
    MissingApiKey,

    #[error("{field} must be within {range}")]
    OutOfRange {
        field: &'static str,
        range: &'static str,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub ai: AiConfig,
    pub checkpoints: CheckpointConfig,
    /// Quality score at or above which items are promoted to benchmark.
    pub benchmark_threshold: f64,
    /// Items per flush/commit batch.
    pub batch_size: usize,
    /// Seconds between time-series stats samples.
    pub stats_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            checkpoints: CheckpointConfig::default(),
            benchmark_threshold: 0.9,
            batch_size: 1000,
            stats_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    pub enabled: bool,
    /// Accept an AI result only at or above this confidence.
    pub min_confidence: f64,
    /// Fixed wait between retry attempts, milliseconds.
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
    pub batch: AiBatchConfig,
    /// Usually left unset in the file and taken from the environment.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub cache_capacity: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 0.5,
            rate_limit_delay_ms: 1000,
            max_retries: 3,
            batch: AiBatchConfig::default(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 30,
            cache_capacity: 10_000,
        }
    }
}

impl AiConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiBatchConfig {
    pub enabled: bool,
    pub size: usize,
    pub flush_interval_ms: u64,
}

impl Default for AiBatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 10,
            flush_interval_ms: 5000,
        }
    }
}

impl AiBatchConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("checkpoints"),
        }
    }
}

impl PipelineConfig {
    /// Parse from TOML text, layer the environment API key, validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = toml::from_str(text)?;
        if config.ai.api_key.is_none() {
            config.ai.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.enabled && self.ai.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(0.0..=1.0).contains(&self.ai.min_confidence) {
            return Err(ConfigError::OutOfRange {
                field: "ai.min_confidence",
                range: "0..1",
            });
        }
        if !(0.0..=1.0).contains(&self.benchmark_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "benchmark_threshold",
                range: "0..1",
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "batch_size",
                range: "1..",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(!config.ai.enabled);
        assert_eq!(config.ai.min_confidence, 0.5);
        assert_eq!(config.ai.max_retries, 3);
        assert_eq!(config.ai.rate_limit_delay(), Duration::from_secs(1));
        assert!(!config.ai.batch.enabled);
        assert_eq!(config.ai.batch.size, 10);
        assert_eq!(config.ai.batch.flush_interval(), Duration::from_secs(5));
        assert!(config.checkpoints.enabled);
        assert_eq!(config.benchmark_threshold, 0.9);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.stats_interval_secs, 10);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            batch_size = 250

            [ai]
            min_confidence = 0.7

            [checkpoints]
            dir = "/tmp/cp"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.ai.min_confidence, 0.7);
        assert_eq!(config.checkpoints.dir, PathBuf::from("/tmp/cp"));
        // Untouched fields keep defaults
        assert_eq!(config.ai.max_retries, 3);
    }

    #[test]
    fn test_ai_enabled_requires_key() {
        let result = PipelineConfig::from_toml(
            r#"
            [ai]
            enabled = true
            "#,
        );
        // NOMENORM_API_KEY is not set in the test environment
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(matches!(result, Err(ConfigError::MissingApiKey)));
        }
    }

    #[test]
    fn test_inline_key_accepted() {
        let config = PipelineConfig::from_toml(
            r#"
            [ai]
            enabled = true
            api_key = "sk-inline"
            "#,
        )
        .unwrap();
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-inline"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = PipelineConfig::from_toml("benchmark_threshold = 1.5");
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));

        let result = PipelineConfig::from_toml("batch_size = 0");
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = PipelineConfig::from_toml("definitely_not_a_field = true");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
