//! Runtime configuration.
//!
//! Loads from `dexflow.toml` at the project root. Every field has a default,
//! so a missing file or a partial file both work.

use serde::Deserialize;
use std::path::Path;

use crate::core::{Error, Result};

/// Job queue tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Fixed worker pool size
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Total attempts per job (first run + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay, doubled per attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Max job starts per rolling window
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: usize,
    /// Rolling window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// How long a job waits for a subscriber before failing the order
    /// with `execution_start_failed`. Zero disables the wait.
    #[serde(default = "default_subscriber_wait_ms")]
    pub subscriber_wait_ms: u64,
}

fn default_concurrency() -> usize {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_rate_limit_max() -> usize {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    60
}
fn default_subscriber_wait_ms() -> u64 {
    5000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            subscriber_wait_ms: default_subscriber_wait_ms(),
        }
    }
}

/// Execution pipeline tuning. Delays simulate network latency between
/// stages; set both to zero for instant execution (tests do).
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
    /// Longer wait between submission and confirmation
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,
}

fn default_stage_delay_ms() -> u64 {
    1000
}
fn default_confirm_delay_ms() -> u64 {
    3000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay_ms(),
            confirm_delay_ms: default_confirm_delay_ms(),
        }
    }
}

impl PipelineConfig {
    /// No simulated latency; handy for tests and benchmarks.
    pub fn instant() -> Self {
        Self {
            stage_delay_ms: 0,
            confirm_delay_ms: 0,
        }
    }
}

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
    }

    /// Load from the default location (project root dexflow.toml).
    pub fn load_default() -> Self {
        let candidates = [
            "dexflow.toml",
            concat!(env!("CARGO_MANIFEST_DIR"), "/dexflow.toml"),
        ];

        for path in &candidates {
            if let Ok(cfg) = Self::load(Path::new(path)) {
                tracing::info!("📋 Loaded config from {}", path);
                return cfg;
            }
        }

        tracing::warn!("⚠️ No dexflow.toml found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.queue.concurrency, 10);
        assert_eq!(cfg.queue.max_attempts, 3);
        assert_eq!(cfg.queue.backoff_base_ms, 1000);
        assert_eq!(cfg.queue.rate_limit_max, 100);
        assert_eq!(cfg.queue.rate_limit_window_secs, 60);
        assert_eq!(cfg.queue.subscriber_wait_ms, 5000);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [queue]
            concurrency = 2
            subscriber_wait_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.queue.concurrency, 2);
        assert_eq!(cfg.queue.subscriber_wait_ms, 0);
        assert_eq!(cfg.queue.max_attempts, 3);
        assert_eq!(cfg.pipeline.stage_delay_ms, 1000);
    }
}
