//! Collector configuration with TOML file support.

use serde::{Deserialize, Serialize};

use crate::CollectorError;

/// Backoff between attempts at the same block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

/// When generic contracts with token-shaped logs are probed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe as soon as a matching log is seen.
    #[serde(default)]
    pub immediate: bool,

    /// Probe everything queued once the block's transactions are classified.
    #[serde(default = "default_true")]
    pub sweep_each_block: bool,
}

/// Configuration for the block collector.
///
/// Can be loaded from a TOML file via [`CollectorConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Capacity of the block event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the block feed waits before asking again for a block the
    /// node does not have yet.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CollectorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, CollectorError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CollectorError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CollectorError> {
        let config: Self = toml::from_str(s).map_err(|e| CollectorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("CollectorConfig is always serializable to TOML")
    }

    fn validate(&self) -> Result<(), CollectorError> {
        if self.queue_capacity == 0 {
            return Err(CollectorError::Config("queue_capacity must be positive".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(CollectorError::Config("retry.multiplier must be at least 1".into()));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(CollectorError::Config(
                "retry.max_backoff_ms is below retry.initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            immediate: false,
            sweep_each_block: default_true(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            retry: RetryConfig::default(),
            probe: ProbeConfig::default(),
            enable_metrics: false,
        }
    }
}
