use crate::lifecycle::BackoffConfig;
use crate::sink::InfluxConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub resubscribe: ResubscribeConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where instruments and updates come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Newline-delimited instrument list
    pub instruments_file: PathBuf,

    /// Recorded JSON-lines tape played by the replay session
    pub replay_file: PathBuf,

    /// Delay after each replayed update (milliseconds, 0 = as fast as possible)
    #[serde(default)]
    pub replay_pace_ms: u64,
}

/// Resubscription backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResubscribeConfig {
    /// Failed attempts allowed before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first attempt (seconds)
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,

    /// Cap on the delay between attempts (seconds)
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Randomization of each wait (0.0 to 1.0)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for ResubscribeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            jitter_factor: 0.0,
        }
    }
}

/// Upper bound accepted for either delay setting (one day)
pub const MAX_DELAY_SECS: f64 = 86_400.0;

impl ResubscribeConfig {
    /// Out-of-range delays are clamped to `[0, MAX_DELAY_SECS]`; `validate()`
    /// rejects them before this is reached.
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: delay(self.base_delay_secs),
            max_delay: delay(self.max_delay_secs),
            max_attempts: self.max_attempts,
            jitter_factor: self.jitter_factor,
            ..BackoffConfig::default()
        }
    }
}

fn delay(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.min(MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

/// Which sink receives points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Influx,
    Journal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// Required when `kind = "influx"`
    #[serde(default)]
    pub influx: Option<InfluxSettings>,

    /// Output file when `kind = "journal"`
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
}

/// InfluxDB v2 connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxSettings {
    pub url: String,
    pub org: String,
    pub bucket: String,

    /// API token (prefer TICKSINK__SINK__INFLUX__TOKEN over the file)
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_tag_key")]
    pub tag_key: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl InfluxSettings {
    pub fn to_sink_config(&self) -> InfluxConfig {
        InfluxConfig {
            url: self.url.clone(),
            org: self.org.clone(),
            bucket: self.bucket.clone(),
            token: self.token.clone().filter(|t| !t.is_empty()),
            measurement: self.measurement.clone(),
            tag_key: self.tag_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Logging and Prometheus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[serde(default)]
    pub json_logs: bool,

    /// Serve /metrics and /health over HTTP
    #[serde(default = "default_true")]
    pub enable_prometheus: bool,

    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            enable_prometheus: true,
            metrics_addr: default_metrics_addr(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> f64 {
    5.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("./data/ticks.jsonl")
}

fn default_measurement() -> String {
    "market_data".to_string()
}

fn default_tag_key() -> String {
    "epic".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9184".to_string()
}
