pub mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::net::SocketAddr;
use std::path::Path;

impl Config {
    /// Load configuration from file with environment variable overrides
    ///
    /// `TICKSINK__SINK__INFLUX__TOKEN=...` overrides `sink.influx.token`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let config = ConfigLoader::builder()
            .set_default("feed.replay_pace_ms", 0)?
            .set_default("resubscribe.max_attempts", 5)?
            .set_default("resubscribe.base_delay_secs", 5.0)?
            .set_default("resubscribe.max_delay_secs", 60.0)?
            .set_default("resubscribe.jitter_factor", 0.0)?
            .set_default("sink.kind", "journal")?
            .set_default("sink.journal_path", "./data/ticks.jsonl")?
            .set_default("metrics.log_level", "info")?
            .set_default("metrics.json_logs", false)?
            .set_default("metrics.enable_prometheus", true)?
            .set_default("metrics.metrics_addr", "127.0.0.1:9184")?
            .add_source(File::from(config_path))
            .add_source(Environment::with_prefix("TICKSINK").separator("__").try_parsing(true))
            .build()
            .context("Failed to build configuration")?;

        let cfg: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.resubscribe;
        if !(r.base_delay_secs.is_finite() && r.base_delay_secs >= 0.0) {
            anyhow::bail!("resubscribe.base_delay_secs must be a non-negative number");
        }
        if !(r.max_delay_secs.is_finite() && r.max_delay_secs >= r.base_delay_secs) {
            anyhow::bail!("resubscribe.max_delay_secs must be >= base_delay_secs");
        }
        if r.max_delay_secs > MAX_DELAY_SECS {
            anyhow::bail!("resubscribe.max_delay_secs must be at most {MAX_DELAY_SECS} seconds");
        }
        if !(0.0..=1.0).contains(&r.jitter_factor) {
            anyhow::bail!("resubscribe.jitter_factor must be between 0.0 and 1.0");
        }

        if self.sink.kind == SinkKind::Influx {
            let Some(influx) = &self.sink.influx else {
                anyhow::bail!("influx sink selected but no [sink.influx] section provided");
            };
            if influx.url.is_empty() || influx.org.is_empty() || influx.bucket.is_empty() {
                anyhow::bail!("sink.influx requires url, org and bucket");
            }
            if influx.measurement.is_empty() || influx.tag_key.is_empty() {
                anyhow::bail!("sink.influx measurement and tag_key must not be empty");
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.metrics.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.metrics.log_level,
                valid_log_levels
            );
        }

        if self.metrics.enable_prometheus {
            self.metrics
                .metrics_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid metrics_addr '{}'", self.metrics.metrics_addr))?;
        }

        Ok(())
    }
}
