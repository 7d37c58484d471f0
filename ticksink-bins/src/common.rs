//! Common utilities for all binaries
//!
//! CLI parsing, configuration and sink construction.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use ticksink_core::config::{Config, SinkKind};
use ticksink_core::sink::{InfluxSink, JournalSink, TickSink};
use ticksink_core::utils::init_logger;
use tracing::info;

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "config/ticksink.toml")]
    pub config: PathBuf,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Instrument list, overrides `feed.instruments_file`
    #[arg(short, long)]
    pub instruments: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    /// Load the configuration file and apply CLI overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))?;

        if let Some(level) = &self.log_level {
            config.metrics.log_level = level.clone();
        }
        if let Some(instruments) = &self.instruments {
            config.feed.instruments_file = instruments.clone();
        }
        if self.json_logs {
            config.metrics.json_logs = true;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Initialize tracing/logging
pub fn init_logging(config: &Config) -> Result<()> {
    init_logger(&config.metrics.log_level, config.metrics.json_logs)
}

/// Build the configured sink
pub fn build_sink(config: &Config) -> Result<Arc<dyn TickSink>> {
    match config.sink.kind {
        SinkKind::Influx => {
            let settings = config
                .sink
                .influx
                .as_ref()
                .context("influx sink selected but not configured")?;
            let sink = InfluxSink::new(settings.to_sink_config()).context("Failed to create Influx sink")?;
            info!(url = %settings.url, bucket = %settings.bucket, "Using Influx sink");
            Ok(Arc::new(sink))
        }
        SinkKind::Journal => {
            let path = &config.sink.journal_path;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let sink = JournalSink::open(path)
                .with_context(|| format!("Failed to open journal {}", path.display()))?;
            info!(path = %path.display(), "Using journal sink");
            Ok(Arc::new(sink))
        }
    }
}
