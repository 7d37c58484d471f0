//! Ticksink - tick ingestion into a time-series store
//!
//! Wires the pieces together:
//! - instrument list → registry
//! - replay session as the feed
//! - update dispatcher → configured sink (Influx or journal)
//! - subscription controller with bounded resubscription
//! - Prometheus endpoint for metrics and lifecycle health
//!
//! Runs until Ctrl+C / SIGTERM. An exhausted resubscription budget does not
//! stop the process; it stays up so `/health` and the state gauge report it.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticksink_bins::common::{build_sink, init_logging, CommonArgs};
use ticksink_core::feed::{ReplaySession, StreamSession};
use ticksink_core::ingest::{load_instruments, InstrumentRegistry, UpdateDispatcher};
use ticksink_core::lifecycle::{LifecyclePhase, ShutdownSignal, SubscriptionController};
use ticksink_core::monitoring::{MetricsRegistry, MetricsServer, MetricsServerConfig};
use ticksink_core::utils::install_panic_handler;
use tracing::{error, info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let config = args.load_config()?;

    init_logging(&config)?;
    install_panic_handler();

    info!("=== Ticksink ===");
    info!(config = %args.config.display(), "Configuration loaded");

    let instruments = load_instruments(&config.feed.instruments_file)?;
    let registry = Arc::new(InstrumentRegistry::build(instruments)?);
    info!(instruments = registry.len(), "Instrument registry built");

    let sink = build_sink(&config)?;
    let metrics = MetricsRegistry::new().context("Failed to create metrics registry")?;

    if config.metrics.enable_prometheus {
        let addr: SocketAddr = config
            .metrics
            .metrics_addr
            .parse()
            .with_context(|| format!("Invalid metrics_addr '{}'", config.metrics.metrics_addr))?;
        let handle = MetricsServer::new(MetricsServerConfig::new(addr), metrics.clone()).spawn()?;
        info!(addr = %handle.local_addr, "Metrics endpoint started");
    }

    let shutdown = ShutdownSignal::new();
    let ctrlc_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        warn!("Received shutdown signal, stopping");
        ctrlc_signal.trigger("User requested shutdown (Ctrl+C)");
    })?;

    let session = Arc::new(
        ReplaySession::open(
            &config.feed.replay_file,
            Duration::from_millis(config.feed.replay_pace_ms),
        )
        .with_context(|| format!("Failed to open replay tape {}", config.feed.replay_file.display()))?,
    );

    let backoff = config.resubscribe.backoff();
    info!(
        max_attempts = backoff.max_attempts,
        base_delay_ms = backoff.base_delay.as_millis() as u64,
        max_delay_ms = backoff.max_delay.as_millis() as u64,
        "Resubscription policy"
    );

    let dispatcher = Arc::new(UpdateDispatcher::new(registry, sink.clone(), metrics.clone()));
    let controller = SubscriptionController::new(dispatcher, backoff, shutdown.clone(), metrics.clone());

    if let Err(e) = controller.start(session.clone()) {
        error!(severity = "fatal", error = %e, "Initial subscription failed");
        session.disconnect();
        if let Err(e) = sink.close() {
            warn!(error = %e, "Failed to close sink");
        }
        return Err(e.into());
    }

    // Keep running until signalled
    while !shutdown.wait_timeout(STATUS_INTERVAL) {
        let phase = controller.phase();
        let ingest = metrics.ingest();
        info!(
            state = %phase,
            received = ingest.updates_received.get(),
            written = ingest.points_written.get(),
            "Status"
        );
        if phase == LifecyclePhase::Exhausted {
            error!(severity = "fatal", "Subscription exhausted, manual intervention required");
        }
    }

    info!(reason = shutdown.reason().as_deref().unwrap_or("unknown"), "Shutting down");
    controller.shutdown();
    session.disconnect();
    sink.close().context("Failed to close sink")?;

    let ingest = metrics.ingest();
    info!("=== Final Statistics ===");
    info!("Updates received: {}", ingest.updates_received.get());
    info!("Points written: {}", ingest.points_written.get());
    info!("Incomplete skipped: {}", ingest.dropped("incomplete"));
    info!("Unknown items: {}", ingest.dropped("unknown_item"));
    info!("Malformed: {}", ingest.dropped("malformed"));
    info!("Sink errors: {}", ingest.dropped("sink_error"));

    Ok(())
}
