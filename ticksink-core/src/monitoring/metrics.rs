//! Prometheus metrics for the ingestion pipeline
//!
//! Two families:
//! - Ingest: updates in, points out, and every reason an update is dropped
//! - Lifecycle: subscribe attempts and the controller's current state

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

const NAMESPACE: &str = "ticksink";

/// Central registry for all Prometheus metrics
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    ingest: Arc<IngestMetrics>,
    lifecycle: Arc<LifecycleMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let ingest = Arc::new(IngestMetrics::new(&registry)?);
        let lifecycle = Arc::new(LifecycleMetrics::new(&registry)?);

        info!("Prometheus metrics registry initialized");

        Ok(Self {
            registry,
            ingest,
            lifecycle,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ingest(&self) -> &IngestMetrics {
        &self.ingest
    }

    pub fn lifecycle(&self) -> &LifecycleMetrics {
        &self.lifecycle
    }
}

/// Update flow through the dispatcher
pub struct IngestMetrics {
    /// Updates handed to the dispatcher
    pub updates_received: IntCounter,
    /// Points accepted by the sink
    pub points_written: IntCounter,
    /// Updates dropped, by reason (incomplete, unknown_item, malformed, sink_error)
    pub updates_dropped: IntCounterVec,
}

impl IngestMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let updates_received = IntCounter::with_opts(
            Opts::new("updates_received_total", "Total raw updates received from the feed")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(updates_received.clone()))?;

        let points_written = IntCounter::with_opts(
            Opts::new("points_written_total", "Total points written to the sink").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(points_written.clone()))?;

        let updates_dropped = IntCounterVec::new(
            Opts::new("updates_dropped_total", "Total updates not persisted, by reason")
                .namespace(NAMESPACE),
            &["reason"],
        )?;
        registry.register(Box::new(updates_dropped.clone()))?;

        Ok(Self {
            updates_received,
            points_written,
            updates_dropped,
        })
    }

    pub fn dropped(&self, reason: &str) -> u64 {
        self.updates_dropped.with_label_values(&[reason]).get()
    }
}

/// Subscription lifecycle
pub struct LifecycleMetrics {
    /// Resubscribe attempts made
    pub subscribe_attempts: IntCounter,
    /// Resubscribe attempts that failed
    pub subscribe_failures: IntCounter,
    /// Times the retry budget ran out
    pub exhaustions: IntCounter,
    /// Callbacks ignored because their subscription was superseded
    pub stale_callbacks: IntCounter,
    /// Current state: 0 init, 1 subscribed, 2 reconnecting, 3 exhausted, 4 stopped
    pub state: IntGauge,
}

impl LifecycleMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let subscribe_attempts = IntCounter::with_opts(
            Opts::new("subscribe_attempts_total", "Total resubscribe attempts").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(subscribe_attempts.clone()))?;

        let subscribe_failures = IntCounter::with_opts(
            Opts::new("subscribe_failures_total", "Total failed resubscribe attempts")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(subscribe_failures.clone()))?;

        let exhaustions = IntCounter::with_opts(
            Opts::new("resubscribe_exhausted_total", "Times the resubscribe budget was exhausted")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(exhaustions.clone()))?;

        let stale_callbacks = IntCounter::with_opts(
            Opts::new("stale_callbacks_total", "Callbacks ignored from superseded subscriptions")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(stale_callbacks.clone()))?;

        let state = IntGauge::with_opts(
            Opts::new("lifecycle_state", "Subscription lifecycle state (0 init, 1 subscribed, 2 reconnecting, 3 exhausted, 4 stopped)")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(state.clone()))?;

        Ok(Self {
            subscribe_attempts,
            subscribe_failures,
            exhaustions,
            stale_callbacks,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_registry_creation() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.ingest().updates_received.inc();
        metrics.ingest().updates_dropped.with_label_values(&["incomplete"]).inc();

        assert_eq!(metrics.ingest().updates_received.get(), 1);
        assert_eq!(metrics.ingest().dropped("incomplete"), 1);
        assert_eq!(metrics.ingest().dropped("malformed"), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.lifecycle().subscribe_attempts.inc();
        assert_eq!(b.lifecycle().subscribe_attempts.get(), 0);
    }

    #[test]
    fn test_encoded_names() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.lifecycle().state.set(3);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&metrics.registry().gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("ticksink_lifecycle_state 3"));
        assert!(text.contains("ticksink_updates_received_total"));
    }
}
