//! Monitoring and observability
//!
//! Prometheus metrics plus a small HTTP server for scraping and health
//! checks.

pub mod metrics;
pub mod server;

pub use metrics::{IngestMetrics, LifecycleMetrics, MetricsRegistry};
pub use server::{encode_metrics, MetricsServer, MetricsServerConfig, MetricsServerHandle};
