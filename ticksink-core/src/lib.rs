//! Ticksink Core - Resilient tick ingestion into a time-series store
//!
//! Subscribes to tick-level price updates for a fixed set of instruments,
//! maps each update back to its instrument and persists complete quotes as
//! points. The subscription is kept alive across feed-side drops by a
//! lifecycle controller that resubscribes with bounded exponential backoff.
//!
//! ## Data flow
//! ```text
//! session ─on_item_update─► listener ─► UpdateDispatcher ─► InstrumentRegistry
//!                                              │
//!                                              └─► TickSink::write
//! ```
//!
//! ## Control flow
//! ```text
//! session ─on_unsubscription─► SubscriptionController ─backoff─► session.subscribe(fresh listener)
//! ```
//!
//! ## Modules
//! - `core`: domain types and error enums
//! - `feed`: session, listener and descriptor boundary, plus a replay session
//! - `ingest`: instrument loading, registry, field parsing, dispatcher
//! - `lifecycle`: typestate machine, backoff, controller, shutdown latch
//! - `sink`: InfluxDB and JSON-lines sinks
//! - `monitoring`: Prometheus metrics and HTTP endpoint
//! - `config`: TOML + environment configuration
//! - `testing`: mock session and recording sink

pub mod config;
pub mod core;
pub mod feed;
pub mod ingest;
pub mod lifecycle;
pub mod monitoring;
pub mod sink;
pub mod testing;
pub mod utils;

pub use self::core::{
    ConfigurationError, DispatchError, Instrument, LifecycleError, MarketDataPoint, SinkError,
    SubscriptionError,
};
pub use feed::{ItemUpdate, StreamSession, Subscription, SubscriptionListener};
pub use ingest::{InstrumentRegistry, UpdateDispatcher};
pub use lifecycle::{BackoffConfig, LifecyclePhase, ShutdownSignal, SubscriptionController};
pub use sink::TickSink;

pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{Instrument, MarketDataPoint};
    pub use crate::feed::{ItemUpdate, ReplaySession, StreamSession, Subscription, SubscriptionListener};
    pub use crate::ingest::{load_instruments, InstrumentRegistry, UpdateDispatcher};
    pub use crate::lifecycle::{BackoffConfig, LifecyclePhase, ShutdownSignal, SubscriptionController};
    pub use crate::monitoring::MetricsRegistry;
    pub use crate::sink::{InfluxSink, JournalSink, TickSink};

    pub use crate::{Error, Result};
}
