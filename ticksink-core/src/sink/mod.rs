//! Time-series sinks
//!
//! The dispatcher writes one [`MarketDataPoint`] per qualifying update,
//! synchronously, and never retries. Sinks decide for themselves whether a
//! write is a network round-trip ([`InfluxSink`]) or a hand-off to a
//! background writer ([`JournalSink`]).

pub mod influx;
pub mod journal;

pub use influx::{InfluxConfig, InfluxSink};
pub use journal::JournalSink;

use crate::core::{MarketDataPoint, SinkError};

pub trait TickSink: Send + Sync {
    /// Persist one point
    fn write(&self, point: &MarketDataPoint) -> Result<(), SinkError>;

    /// Flush buffered points and release resources. Idempotent.
    fn close(&self) -> Result<(), SinkError>;

    /// Short name for diagnostics
    fn name(&self) -> &'static str;
}
