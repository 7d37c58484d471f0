//! In-memory sink that records every point it accepts

use crate::core::{MarketDataPoint, SinkError};
use crate::sink::TickSink;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Default)]
pub struct RecordingSink {
    points: Mutex<Vec<MarketDataPoint>>,
    failures_remaining: AtomicU32,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with a transport error
    pub fn fail_next_writes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn points(&self) -> Vec<MarketDataPoint> {
        self.points.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl TickSink for RecordingSink {
    fn write(&self, point: &MarketDataPoint) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::Transport("injected failure".to_string()));
        }

        self.points.lock().push(point.clone());
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
