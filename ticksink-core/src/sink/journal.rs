//! JSON-lines journal sink
//!
//! Points are handed to a background writer thread through a bounded
//! channel, so a slow disk never stalls the feed's callback thread. When the
//! channel is full the point is dropped and reported as
//! [`SinkError::BufferFull`].

use super::TickSink;
use crate::core::{MarketDataPoint, SinkError};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

const DEFAULT_CAPACITY: usize = 4096;

/// One journal line
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    /// Local wall-clock time the point was written, ms since epoch
    pub recorded_at: u64,
    #[serde(flatten)]
    pub point: MarketDataPoint,
}

impl JournalEntry {
    pub fn new(point: MarketDataPoint) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis() as u64;

        Self { recorded_at, point }
    }
}

pub struct JournalSink {
    path: PathBuf,
    sender: Mutex<Option<Sender<MarketDataPoint>>>,
    thread_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl JournalSink {
    /// Open (append) `path` and start the writer thread
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::with_capacity(path, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = bounded(capacity);
        let writer_path = path.clone();
        let handle = thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || Self::writer_loop(writer_path, file, receiver))?;

        info!(path = %path.display(), capacity, "Journal sink opened");

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            thread_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer_loop(path: PathBuf, file: File, receiver: Receiver<MarketDataPoint>) {
        let mut out = BufWriter::new(file);
        let mut written = 0u64;

        for point in &receiver {
            match serde_json::to_string(&JournalEntry::new(point)) {
                Ok(json) => {
                    if let Err(e) = writeln!(out, "{json}") {
                        error!(path = %path.display(), error = %e, "Failed to write to journal");
                        continue;
                    }
                    written += 1;
                }
                Err(e) => error!(error = %e, "Failed to serialize journal entry"),
            }

            // Flush whenever the burst is over
            if receiver.is_empty() {
                if let Err(e) = out.flush() {
                    error!(path = %path.display(), error = %e, "Failed to flush journal");
                }
            }
        }

        if let Err(e) = out.flush() {
            error!(path = %path.display(), error = %e, "Failed to flush journal");
        }
        info!(path = %path.display(), written, "Journal writer thread stopping");
    }
}

impl TickSink for JournalSink {
    fn write(&self, point: &MarketDataPoint) -> Result<(), SinkError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(SinkError::Closed);
        };

        sender.try_send(point.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::BufferFull,
            TrySendError::Disconnected(_) => SinkError::Closed,
        })
    }

    fn close(&self) -> Result<(), SinkError> {
        // Dropping the sender ends the writer loop once the queue is drained
        drop(self.sender.lock().take());

        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                return Err(SinkError::Io(std::io::Error::other("journal writer thread panicked")));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}

impl Drop for JournalSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "Failed to close journal sink");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Instrument;
    use rust_decimal_macros::dec;
    use std::io::{BufRead, BufReader};

    fn point(ts: u64) -> MarketDataPoint {
        MarketDataPoint::new(Instrument::new("EURUSD"), ts, dec!(1.0950), dec!(1.0952)).unwrap()
    }

    fn read_entries(path: &Path) -> Vec<JournalEntry> {
        let file = File::open(path).unwrap();
        BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_close_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");

        let sink = JournalSink::open(&path).unwrap();
        for ts in 0..100 {
            sink.write(&point(ts)).unwrap();
        }
        sink.close().unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].point, point(0));
        assert_eq!(entries[99].point.timestamp_ms, 99);
        assert_eq!(entries[0].point.spread, dec!(0.0002));
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JournalSink::open(dir.path().join("ticks.jsonl")).unwrap();

        sink.close().unwrap();
        sink.close().unwrap();
        assert!(matches!(sink.write(&point(1)), Err(SinkError::Closed)));
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");

        for ts in [1, 2] {
            let sink = JournalSink::open(&path).unwrap();
            sink.write(&point(ts)).unwrap();
        }

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].point.timestamp_ms, 2);
    }

    #[test]
    fn test_unwritable_path_fails() {
        assert!(matches!(
            JournalSink::open("/definitely/not/a/dir/ticks.jsonl"),
            Err(SinkError::Io(_))
        ));
    }
}
