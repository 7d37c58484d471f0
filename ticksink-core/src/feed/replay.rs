//! Replay session
//!
//! Plays back a recorded JSON-lines tape as if it came from the live feed.
//! One record per line, tagged by `type`:
//!
//! ```text
//! {"type":"update","item":"CHART:CS.D.EURUSD.CFD.IP:TICK","fields":{"UTM":"1700000000000","BID":"1.0950","OFR":"1.0952"}}
//! {"type":"drop"}
//! {"type":"reject","count":2,"code":21,"message":"Request limit"}
//! {"type":"pause","millis":250}
//! ```
//!
//! `drop` tears down the active subscription and fires `on_unsubscription`,
//! which is how a tape exercises the resubscription path. `reject` makes the
//! next `count` subscribe calls fail.
//!
//! All callbacks run serially on a single delivery thread, started by the
//! first successful subscribe. No internal lock is held while a callback
//! runs, so listeners may subscribe again from inside `on_unsubscription`.

use super::session::{StreamSession, Subscription};
use super::update::{FieldValue, ItemUpdate};
use crate::core::SubscriptionError;
use crate::lifecycle::ShutdownSignal;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One tape record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayRecord {
    Update {
        item: String,
        #[serde(default)]
        fields: HashMap<String, Option<FieldValue>>,
    },
    Drop,
    Reject {
        #[serde(default = "default_reject_count")]
        count: u32,
        #[serde(default)]
        code: i32,
        #[serde(default)]
        message: String,
    },
    Pause {
        millis: u64,
    },
}

fn default_reject_count() -> u32 {
    1
}

#[derive(Debug, Default)]
struct PendingRejects {
    remaining: u32,
    code: i32,
    message: String,
}

struct ReplayInner {
    path: PathBuf,
    pace: Duration,
    active: Mutex<Option<Subscription>>,
    rejects: Mutex<PendingRejects>,
    stop: ShutdownSignal,
    delivered: AtomicU64,
}

/// [`StreamSession`] backed by a recorded tape
pub struct ReplaySession {
    inner: Arc<ReplayInner>,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySession {
    /// Open a tape. `pace` is slept after every delivered update.
    pub fn open(path: impl AsRef<Path>, pace: Duration) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Fail early on a missing tape rather than on first subscribe
        File::open(&path)?;

        info!(path = %path.display(), pace_ms = pace.as_millis() as u64, "Replay session opened");

        Ok(Self {
            inner: Arc::new(ReplayInner {
                path,
                pace,
                active: Mutex::new(None),
                rejects: Mutex::new(PendingRejects::default()),
                stop: ShutdownSignal::new(),
                delivered: AtomicU64::new(0),
            }),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        })
    }

    /// Updates handed to a listener so far
    pub fn delivered(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// True once the tape has been fully played or the session disconnected
    pub fn is_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(false)
    }

    fn start_worker(&self) -> Result<(), SubscriptionError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("replay-feed".to_string())
            .spawn(move || inner.run())
            .map_err(|e| {
                warn!(error = %e, "Failed to spawn replay thread");
                SubscriptionError::NotConnected
            })?;

        *self.worker.lock() = Some(handle);
        Ok(())
    }
}

impl StreamSession for ReplaySession {
    fn subscribe(&self, subscription: Subscription) -> Result<(), SubscriptionError> {
        if self.inner.stop.is_triggered() {
            return Err(SubscriptionError::NotConnected);
        }

        {
            let mut rejects = self.inner.rejects.lock();
            if rejects.remaining > 0 {
                rejects.remaining -= 1;
                let (code, message) = (rejects.code, rejects.message.clone());
                drop(rejects);
                subscription.listener().on_subscription_error(code, &message);
                return Err(SubscriptionError::Rejected { code, message });
            }
        }

        {
            let mut active = self.inner.active.lock();
            if active.is_some() {
                return Err(SubscriptionError::AlreadySubscribed);
            }
            *active = Some(subscription.clone());
        }

        debug!(
            generation = subscription.generation(),
            items = subscription.descriptor().items().len(),
            "Replay subscription registered"
        );

        let listener = subscription.listener();
        listener.on_listen_start();
        listener.on_subscription();

        self.start_worker()
    }

    fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        let previous = self.inner.active.lock().take();
        match previous {
            Some(subscription) => {
                let listener = subscription.listener();
                listener.on_unsubscription();
                listener.on_listen_end();
                Ok(())
            }
            None => Err(SubscriptionError::NotSubscribed),
        }
    }

    fn disconnect(&self) {
        self.inner.stop.trigger("replay session disconnected");

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Replay thread panicked");
            }
        }
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ReplayInner {
    fn run(&self) {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot open replay tape");
                return;
            }
        };

        let mut lines = 0u64;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            if self.stop.is_triggered() {
                break;
            }

            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Replay tape read failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match serde_json::from_str::<ReplayRecord>(trimmed) {
                Ok(record) => self.apply(record),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed replay record"),
            }
            lines += 1;
        }

        info!(
            records = lines,
            delivered = self.delivered.load(Ordering::Relaxed),
            "Replay tape finished"
        );
    }

    fn apply(&self, record: ReplayRecord) {
        match record {
            ReplayRecord::Update { item, fields } => {
                let target = self.active.lock().clone();
                let Some(subscription) = target else {
                    debug!(item, "No active subscription, update dropped");
                    return;
                };
                if !subscription.descriptor().contains_item(&item) {
                    debug!(item, "Item not in subscription, update dropped");
                    return;
                }

                subscription
                    .listener()
                    .on_item_update(&ItemUpdate { item, fields });
                self.delivered.fetch_add(1, Ordering::Relaxed);

                if !self.pace.is_zero() {
                    self.stop.wait_timeout(self.pace);
                }
            }
            ReplayRecord::Drop => {
                let previous = self.active.lock().take();
                if let Some(subscription) = previous {
                    info!(generation = subscription.generation(), "Replay tape dropped the subscription");
                    let listener = subscription.listener();
                    listener.on_unsubscription();
                    listener.on_listen_end();
                }
            }
            ReplayRecord::Reject { count, code, message } => {
                let mut rejects = self.rejects.lock();
                rejects.remaining = count;
                rejects.code = code;
                rejects.message = message;
            }
            ReplayRecord::Pause { millis } => {
                self.stop.wait_timeout(Duration::from_millis(millis));
            }
        }
    }
}
