//! Shutdown signal
//!
//! A one-way latch shared by the signal handler, the lifecycle controller
//! and the main loop. Every blocking wait in the pipeline goes through
//! [`ShutdownSignal::wait_timeout`] so that triggering the latch wakes it
//! immediately instead of letting a backoff delay run to completion.
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use ticksink_core::lifecycle::ShutdownSignal;
//!
//! let signal = ShutdownSignal::new();
//! let handler = signal.clone();
//! ctrlc_like_install(move || handler.trigger("SIGINT received"));
//!
//! while !signal.wait_timeout(Duration::from_secs(1)) {
//!     // periodic housekeeping
//! }
//! # fn ctrlc_like_install(_f: impl Fn() + Send + 'static) {}
//! ```

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::info;

struct Inner {
    triggered: AtomicBool,
    reason: Mutex<Option<String>>,
    triggered_at: Mutex<Option<SystemTime>>,
    /// Guards the condvar; trigger sets the flag while holding it
    gate: Mutex<()>,
    cvar: Condvar,
}

/// Cloneable, thread-safe shutdown latch
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                reason: Mutex::new(None),
                triggered_at: Mutex::new(None),
                gate: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    /// Trip the latch and wake every waiter. Later calls are no-ops.
    pub fn trigger(&self, reason: &str) {
        {
            let _gate = self.inner.gate.lock();
            if self.inner.triggered.swap(true, Ordering::AcqRel) {
                return;
            }
            *self.inner.reason.lock() = Some(reason.to_string());
            *self.inner.triggered_at.lock() = Some(SystemTime::now());
            self.inner.cvar.notify_all();
        }
        info!(reason, "Shutdown signal triggered");
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Block for up to `timeout`. Returns `true` if the latch was tripped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.inner.gate.lock();
        while !self.is_triggered() {
            if self.inner.cvar.wait_until(&mut gate, deadline).timed_out() {
                return self.is_triggered();
            }
        }
        true
    }

    /// Block until the latch is tripped
    pub fn wait(&self) {
        let mut gate = self.inner.gate.lock();
        while !self.is_triggered() {
            self.inner.cvar.wait(&mut gate);
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    pub fn triggered_at(&self) -> Option<SystemTime> {
        *self.inner.triggered_at.lock()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
