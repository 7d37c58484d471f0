//! Subscription Lifecycle State Machine - Typestate Pattern
//!
//! # State Diagram
//!
//! ```text
//!        INIT
//!          │
//!       attach()
//!          ▼
//!     SUBSCRIBED ◄──────attempt_succeeded()──────┐
//!          │                                     │
//!    unsubscribed()                              │
//!          ▼                                     │
//!    RECONNECTING ──begin_attempt()──► ready ────┤
//!          ▲                                     │
//!          └─────────attempt_failed()────────────┘
//!          │
//!   begin_attempt() with no budget left
//!          ▼
//!     EXHAUSTED ──manual_retry()──► RECONNECTING
//!
//!   any state ──stop()──► STOPPED (terminal)
//! ```
//!
//! Each state owns a [`LifecycleData`] carrying the [`ResubscribeState`];
//! transitions consume the state and hand the data on, so an invalid
//! transition (e.g. resubscribing from `Subscribed`) does not compile.
//!
//! # Usage
//!
//! ```
//! use ticksink_core::lifecycle::backoff::BackoffConfig;
//! use ticksink_core::lifecycle::fsm::*;
//!
//! let subscribed = LifecycleInit::new(BackoffConfig::default()).attach();
//! let reconnecting = subscribed.unsubscribed();
//!
//! match reconnecting.begin_attempt() {
//!     AttemptResult::Ready(attempt) => {
//!         // wait attempt.delay(), then subscribe
//!         let _subscribed = attempt.attempt_succeeded();
//!     }
//!     AttemptResult::Exhausted(exhausted) => {
//!         let _again = exhausted.manual_retry();
//!     }
//! }
//! ```

use super::backoff::{BackoffConfig, ResubscribeState};
use std::time::{Duration, SystemTime};

// ============================================================================
// Lifecycle Data (shared by all states)
// ============================================================================

#[derive(Debug, Clone)]
pub struct LifecycleData {
    pub created_at: SystemTime,
    pub last_subscribed_at: Option<SystemTime>,
    pub last_unsubscribed_at: Option<SystemTime>,
    /// Unexpected subscription losses seen
    pub unsubscribe_count: u64,
    /// Resubscribe attempts made over the controller's lifetime
    pub total_attempts: u64,
    pub resubscribe: ResubscribeState,
}

impl LifecycleData {
    fn new(config: BackoffConfig) -> Self {
        Self {
            created_at: SystemTime::now(),
            last_subscribed_at: None,
            last_unsubscribed_at: None,
            unsubscribe_count: 0,
            total_attempts: 0,
            resubscribe: ResubscribeState::new(config),
        }
    }
}

// ============================================================================
// State: Init
// ============================================================================

/// Created, no subscription attached yet
#[derive(Debug, Clone)]
pub struct LifecycleInit {
    data: LifecycleData,
}

impl LifecycleInit {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            data: LifecycleData::new(config),
        }
    }

    pub fn data(&self) -> &LifecycleData {
        &self.data
    }

    /// Transition: Init → Subscribed
    pub fn attach(mut self) -> LifecycleSubscribed {
        self.data.last_subscribed_at = Some(SystemTime::now());
        LifecycleSubscribed { data: self.data }
    }

    /// Transition: Init → Stopped
    pub fn stop(self) -> LifecycleStopped {
        LifecycleStopped { data: self.data }
    }
}

// ============================================================================
// State: Subscribed
// ============================================================================

/// A subscription is active and feeding the dispatcher
#[derive(Debug, Clone)]
pub struct LifecycleSubscribed {
    data: LifecycleData,
}

impl LifecycleSubscribed {
    pub fn data(&self) -> &LifecycleData {
        &self.data
    }

    /// Transition: Subscribed → Reconnecting (subscription lost)
    pub fn unsubscribed(mut self) -> LifecycleReconnecting {
        self.data.last_unsubscribed_at = Some(SystemTime::now());
        self.data.unsubscribe_count += 1;
        LifecycleReconnecting { data: self.data }
    }

    /// Transition: Subscribed → Stopped
    pub fn stop(self) -> LifecycleStopped {
        LifecycleStopped { data: self.data }
    }
}

// ============================================================================
// State: Reconnecting
// ============================================================================

/// Subscription lost, resubscribe attempts in progress
#[derive(Debug, Clone)]
pub struct LifecycleReconnecting {
    data: LifecycleData,
}

impl LifecycleReconnecting {
    pub fn data(&self) -> &LifecycleData {
        &self.data
    }

    /// Failed attempts since the subscription was lost
    pub fn attempt_count(&self) -> u32 {
        self.data.resubscribe.attempt_count()
    }

    /// Wait before the next attempt (jitter applied)
    pub fn delay(&self) -> Duration {
        self.data.resubscribe.wait_duration()
    }

    /// Transition: Reconnecting → Reconnecting | Exhausted
    ///
    /// Checks the budget before an attempt is made.
    pub fn begin_attempt(mut self) -> AttemptResult {
        if self.data.resubscribe.is_exhausted() {
            return AttemptResult::Exhausted(LifecycleExhausted { data: self.data });
        }
        self.data.total_attempts += 1;
        AttemptResult::Ready(self)
    }

    /// Transition: Reconnecting → Subscribed, backoff reset
    pub fn attempt_succeeded(mut self) -> LifecycleSubscribed {
        self.data.last_subscribed_at = Some(SystemTime::now());
        self.data.resubscribe = self.data.resubscribe.reset();
        LifecycleSubscribed { data: self.data }
    }

    /// Transition: Reconnecting → Reconnecting, delay grown
    pub fn attempt_failed(mut self) -> LifecycleReconnecting {
        self.data.resubscribe = self.data.resubscribe.record_failure();
        self
    }

    /// Transition: Reconnecting → Stopped
    pub fn stop(self) -> LifecycleStopped {
        LifecycleStopped { data: self.data }
    }
}

// ============================================================================
// State: Exhausted (Terminal until manual retry)
// ============================================================================

/// Retry budget spent. Requires manual intervention.
#[derive(Debug, Clone)]
pub struct LifecycleExhausted {
    data: LifecycleData,
}

impl LifecycleExhausted {
    pub fn data(&self) -> &LifecycleData {
        &self.data
    }

    /// Transition: Exhausted → Reconnecting with a fresh budget
    pub fn manual_retry(mut self) -> LifecycleReconnecting {
        self.data.resubscribe = self.data.resubscribe.reset();
        LifecycleReconnecting { data: self.data }
    }

    /// Transition: Exhausted → Stopped
    pub fn stop(self) -> LifecycleStopped {
        LifecycleStopped { data: self.data }
    }
}

// ============================================================================
// State: Stopped (Terminal)
// ============================================================================

/// Shut down. No further transitions.
#[derive(Debug, Clone)]
pub struct LifecycleStopped {
    data: LifecycleData,
}

impl LifecycleStopped {
    pub fn data(&self) -> &LifecycleData {
        &self.data
    }
}

// ============================================================================
// Result types for state transitions
// ============================================================================

/// Result of `begin_attempt()` on Reconnecting state
#[derive(Debug)]
pub enum AttemptResult {
    Ready(LifecycleReconnecting),
    Exhausted(LifecycleExhausted),
}

// ============================================================================
// Enum wrapper
// ============================================================================

/// Observable lifecycle phase, also exported as a gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Init,
    Subscribed,
    Reconnecting,
    Exhausted,
    Stopped,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Subscribed => "Subscribed",
            Self::Reconnecting => "Reconnecting",
            Self::Exhausted => "Exhausted",
            Self::Stopped => "Stopped",
        }
    }

    /// Gauge encoding
    pub fn code(&self) -> i64 {
        match self {
            Self::Init => 0,
            Self::Subscribed => 1,
            Self::Reconnecting => 2,
            Self::Exhausted => 3,
            Self::Stopped => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Init),
            1 => Some(Self::Subscribed),
            2 => Some(Self::Reconnecting),
            3 => Some(Self::Exhausted),
            4 => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-erased lifecycle state
#[derive(Debug, Clone)]
pub enum LifecycleState {
    Init(LifecycleInit),
    Subscribed(LifecycleSubscribed),
    Reconnecting(LifecycleReconnecting),
    Exhausted(LifecycleExhausted),
    Stopped(LifecycleStopped),
}

impl LifecycleState {
    pub fn new(config: BackoffConfig) -> Self {
        Self::Init(LifecycleInit::new(config))
    }

    pub fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Init(_) => LifecyclePhase::Init,
            Self::Subscribed(_) => LifecyclePhase::Subscribed,
            Self::Reconnecting(_) => LifecyclePhase::Reconnecting,
            Self::Exhausted(_) => LifecyclePhase::Exhausted,
            Self::Stopped(_) => LifecyclePhase::Stopped,
        }
    }

    pub fn data(&self) -> &LifecycleData {
        match self {
            Self::Init(s) => s.data(),
            Self::Subscribed(s) => s.data(),
            Self::Reconnecting(s) => s.data(),
            Self::Exhausted(s) => s.data(),
            Self::Stopped(s) => s.data(),
        }
    }

    /// Transition: any → Stopped
    pub fn stop(self) -> LifecycleStopped {
        match self {
            Self::Init(s) => s.stop(),
            Self::Subscribed(s) => s.stop(),
            Self::Reconnecting(s) => s.stop(),
            Self::Exhausted(s) => s.stop(),
            Self::Stopped(s) => s,
        }
    }
}

impl From<LifecycleInit> for LifecycleState {
    fn from(s: LifecycleInit) -> Self {
        Self::Init(s)
    }
}

impl From<LifecycleSubscribed> for LifecycleState {
    fn from(s: LifecycleSubscribed) -> Self {
        Self::Subscribed(s)
    }
}

impl From<LifecycleReconnecting> for LifecycleState {
    fn from(s: LifecycleReconnecting) -> Self {
        Self::Reconnecting(s)
    }
}

impl From<LifecycleExhausted> for LifecycleState {
    fn from(s: LifecycleExhausted) -> Self {
        Self::Exhausted(s)
    }
}

impl From<LifecycleStopped> for LifecycleState {
    fn from(s: LifecycleStopped) -> Self {
        Self::Stopped(s)
    }
}
