//! Bounded exponential backoff for resubscription
//!
//! [`ResubscribeState`] is a plain value: each transition consumes it and
//! returns the next one, so the controller's retry bookkeeping is never
//! mutated behind its back.

use rand::Rng;
use std::time::Duration;

/// Configuration for resubscription backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first resubscribe attempt
    pub base_delay: Duration,
    /// Upper bound for the delay between attempts
    pub max_delay: Duration,
    /// Growth factor applied after each failure (typically 2.0)
    pub multiplier: f64,
    /// Failed attempts allowed before giving up
    pub max_attempts: u32,
    /// Randomization applied to each wait (0.0 to 1.0, 0.0 = exact)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: 5,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Millisecond-scale delays with the default attempt budget (for testing)
    pub fn fast() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(60),
            ..Self::default()
        }
    }
}

/// Retry bookkeeping owned by the lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResubscribeState {
    config: BackoffConfig,
    attempt_count: u32,
    current_delay: Duration,
}

impl ResubscribeState {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            attempt_count: 0,
            current_delay: config.base_delay,
            config,
        }
    }

    /// Failed attempts since the last successful subscription
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Delay to wait before the next attempt, before jitter
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// No attempts left
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.config.max_attempts
    }

    /// Account for one failed attempt and grow the delay, capped at `max_delay`
    #[must_use]
    pub fn record_failure(self) -> Self {
        let grown = Duration::try_from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier)
            .unwrap_or(self.config.max_delay);
        Self {
            attempt_count: self.attempt_count.saturating_add(1),
            current_delay: grown.min(self.config.max_delay),
            config: self.config,
        }
    }

    /// Back to `{0, base_delay}` after a successful subscription
    #[must_use]
    pub fn reset(self) -> Self {
        Self::new(self.config)
    }

    /// The wait to actually perform, with jitter applied
    pub fn wait_duration(&self) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return self.current_delay;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * self.config.jitter_factor;
        let jitter_multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);

        Duration::try_from_secs_f64(self.current_delay.as_secs_f64() * jitter_multiplier).unwrap_or(self.current_delay)
    }
}
