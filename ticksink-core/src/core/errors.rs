//! Domain-specific error types for the ingestion pipeline
//!
//! Each boundary gets its own error type so callers can decide precisely
//! which failures are fatal (configuration), which are retried
//! (subscription) and which are logged and dropped (sink, dispatch).

use std::path::PathBuf;
use rust_decimal::Decimal;
use thiserror::Error;

/// Startup-time configuration failures. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The instrument list resolved to zero instruments
    #[error("instrument list is empty")]
    EmptyInstrumentList,

    /// The instrument source could not be read
    #[error("cannot read instrument source {path}: {source}")]
    Unreadable {
        /// Path of the instrument source
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by a stream session when (un)subscribing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The feed refused the subscription
    #[error("subscription rejected ({code}): {message}")]
    Rejected {
        /// Feed-specific error code
        code: i32,
        /// Feed-supplied message
        message: String,
    },

    /// The session is not connected (or has been disconnected)
    #[error("session is not connected")]
    NotConnected,

    /// A subscription is already active on this session
    #[error("a subscription is already active")]
    AlreadySubscribed,

    /// There is no active subscription to tear down
    #[error("no active subscription")]
    NotSubscribed,
}

/// Failures writing a point to the time-series store
#[derive(Debug, Error)]
pub enum SinkError {
    /// Local I/O failure (journal file)
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP request never produced a response
    #[error("sink transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("sink rejected write with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The point could not be serialized
    #[error("sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The background writer queue is full
    #[error("sink buffer full")]
    BufferFull,

    /// The sink has been closed
    #[error("sink is closed")]
    Closed,
}

/// Reasons a single update was not turned into a point
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A field carried a value that is not a valid number
    #[error("field {field} is malformed: '{value}'")]
    MalformedField {
        /// Feed field name (e.g. "BID")
        field: &'static str,
        /// Raw value as delivered
        value: String,
    },

    /// The update had prices but no UTM timestamp
    #[error("timestamp field UTM is missing")]
    MissingTimestamp,

    /// `offer - bid` does not fit in a decimal
    #[error("spread of bid {bid} and offer {offer} overflows")]
    SpreadOverflow { bid: Decimal, offer: Decimal },

    /// The sink refused the point
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Misuse of the lifecycle controller's API, or a failed first subscribe
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `attach` was called when the controller was not in `Init`
    #[error("controller is already attached (state: {0})")]
    AlreadyAttached(&'static str),

    /// `reset` was called when the controller was not `Exhausted`
    #[error("controller is not exhausted (state: {0})")]
    NotExhausted(&'static str),

    /// The controller has been shut down
    #[error("controller is shutting down")]
    ShuttingDown,

    /// The initial subscribe was refused by the session
    #[error("initial subscribe failed: {0}")]
    Subscribe(#[from] SubscriptionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_display() {
        let err = SubscriptionError::Rejected {
            code: 17,
            message: "Data item not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("17"));
        assert!(msg.contains("Data item not found"));
    }

    #[test]
    fn test_dispatch_error_from_sink() {
        let err: DispatchError = SinkError::Closed.into();
        assert!(matches!(err, DispatchError::Sink(SinkError::Closed)));
        assert_eq!(err.to_string(), "sink is closed");
    }

    #[test]
    fn test_configuration_error_keeps_path() {
        let err = ConfigurationError::Unreadable {
            path: PathBuf::from("/nope/epics.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/epics.txt"));
    }
}
