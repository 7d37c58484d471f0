//! Test doubles for the feed and the sink
//!
//! Used by the unit tests, the integration tests under `tests/` and the
//! benchmarks.

pub mod mock_session;
pub mod recording_sink;

pub use mock_session::MockSession;
pub use recording_sink::RecordingSink;
