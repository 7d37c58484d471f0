//! Shared setup for the ticksink binaries

pub mod common;
