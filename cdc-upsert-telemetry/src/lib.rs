//! Logging and metrics setup shared by upsert pipeline drivers and tests.

pub mod metrics;
pub mod tracing;
