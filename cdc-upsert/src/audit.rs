//! Processing timestamps for merged records.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::{Batch, Record, Value};

/// Source of the processing time written into audit columns.
pub trait ProcessingClock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ProcessingClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock always returning the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ProcessingClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Returns a copy of `record` with `column` set to the current time of `clock`.
///
/// An existing value in `column` is replaced in place.
pub fn add_processing_timestamp<C>(record: &Record, column: &str, clock: &C) -> Record
where
    C: ProcessingClock + ?Sized,
{
    record.clone().with(column, Value::TimestampTz(clock.now()))
}

/// Stamps every record of `batch` with a single reading of `clock`.
pub fn stamp_batch<C>(batch: Batch, column: &str, clock: &C) -> Batch
where
    C: ProcessingClock + ?Sized,
{
    let now = Value::TimestampTz(clock.now());

    batch
        .into_iter()
        .map(|record| record.with(column, now.clone()))
        .collect()
}
