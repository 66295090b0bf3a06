//! Recency-gated upsert of deduplicated batches into target tables.
//!
//! The incoming batch is the source and the table is the target. An incoming record matches a
//! target row when every key column holds an equal value. What happens to matched and unmatched
//! records is controlled by [`WhenMatched`] and [`WhenNotMatched`]; the defaults give upsert
//! semantics where a row is only replaced by a record that is at least as recent.

mod merger;

use serde::Serialize;

pub use merger::Merger;

/// Action taken for an incoming record whose key matches an existing row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WhenMatched {
    /// Replace the row when the incoming recency value is greater than or equal to the row's.
    #[default]
    UpdateIfNotOlder,
    /// Replace the row regardless of recency.
    UpdateAll,
    /// Leave the row untouched.
    DoNothing,
}

/// Action taken for an incoming record whose key matches no row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WhenNotMatched {
    /// Insert the record as a new row.
    #[default]
    InsertAll,
    /// Drop the record.
    DoNothing,
}

/// Counts of what a merge did with the incoming records.
///
/// Every record of the batch is counted exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Records inserted as new rows.
    pub inserted: u64,
    /// Records that replaced a matched row.
    pub updated: u64,
    /// Records that left the table untouched.
    pub skipped: u64,
}

impl MergeOutcome {
    /// Returns the number of records the outcome accounts for.
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.skipped
    }
}
