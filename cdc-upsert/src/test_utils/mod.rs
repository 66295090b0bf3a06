//! Utilities for testing deduplication, merges and pipelines.
//!
//! - [`records`] builds schemas, records and batches for a small customers table.
//! - [`store_wrapper`] wraps any [`crate::store::TableStore`] to count calls and inject failures.
//! - [`table`] holds assertions over target table contents.
//! - `failpoints` configures fail points for the duration of a test (feature `failpoints`).

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod records;
pub mod store_wrapper;
pub mod table;
