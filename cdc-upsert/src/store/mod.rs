//! Target table store abstraction.
//!
//! The merger resolves target tables, reads the rows matching incoming keys and submits all of
//! its changes through the [`TableStore`] trait. [`memory::MemoryTableStore`] is an in-memory
//! implementation with optimistic concurrency control, used for tests and development.

mod base;
pub mod memory;

pub use base::{MergeChanges, TableSnapshot, TableStore, TableVersion};
