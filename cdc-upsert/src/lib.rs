//! Deduplication and recency-gated upsert of change-data-capture batches.
//!
//! A batch of change records is first reduced to the latest record per composite key by the
//! [`dedup::Deduplicator`], optionally stamped with a processing timestamp by [`audit`], and then
//! merged into a target table by the [`merge::Merger`]. Matching rows are only replaced by records
//! that are at least as recent, unmatched records are inserted, and every merge is applied
//! through a single atomic [`store::TableStore::commit_merge`] call.
//!
//! [`pipeline::UpsertPipeline`] wires these steps together from an
//! [`cdc_upsert_config::shared::UpsertConfig`].

mod macros;

pub mod audit;
pub mod dedup;
pub mod error;
pub mod failpoints;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
