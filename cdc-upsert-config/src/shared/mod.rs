//! Shared configuration types for upsert pipelines.

mod audit;
mod dedup;
mod table;
mod upsert;

pub use audit::AuditConfig;
pub use dedup::{DedupConfig, TieBreak};
pub use table::TargetTableConfig;
pub use upsert::UpsertConfig;

use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// At least one key column is required to identify an entity.
    #[error("`key_columns` cannot be empty")]
    KeyColumnsEmpty,
    /// A key column was listed more than once.
    #[error("`key_columns` contains `{0}` more than once")]
    DuplicateKeyColumn(String),
    /// A required name was empty or only whitespace.
    #[error("`{0}` cannot be blank")]
    BlankName(&'static str),
    /// The recency column cannot also be part of the key.
    #[error("`recency_column` `{0}` cannot also be a key column")]
    RecencyColumnIsKey(String),
    /// The number of dedup partitions cannot be zero.
    #[error("`dedup.partitions` cannot be zero")]
    DedupPartitionsZero,
    /// The audit column would overwrite a key or recency value.
    #[error("`audit.column` `{0}` collides with a key or recency column")]
    AuditColumnCollision(String),
}
