//! Data types flowing through deduplication and merge.
//!
//! A [`Batch`] holds [`Record`]s, each an ordered mapping from field names to typed [`Value`]s.
//! The [`CompositeKey`] of a record identifies the entity it describes, and the target table is
//! described by a [`TableSchema`].

mod batch;
mod key;
mod record;
mod schema;
mod value;

pub use batch::Batch;
pub use key::CompositeKey;
pub use record::Record;
pub use schema::{ColumnSchema, TableName, TableSchema};
pub use value::{Value, ValueType};
