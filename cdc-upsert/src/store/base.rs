use std::collections::HashMap;
use std::future::Future;

use crate::error::EtlResult;
use crate::types::{CompositeKey, Record, TableName, TableSchema};

/// Monotonic version of a target table, advanced by every commit.
pub type TableVersion = u64;

/// Rows of a target table matching a set of composite keys, read at a given version.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    /// Table version the rows were read at.
    pub version: TableVersion,
    /// Matching rows by composite key. Keys without a row are absent.
    pub rows: HashMap<CompositeKey, Record>,
}

/// All row changes of one merge, applied atomically by [`TableStore::commit_merge`].
#[derive(Debug, Clone)]
pub struct MergeChanges {
    /// Version of the [`TableSnapshot`] the changes were computed from.
    pub base_version: TableVersion,
    /// Columns forming the composite key of the rows.
    pub key_columns: Vec<String>,
    /// Complete replacement rows for existing keys.
    pub updates: Vec<Record>,
    /// Rows for keys absent from the table.
    pub inserts: Vec<Record>,
}

impl MergeChanges {
    pub fn len(&self) -> usize {
        self.updates.len() + self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Trait for transactional table stores that merged batches are written to.
///
/// The store is responsible for resolving table names, serving point lookups by composite key
/// and applying a [`MergeChanges`] set atomically: either every update and insert becomes
/// visible or none does. Match and update decisions are taken by the caller.
///
/// Implementations must detect concurrent modifications: when a row touched by a commit was
/// written after [`MergeChanges::base_version`], the commit fails with
/// [`crate::error::ErrorKind::MergeConflict`] without applying anything.
pub trait TableStore {
    /// Returns the name of the store.
    fn name() -> &'static str;

    /// Resolves `table_name` to its schema, or [`None`] if the table does not exist.
    fn table_schema(
        &self,
        table_name: &TableName,
    ) -> impl Future<Output = EtlResult<Option<TableSchema>>> + Send;

    /// Reads the rows whose composite key over `key_columns` is one of `keys`.
    fn lookup_rows(
        &self,
        table_name: &TableName,
        key_columns: &[String],
        keys: &[CompositeKey],
    ) -> impl Future<Output = EtlResult<TableSnapshot>> + Send;

    /// Atomically applies `changes` to the table.
    fn commit_merge(
        &self,
        table_name: &TableName,
        changes: MergeChanges,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
