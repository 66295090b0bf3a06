use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{bail, ensure};
use crate::error::{ErrorKind, EtlResult};
use crate::failpoints::{MEMORY_STORE_BEFORE_APPLY, etl_fail_point};
use crate::store::{MergeChanges, TableSnapshot, TableStore, TableVersion};
use crate::types::{CompositeKey, Record, TableName, TableSchema};

#[derive(Debug)]
struct StoredRow {
    record: Record,
    /// Table version of the commit that last wrote this row.
    modified_at: TableVersion,
}

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<StoredRow>,
    version: TableVersion,
}

impl MemoryTable {
    /// Iterates over the rows whose key over `key_columns` is in `keys`.
    ///
    /// Rows lacking a key column or holding a null key component never match.
    fn matching_rows<'a>(
        &'a self,
        key_columns: &'a [String],
        keys: &'a HashSet<CompositeKey>,
    ) -> impl Iterator<Item = (CompositeKey, &'a StoredRow)> + 'a {
        self.rows.iter().filter_map(move |row| {
            let key = CompositeKey::from_record(&row.record, key_columns).ok()?;
            keys.contains(&key).then_some((key, row))
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, MemoryTable>,
}

/// In-memory table store for testing and development purposes.
///
/// Tables are created explicitly with [`MemoryTableStore::create_table`] and hold their rows in
/// insertion order. Every commit advances the table version and records it on the rows it
/// writes, which lets [`TableStore::commit_merge`] reject changes computed from a snapshot that
/// has since been overtaken for one of the touched keys. Merges touching disjoint keys do not
/// conflict.
///
/// Cloning is cheap and clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTableStore {
    /// Creates a store without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table.
    ///
    /// Fails with [`ErrorKind::TargetAlreadyExists`] if a table with the same name exists.
    pub async fn create_table(&self, schema: TableSchema) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.tables.contains_key(&schema.name) {
            bail!(
                ErrorKind::TargetAlreadyExists,
                "Target table already exists",
                format!("table {} already exists", schema.name)
            );
        }

        info!(table = %schema.name, columns = schema.column_schemas.len(), "creating table");

        inner.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
                version: 0,
            },
        );

        Ok(())
    }

    /// Appends rows bypassing merge semantics. Used to seed tables.
    ///
    /// Rows are conformed to the table schema with [`TableSchema::conform`], so they are stored
    /// in the same representation merges produce. If any row violates the schema nothing is
    /// inserted and all violations are returned.
    pub async fn insert_rows(&self, table_name: &TableName, rows: Vec<Record>) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let table = table_mut(&mut inner, table_name)?;

        let mut conformed = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();
        for record in &rows {
            match table.schema.conform(record) {
                Ok(record) => conformed.push(record),
                Err(record_errors) => errors.extend(record_errors),
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        table.version += 1;
        let version = table.version;

        debug!(table = %table_name, rows = conformed.len(), version, "seeding table rows");

        table.rows.extend(conformed.into_iter().map(|record| StoredRow {
            record,
            modified_at: version,
        }));

        Ok(())
    }

    /// Returns a copy of all rows of a table in storage order, or [`None`] if it does not exist.
    pub async fn table_rows(&self, table_name: &TableName) -> Option<Vec<Record>> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table_name)
            .map(|table| table.rows.iter().map(|row| row.record.clone()).collect())
    }

    /// Returns the current version of a table, or [`None`] if it does not exist.
    pub async fn version(&self, table_name: &TableName) -> Option<TableVersion> {
        let inner = self.inner.lock().await;
        inner.tables.get(table_name).map(|table| table.version)
    }
}

fn table_mut<'a>(inner: &'a mut Inner, table_name: &TableName) -> EtlResult<&'a mut MemoryTable> {
    match inner.tables.get_mut(table_name) {
        Some(table) => Ok(table),
        None => bail!(
            ErrorKind::TargetNotFound,
            "Target table not found",
            format!("table {table_name} does not exist")
        ),
    }
}

impl TableStore for MemoryTableStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn table_schema(&self, table_name: &TableName) -> EtlResult<Option<TableSchema>> {
        let inner = self.inner.lock().await;
        Ok(inner.tables.get(table_name).map(|table| table.schema.clone()))
    }

    async fn lookup_rows(
        &self,
        table_name: &TableName,
        key_columns: &[String],
        keys: &[CompositeKey],
    ) -> EtlResult<TableSnapshot> {
        let mut inner = self.inner.lock().await;
        let table = table_mut(&mut inner, table_name)?;

        let keys: HashSet<CompositeKey> = keys.iter().cloned().collect();
        let mut rows = HashMap::with_capacity(keys.len());
        for (key, row) in table.matching_rows(key_columns, &keys) {
            rows.entry(key).or_insert_with(|| row.record.clone());
        }

        Ok(TableSnapshot {
            version: table.version,
            rows,
        })
    }

    async fn commit_merge(&self, table_name: &TableName, changes: MergeChanges) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let table = table_mut(&mut inner, table_name)?;

        ensure!(
            changes.base_version <= table.version,
            ErrorKind::InvalidState,
            "Merge based on an unknown table version",
            format!(
                "changes are based on version {} but table {table_name} is at version {}",
                changes.base_version, table.version
            )
        );

        if changes.is_empty() {
            return Ok(());
        }

        let mut updates = HashMap::with_capacity(changes.updates.len());
        for record in changes.updates {
            let key = CompositeKey::from_record(&record, &changes.key_columns)?;
            updates.insert(key, record);
        }

        let mut inserted_keys = HashSet::with_capacity(changes.inserts.len());
        for record in &changes.inserts {
            inserted_keys.insert(CompositeKey::from_record(record, &changes.key_columns)?);
        }

        // First committer wins: any touched key written after the snapshot, or an insert for a
        // key that exists by now, invalidates the whole set of changes.
        let touched: HashSet<CompositeKey> =
            updates.keys().chain(&inserted_keys).cloned().collect();
        for (key, row) in table.matching_rows(&changes.key_columns, &touched) {
            if row.modified_at > changes.base_version || inserted_keys.contains(&key) {
                bail!(
                    ErrorKind::MergeConflict,
                    "Concurrent modification of merged rows",
                    format!(
                        "row {key} of table {table_name} changed after version {}",
                        changes.base_version
                    )
                );
            }
        }

        etl_fail_point(MEMORY_STORE_BEFORE_APPLY)?;

        let version = table.version + 1;
        let mut updated = 0;
        for row in table.rows.iter_mut() {
            let Ok(key) = CompositeKey::from_record(&row.record, &changes.key_columns) else {
                continue;
            };

            if let Some(record) = updates.get(&key) {
                row.record = record.clone();
                row.modified_at = version;
                updated += 1;
            }
        }

        let inserted = changes.inserts.len();
        table
            .rows
            .extend(changes.inserts.into_iter().map(|record| StoredRow {
                record,
                modified_at: version,
            }));
        table.version = version;

        info!(
            table = %table_name,
            version,
            updated,
            inserted,
            "committed merge"
        );

        Ok(())
    }
}
