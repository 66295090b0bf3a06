use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::{bail, ensure};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::failpoints::{MERGE_BEFORE_COMMIT, etl_fail_point};
use crate::merge::{MergeOutcome, WhenMatched, WhenNotMatched};
use crate::metrics::{
    CDC_MERGE_BATCH_SIZE, CDC_MERGE_DURATION_SECONDS, CDC_MERGE_FAILURES_TOTAL,
    CDC_MERGE_ROWS_TOTAL, ERROR_KIND_LABEL, OUTCOME_LABEL, TABLE_NAME_LABEL,
};
use crate::store::{MergeChanges, TableStore};
use crate::types::{Batch, CompositeKey, Record, TableName, TableSchema, Value};

/// An incoming record conformed to the target schema, with its key.
#[derive(Debug)]
struct PreparedRecord {
    key: CompositeKey,
    record: Record,
}

/// Merges deduplicated batches into target tables of a [`TableStore`].
///
/// A merge resolves the target table, validates and conforms every incoming record to the table
/// schema, reads the rows matching the incoming keys, decides per record whether to update,
/// insert or skip, and submits all updates and inserts in a single
/// [`TableStore::commit_merge`]. Every check runs before the commit, so a failed merge leaves the
/// table as it was.
#[derive(Debug, Clone)]
pub struct Merger<S> {
    store: S,
    key_columns: Vec<String>,
    recency_column: String,
    when_matched: WhenMatched,
    when_not_matched: WhenNotMatched,
}

impl<S> Merger<S>
where
    S: TableStore,
{
    /// Creates a merger matching on `key_columns` and gating updates on `recency_column`.
    ///
    /// Fails with [`ErrorKind::ConfigError`] when no key column is given.
    pub fn new(
        store: S,
        key_columns: Vec<String>,
        recency_column: impl Into<String>,
    ) -> EtlResult<Self> {
        ensure!(
            !key_columns.is_empty(),
            ErrorKind::ConfigError,
            "No key columns given",
            "merging requires at least one key column"
        );

        Ok(Self {
            store,
            key_columns,
            recency_column: recency_column.into(),
            when_matched: WhenMatched::default(),
            when_not_matched: WhenNotMatched::default(),
        })
    }

    pub fn when_matched(mut self, action: WhenMatched) -> Self {
        self.when_matched = action;
        self
    }

    pub fn when_not_matched(mut self, action: WhenNotMatched) -> Self {
        self.when_not_matched = action;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges `batch` into `table_name` and reports what happened to its records.
    ///
    /// The batch must hold at most one record per composite key. An empty batch still requires
    /// the table to exist but commits nothing.
    pub async fn merge(&self, batch: &Batch, table_name: &TableName) -> EtlResult<MergeOutcome> {
        let started = Instant::now();
        let result = self.try_merge(batch, table_name).await;

        let table = table_name.to_string();
        match &result {
            Ok(outcome) => {
                for (label, count) in [
                    ("inserted", outcome.inserted),
                    ("updated", outcome.updated),
                    ("skipped", outcome.skipped),
                ] {
                    counter!(
                        CDC_MERGE_ROWS_TOTAL,
                        TABLE_NAME_LABEL => table.clone(),
                        OUTCOME_LABEL => label
                    )
                    .increment(count);
                }
                histogram!(CDC_MERGE_BATCH_SIZE, TABLE_NAME_LABEL => table.clone())
                    .record(batch.len() as f64);
                histogram!(CDC_MERGE_DURATION_SECONDS, TABLE_NAME_LABEL => table)
                    .record(started.elapsed().as_secs_f64());
            }
            Err(err) => {
                warn!(table = %table_name, error_kind = ?err.kind(), "merge failed");
                counter!(
                    CDC_MERGE_FAILURES_TOTAL,
                    TABLE_NAME_LABEL => table,
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);
            }
        }

        result
    }

    async fn try_merge(&self, batch: &Batch, table_name: &TableName) -> EtlResult<MergeOutcome> {
        let Some(schema) = self.store.table_schema(table_name).await? else {
            bail!(
                ErrorKind::TargetNotFound,
                "Target table not found",
                format!("table {table_name} does not exist in store {}", S::name())
            );
        };

        self.validate_schema(&schema)?;

        if batch.is_empty() {
            debug!(table = %table_name, "empty batch, nothing to merge");
            return Ok(MergeOutcome::default());
        }

        let prepared = self.prepare_batch(batch, &schema)?;
        let keys: Vec<CompositeKey> = prepared.iter().map(|p| p.key.clone()).collect();

        let snapshot = self
            .store
            .lookup_rows(table_name, &self.key_columns, &keys)
            .await?;

        let mut outcome = MergeOutcome::default();
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        let mut errors = Vec::new();

        for PreparedRecord { key, record } in prepared {
            match snapshot.rows.get(&key) {
                Some(existing) => match self.when_matched {
                    WhenMatched::DoNothing => outcome.skipped += 1,
                    WhenMatched::UpdateAll => {
                        updates.push(record);
                        outcome.updated += 1;
                    }
                    WhenMatched::UpdateIfNotOlder => {
                        match self.is_not_older(&record, existing, &key) {
                            Ok(true) => {
                                updates.push(record);
                                outcome.updated += 1;
                            }
                            Ok(false) => outcome.skipped += 1,
                            Err(err) => errors.push(err),
                        }
                    }
                },
                None => match self.when_not_matched {
                    WhenNotMatched::InsertAll => {
                        inserts.push(record);
                        outcome.inserted += 1;
                    }
                    WhenNotMatched::DoNothing => outcome.skipped += 1,
                },
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        debug!(
            table = %table_name,
            base_version = snapshot.version,
            matched = snapshot.rows.len(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "computed merge changes"
        );

        if updates.is_empty() && inserts.is_empty() {
            info!(table = %table_name, skipped = outcome.skipped, "merge had no changes to commit");
            return Ok(outcome);
        }

        etl_fail_point(MERGE_BEFORE_COMMIT)?;

        self.store
            .commit_merge(
                table_name,
                MergeChanges {
                    base_version: snapshot.version,
                    key_columns: self.key_columns.clone(),
                    updates,
                    inserts,
                },
            )
            .await?;

        info!(
            table = %table_name,
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "merged batch"
        );

        Ok(outcome)
    }

    /// Checks that the key and recency columns exist in the target table.
    fn validate_schema(&self, schema: &TableSchema) -> EtlResult<()> {
        let errors: Vec<EtlError> = self
            .key_columns
            .iter()
            .chain(std::iter::once(&self.recency_column))
            .filter(|column| !schema.has_column(column))
            .map(|column| {
                etl_error!(
                    ErrorKind::SchemaError,
                    "Merge column missing from target table",
                    format!("table {} has no column `{column}`", schema.name)
                )
            })
            .collect();

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    /// Conforms every record to `schema` and rejects repeated keys.
    ///
    /// All offending records are reported together.
    fn prepare_batch(&self, batch: &Batch, schema: &TableSchema) -> EtlResult<Vec<PreparedRecord>> {
        let mut prepared = Vec::with_capacity(batch.len());
        let mut errors = Vec::new();

        for record in batch {
            match self.prepare_record(record, schema) {
                Ok(record) => prepared.push(record),
                Err(record_errors) => errors.extend(record_errors),
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let duplicates: Vec<EtlError> = {
            let mut occurrences: HashMap<&CompositeKey, usize> =
                HashMap::with_capacity(prepared.len());
            for record in &prepared {
                *occurrences.entry(&record.key).or_default() += 1;
            }

            prepared
                .iter()
                .filter_map(|record| {
                    let count = occurrences.remove(&record.key)?;
                    (count > 1).then(|| {
                        etl_error!(
                            ErrorKind::DuplicateKey,
                            "Duplicate key in merged batch",
                            format!("key {} appears {count} times", record.key)
                        )
                    })
                })
                .collect()
        };

        if !duplicates.is_empty() {
            return Err(duplicates.into());
        }

        Ok(prepared)
    }

    /// Validates one record against the target schema and returns it in column order.
    ///
    /// Nullable columns absent from the record are filled with null.
    fn prepare_record(
        &self,
        record: &Record,
        schema: &TableSchema,
    ) -> Result<PreparedRecord, Vec<EtlError>> {
        let mut errors = Vec::new();

        if let Err(err) = CompositeKey::from_record(record, &self.key_columns) {
            errors.push(err);
        }

        if !record.contains(&self.recency_column) {
            errors.push(etl_error!(
                ErrorKind::SchemaError,
                "Recency field missing from record",
                format!("record has no recency field `{}`", self.recency_column)
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let conformed = schema.conform(record)?;

        // Coercion may change the type of key values, so the key is taken from the conformed
        // record to match the representation of stored rows.
        let key = CompositeKey::from_record(&conformed, &self.key_columns).map_err(|err| vec![err])?;

        Ok(PreparedRecord {
            key,
            record: conformed,
        })
    }

    /// Returns `true` when `incoming` is at least as recent as `existing`.
    fn is_not_older(
        &self,
        incoming: &Record,
        existing: &Record,
        key: &CompositeKey,
    ) -> EtlResult<bool> {
        let incoming_recency = incoming.get(&self.recency_column).unwrap_or(&Value::Null);
        let existing_recency = existing.get(&self.recency_column).unwrap_or(&Value::Null);

        match incoming_recency.try_cmp(existing_recency) {
            Some(ordering) => Ok(ordering != Ordering::Less),
            None => bail!(
                ErrorKind::ComparisonError,
                "Incoming and existing recency values are incomparable",
                format!(
                    "incoming {incoming_recency} and existing {existing_recency} of column `{}` for key {key} cannot be ordered",
                    self.recency_column
                )
            ),
        }
    }
}
