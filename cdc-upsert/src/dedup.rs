//! Reduction of a batch to the latest record per composite key.
//!
//! Records are spread over hash partitions by composite key. Within a partition each key keeps a
//! single running winner, so every record is compared once against the current winner of its
//! group and never against the rest of the batch. Partitions share nothing and are processed one
//! after the other.

use std::cmp::Ordering;
use std::collections::HashMap;

use cdc_upsert_config::shared::{DedupConfig, TieBreak};
use metrics::counter;
use tracing::debug;

use crate::{bail, ensure};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::metrics::{CDC_DEDUP_RECORDS_IN_TOTAL, CDC_DEDUP_RECORDS_OUT_TOTAL};
use crate::types::{Batch, CompositeKey, Record, Value};

/// Deduplicates `batch` with the default partitioning and [`TieBreak::FirstSeen`].
pub fn deduplicate(
    batch: &Batch,
    key_columns: &[String],
    recency_column: &str,
) -> EtlResult<Batch> {
    Deduplicator::new(key_columns.to_vec(), recency_column)?.deduplicate(batch)
}

/// Keeps exactly one record per composite key: the one with the greatest recency value.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    key_columns: Vec<String>,
    recency_column: String,
    partitions: usize,
    tie_break: TieBreak,
}

/// Running winner of one key group.
#[derive(Debug)]
struct Group {
    /// Position of the first record of the group, which fixes the output position.
    first_index: usize,
    winner_index: usize,
}

impl Deduplicator {
    /// Creates a deduplicator for the given key and recency columns.
    ///
    /// Fails with [`ErrorKind::ConfigError`] when no key column is given.
    pub fn new(key_columns: Vec<String>, recency_column: impl Into<String>) -> EtlResult<Self> {
        ensure!(
            !key_columns.is_empty(),
            ErrorKind::ConfigError,
            "No key columns given",
            "deduplication requires at least one key column"
        );

        Ok(Self {
            key_columns,
            recency_column: recency_column.into(),
            partitions: DedupConfig::DEFAULT_PARTITIONS,
            tie_break: TieBreak::default(),
        })
    }

    /// Applies partitioning and tie-break settings from configuration.
    pub fn with_config(self, config: &DedupConfig) -> Self {
        self.with_partitions(config.partitions)
            .with_tie_break(config.tie_break.clone())
    }

    /// Sets the number of hash partitions. Zero is treated as one.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn recency_column(&self) -> &str {
        &self.recency_column
    }

    /// Returns a new batch holding one record per distinct composite key of `batch`.
    ///
    /// Winners are emitted in the order their key first appears in `batch`. Every record with a
    /// missing key field, null key field or missing recency field is reported in one aggregated
    /// [`ErrorKind::SchemaError`]. Recency values that cannot be ordered within a group fail with
    /// [`ErrorKind::ComparisonError`].
    pub fn deduplicate(&self, batch: &Batch) -> EtlResult<Batch> {
        let records = batch.records();
        let keys = self.extract_keys(records)?;

        let mut partitions: Vec<Vec<(usize, CompositeKey)>> = vec![Vec::new(); self.partitions];
        for (index, key) in keys.into_iter().enumerate() {
            partitions[key.partition(self.partitions)].push((index, key));
        }

        let mut groups = Vec::new();
        for partition in partitions {
            groups.extend(self.select_partition(records, partition)?);
        }
        groups.sort_unstable_by_key(|group| group.first_index);

        let deduplicated: Batch = groups
            .into_iter()
            .map(|group| records[group.winner_index].clone())
            .collect();

        counter!(CDC_DEDUP_RECORDS_IN_TOTAL).increment(records.len() as u64);
        counter!(CDC_DEDUP_RECORDS_OUT_TOTAL).increment(deduplicated.len() as u64);

        debug!(
            records_in = records.len(),
            records_out = deduplicated.len(),
            partitions = self.partitions,
            "deduplicated batch"
        );

        Ok(deduplicated)
    }

    fn extract_keys(&self, records: &[Record]) -> EtlResult<Vec<CompositeKey>> {
        let mut keys = Vec::with_capacity(records.len());
        let mut errors: Vec<EtlError> = Vec::new();

        for record in records {
            let key = CompositeKey::from_record(record, &self.key_columns);
            let recency = record.require(&self.recency_column);

            match (key, recency) {
                (Ok(key), Ok(_)) => keys.push(key),
                (key, recency) => {
                    errors.extend(key.err());
                    errors.extend(recency.err());
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(keys)
    }

    /// Selects the winner of every key group in one partition.
    fn select_partition(
        &self,
        records: &[Record],
        candidates: Vec<(usize, CompositeKey)>,
    ) -> EtlResult<Vec<Group>> {
        let mut groups: HashMap<CompositeKey, Group> = HashMap::with_capacity(candidates.len());

        // Candidates arrive in batch order, so the current winner always precedes the candidate.
        for (index, key) in candidates {
            match groups.get_mut(&key) {
                Some(group) => {
                    if self.prefers(&records[index], &records[group.winner_index], &key)? {
                        group.winner_index = index;
                    }
                }
                None => {
                    groups.insert(
                        key,
                        Group {
                            first_index: index,
                            winner_index: index,
                        },
                    );
                }
            }
        }

        Ok(groups.into_values().collect())
    }

    /// Returns `true` when `candidate` replaces `current` as the winner of group `key`.
    fn prefers(&self, candidate: &Record, current: &Record, key: &CompositeKey) -> EtlResult<bool> {
        let candidate_recency = candidate.require(&self.recency_column)?;
        let current_recency = current.require(&self.recency_column)?;

        match compare(
            candidate_recency,
            current_recency,
            &self.recency_column,
            key,
        )? {
            Ordering::Greater => Ok(true),
            Ordering::Less => Ok(false),
            Ordering::Equal => match &self.tie_break {
                TieBreak::FirstSeen => Ok(false),
                TieBreak::LastSeen => Ok(true),
                TieBreak::Column(column) => {
                    let ordering =
                        compare(candidate.require(column)?, current.require(column)?, column, key)?;
                    Ok(ordering == Ordering::Greater)
                }
            },
        }
    }
}

fn compare(
    candidate: &Value,
    current: &Value,
    column: &str,
    key: &CompositeKey,
) -> EtlResult<Ordering> {
    match candidate.try_cmp(current) {
        Some(ordering) => Ok(ordering),
        None => bail!(
            ErrorKind::ComparisonError,
            "Incomparable values within a key group",
            format!("values {candidate} and {current} of column `{column}` for key {key} cannot be ordered")
        ),
    }
}
