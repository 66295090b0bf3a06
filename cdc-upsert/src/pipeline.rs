use std::sync::Arc;

use cdc_upsert_config::shared::UpsertConfig;
use tracing::{debug, info};

use crate::audit::{ProcessingClock, stamp_batch};
use crate::dedup::Deduplicator;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{MergeOutcome, Merger};
use crate::store::TableStore;
use crate::types::{Batch, TableName};

/// Deduplicates, stamps and merges batches into the table named by an [`UpsertConfig`].
///
/// Batches are processed independently of each other. Nothing is retried: every failure is
/// returned to the caller, and deduplication failures are raised before the store is contacted.
#[derive(Debug)]
pub struct UpsertPipeline<S, C> {
    config: Arc<UpsertConfig>,
    table_name: TableName,
    deduplicator: Deduplicator,
    merger: Merger<S>,
    clock: C,
}

impl<S, C> UpsertPipeline<S, C>
where
    S: TableStore,
    C: ProcessingClock,
{
    /// Builds a pipeline from a configuration, validating it first.
    pub fn new(config: UpsertConfig, store: S, clock: C) -> EtlResult<Self> {
        config.validate().map_err(|err| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid upsert configuration",
                err,
                source: err
            )
        })?;

        let table_name = TableName::from(&config.table);
        let deduplicator =
            Deduplicator::new(config.key_columns.clone(), config.recency_column.clone())?
                .with_config(&config.dedup);
        let merger = Merger::new(
            store,
            config.key_columns.clone(),
            config.recency_column.clone(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            table_name,
            deduplicator,
            merger,
            clock,
        })
    }

    pub fn config(&self) -> &UpsertConfig {
        &self.config
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }

    pub fn store(&self) -> &S {
        self.merger.store()
    }

    /// Runs one batch through deduplication, optional audit stamping and merge.
    pub async fn process_batch(&self, batch: Batch) -> EtlResult<MergeOutcome> {
        let records_in = batch.len();
        let mut deduplicated = self.deduplicator.deduplicate(&batch)?;

        if self.config.audit.enabled {
            deduplicated = stamp_batch(deduplicated, &self.config.audit.column, &self.clock);
        }

        debug!(
            table = %self.table_name,
            records_in,
            records_out = deduplicated.len(),
            "prepared batch for merge"
        );

        let outcome = self.merger.merge(&deduplicated, &self.table_name).await?;

        info!(
            table = %self.table_name,
            records_in,
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "processed batch"
        );

        Ok(outcome)
    }
}
