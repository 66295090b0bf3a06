//! Metric names emitted while deduplicating and merging batches.
//!
//! Values are recorded through the `metrics` facade; installing a recorder is up to the
//! embedding process.

/// Label for the target table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Label for the merge outcome of a row (`inserted`, `updated` or `skipped`).
pub const OUTCOME_LABEL: &str = "outcome";

// Deduplication metrics

/// Counter for records received by the deduplicator.
pub const CDC_DEDUP_RECORDS_IN_TOTAL: &str = "cdc_dedup_records_in_total";

/// Counter for records kept by the deduplicator.
pub const CDC_DEDUP_RECORDS_OUT_TOTAL: &str = "cdc_dedup_records_out_total";

// Merge metrics

/// Counter for rows touched or skipped by merges, labelled by outcome.
pub const CDC_MERGE_ROWS_TOTAL: &str = "cdc_merge_rows_total";

/// Histogram of merge durations in seconds, from target resolution to commit.
pub const CDC_MERGE_DURATION_SECONDS: &str = "cdc_merge_duration_seconds";

/// Histogram of the number of records per merged batch.
pub const CDC_MERGE_BATCH_SIZE: &str = "cdc_merge_batch_size";

/// Counter for failed merges, labelled by error kind.
pub const CDC_MERGE_FAILURES_TOTAL: &str = "cdc_merge_failures_total";

/// Registers metric descriptions with the global metrics recorder.
///
/// Call once after installing a recorder; without one the descriptions are dropped.
pub fn register_metrics() {
    use metrics::{Unit, describe_counter, describe_histogram};

    describe_counter!(
        CDC_DEDUP_RECORDS_IN_TOTAL,
        Unit::Count,
        "Records received by the deduplicator"
    );
    describe_counter!(
        CDC_DEDUP_RECORDS_OUT_TOTAL,
        Unit::Count,
        "Records kept by the deduplicator, one per composite key"
    );
    describe_counter!(
        CDC_MERGE_ROWS_TOTAL,
        Unit::Count,
        "Incoming records merged into target tables, by outcome"
    );
    describe_histogram!(
        CDC_MERGE_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of merges from target resolution to commit"
    );
    describe_histogram!(
        CDC_MERGE_BATCH_SIZE,
        Unit::Count,
        "Number of records per merged batch"
    );
    describe_counter!(
        CDC_MERGE_FAILURES_TOTAL,
        Unit::Count,
        "Merges that failed, by error kind"
    );
}
