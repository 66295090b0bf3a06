use std::fs;

use cdc_upsert::audit::FixedClock;
use cdc_upsert::error::ErrorKind;
use cdc_upsert::merge::MergeOutcome;
use cdc_upsert::pipeline::UpsertPipeline;
use cdc_upsert::store::memory::MemoryTableStore;
use cdc_upsert::test_utils::records::{
    CUSTOMER_ID, LAST_UPDATED, PROCESS_TIMESTAMP, customer, customers, customers_schema,
    key_columns, test_table_name, ts,
};
use cdc_upsert::test_utils::store_wrapper::TestStoreWrapper;
use cdc_upsert::test_utils::table::{assert_table_rows, table_rows};
use cdc_upsert::types::{Batch, Record, TableName, Value};
use cdc_upsert_config::shared::{
    AuditConfig, DedupConfig, TargetTableConfig, TieBreak, UpsertConfig,
};
use cdc_upsert_config::{Environment, load_config_from};
use cdc_upsert_telemetry::tracing::init_test_tracing;

fn upsert_config(table_name: &TableName) -> UpsertConfig {
    UpsertConfig {
        table: TargetTableConfig {
            namespace: table_name.namespace.clone(),
            name: table_name.name.clone(),
        },
        key_columns: key_columns(),
        recency_column: LAST_UPDATED.to_string(),
        dedup: DedupConfig::default(),
        audit: AuditConfig::default(),
    }
}

async fn customers_store(table_name: &TableName) -> MemoryTableStore {
    let store = MemoryTableStore::new();
    store
        .create_table(customers_schema(table_name.clone()))
        .await
        .unwrap();
    store
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_is_deduplicated_stamped_and_merged() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name).await;
    store
        .insert_rows(&table_name, vec![customer(1, "ada", 25)])
        .await
        .unwrap();
    let clock = FixedClock(ts(1_000));

    let pipeline = UpsertPipeline::new(upsert_config(&table_name), store.clone(), clock).unwrap();
    let outcome = pipeline
        .process_batch(customers(&[(1, "ada-a", 10), (1, "ada-b", 20), (2, "bob", 5)]))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        MergeOutcome {
            inserted: 1,
            updated: 0,
            skipped: 1
        }
    );
    assert_table_rows(
        &store,
        &table_name,
        &key_columns(),
        &[
            customer(1, "ada", 25),
            customer(2, "bob", 5).with(PROCESS_TIMESTAMP, ts(1_000)),
        ],
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn audit_stamping_can_be_disabled() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name).await;
    let mut config = upsert_config(&table_name);
    config.audit.enabled = false;

    let pipeline = UpsertPipeline::new(config, store.clone(), FixedClock(ts(0))).unwrap();
    pipeline
        .process_batch(customers(&[(1, "ada", 1)]))
        .await
        .unwrap();

    let rows = table_rows(&store, &table_name).await;
    assert_eq!(rows[0].get(PROCESS_TIMESTAMP), Some(&Value::Null));
}

#[tokio::test(flavor = "multi_thread")]
async fn dedup_failures_never_reach_the_store() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = TestStoreWrapper::wrap(customers_store(&table_name).await);
    let pipeline =
        UpsertPipeline::new(upsert_config(&table_name), store.clone(), FixedClock(ts(0))).unwrap();

    let batch = Batch::new(vec![
        customer(1, "ada", 1),
        Record::new()
            .with(CUSTOMER_ID, 1i64)
            .with("name", "ada")
            .with(LAST_UPDATED, "yesterday"),
    ]);
    let err = pipeline.process_batch(batch).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ComparisonError);
    assert_eq!(store.table_schema_calls().await, 0);
    assert_eq!(store.commit_merge_calls().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_are_processed_independently() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name).await;
    let mut config = upsert_config(&table_name);
    config.audit.enabled = false;
    config.dedup.tie_break = TieBreak::LastSeen;
    let pipeline = UpsertPipeline::new(config, store.clone(), FixedClock(ts(0))).unwrap();

    pipeline
        .process_batch(customers(&[(1, "ada", 5), (1, "ada-tie", 5)]))
        .await
        .unwrap();
    pipeline
        .process_batch(customers(&[(1, "ada-old", 4), (2, "bob", 1)]))
        .await
        .unwrap();

    assert_table_rows(
        &store,
        &table_name,
        &key_columns(),
        &[customer(1, "ada-tie", 5), customer(2, "bob", 1)],
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_runs_from_loaded_configuration() {
    init_test_tracing();
    let dir = std::env::temp_dir().join(format!("cdc-upsert-pipeline-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("base.yaml"),
        "table:\n  namespace: silver\n  name: customers\nkey_columns: [customer_id]\nrecency_column: last_updated_timestamp\n",
    )
    .unwrap();
    fs::write(dir.join("dev.yaml"), "audit:\n  enabled: false\n").unwrap();

    let config: UpsertConfig = load_config_from(&dir, Environment::Dev).unwrap();
    let table_name = TableName::new("silver", "customers");
    let store = customers_store(&table_name).await;
    let pipeline = UpsertPipeline::new(config, store.clone(), FixedClock(ts(0))).unwrap();

    pipeline
        .process_batch(customers(&[(1, "ada", 1)]))
        .await
        .unwrap();

    assert_table_rows(&store, &table_name, &key_columns(), &[customer(1, "ada", 1)]).await;
    fs::remove_dir_all(dir).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_integer_width_keys_are_merged_as_one_row() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name).await;
    let mut config = upsert_config(&table_name);
    config.audit.enabled = false;

    let narrow = Record::new()
        .with(CUSTOMER_ID, 1i32)
        .with("name", "ada-a")
        .with(LAST_UPDATED, ts(10));
    let pipeline = UpsertPipeline::new(config, store.clone(), FixedClock(ts(0))).unwrap();
    let outcome = pipeline
        .process_batch(Batch::new(vec![narrow, customer(1, "ada-b", 20)]))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        MergeOutcome {
            inserted: 1,
            updated: 0,
            skipped: 0
        }
    );
    assert_table_rows(&store, &table_name, &key_columns(), &[customer(1, "ada-b", 20)]).await;
}
