use cdc_upsert::error::ErrorKind;
use cdc_upsert::failpoints::{MEMORY_STORE_BEFORE_APPLY, MERGE_BEFORE_COMMIT};
use cdc_upsert::merge::Merger;
use cdc_upsert::store::memory::MemoryTableStore;
use cdc_upsert::test_utils::failpoints::CustomFailScenario;
use cdc_upsert::test_utils::records::{
    LAST_UPDATED, customer, customers, customers_schema, key_columns, test_table_name,
};
use cdc_upsert::test_utils::store_wrapper::TestStoreWrapper;
use cdc_upsert::test_utils::table::assert_table_rows;
use cdc_upsert::types::TableName;
use cdc_upsert_telemetry::tracing::init_test_tracing;

async fn seeded_store(table_name: &TableName) -> MemoryTableStore {
    let store = MemoryTableStore::new();
    store
        .create_table(customers_schema(table_name.clone()))
        .await
        .unwrap();
    store
        .insert_rows(table_name, vec![customer(1, "ada", 5), customer(2, "bob", 5)])
        .await
        .unwrap();
    store
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_commit_leaves_table_untouched() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BEFORE_COMMIT, "return")]);
    let table_name = test_table_name("customers");
    let store = TestStoreWrapper::wrap(seeded_store(&table_name).await);

    let err = Merger::new(store.clone(), key_columns(), LAST_UPDATED)
        .unwrap()
        .merge(
            &customers(&[(1, "ada-2", 6), (3, "cy", 1)]),
            &table_name,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreError);
    assert_eq!(store.commit_merge_calls().await, 0);
    assert_table_rows(
        store.wrapped_store(),
        &table_name,
        &key_columns(),
        &[customer(1, "ada", 5), customer(2, "bob", 5)],
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_inside_store_commit_applies_nothing() {
    init_test_tracing();
    let _scenario =
        CustomFailScenario::setup(&[(MEMORY_STORE_BEFORE_APPLY, "return(merge_conflict)")]);
    let table_name = test_table_name("customers");
    let store = seeded_store(&table_name).await;
    let version = store.version(&table_name).await;

    let err = Merger::new(store.clone(), key_columns(), LAST_UPDATED)
        .unwrap()
        .merge(
            &customers(&[(1, "ada-2", 6), (2, "bob-2", 7), (3, "cy", 1)]),
            &table_name,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MergeConflict);
    assert_eq!(store.version(&table_name).await, version);
    assert_table_rows(
        &store,
        &table_name,
        &key_columns(),
        &[customer(1, "ada", 5), customer(2, "bob", 5)],
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn resubmitted_batch_succeeds_after_transient_failure() {
    init_test_tracing();
    // Fails the first evaluation only.
    let scenario = CustomFailScenario::setup(&[(MERGE_BEFORE_COMMIT, "1*return(io)")]);
    let table_name = test_table_name("customers");
    let store = seeded_store(&table_name).await;
    let merger = Merger::new(store.clone(), key_columns(), LAST_UPDATED).unwrap();
    let batch = customers(&[(1, "ada-2", 6)]);

    let err = merger.merge(&batch, &table_name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoError);
    assert!(err.kind().is_transient());

    let outcome = merger.merge(&batch, &table_name).await.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_table_rows(
        &store,
        &table_name,
        &key_columns(),
        &[customer(1, "ada-2", 6), customer(2, "bob", 5)],
    )
    .await;

    scenario.teardown();
}
