use cdc_upsert::error::ErrorKind;
use cdc_upsert::merge::{MergeOutcome, Merger};
use cdc_upsert::store::TableStore;
use cdc_upsert::store::memory::MemoryTableStore;
use cdc_upsert::test_utils::records::{
    LAST_UPDATED, customer, customers, customers_schema, key_columns, test_table_name,
};
use cdc_upsert::test_utils::store_wrapper::TestStoreWrapper;
use cdc_upsert::test_utils::table::{assert_table_rows, table_rows};
use cdc_upsert::types::{Batch, ColumnSchema, Record, TableName, TableSchema, ValueType};
use cdc_upsert_telemetry::tracing::init_test_tracing;

async fn customers_store(table_name: &TableName, rows: Vec<Record>) -> MemoryTableStore {
    let store = MemoryTableStore::new();
    store
        .create_table(customers_schema(table_name.clone()))
        .await
        .unwrap();
    if !rows.is_empty() {
        store.insert_rows(table_name, rows).await.unwrap();
    }

    store
}

fn customers_merger<S: TableStore>(store: S) -> Merger<S> {
    Merger::new(store, key_columns(), LAST_UPDATED).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn older_record_is_skipped_and_new_key_inserted() {
    init_test_tracing();
    let table_name = TableName::new("silver", "events");
    let store = MemoryTableStore::new();
    store
        .create_table(TableSchema::new(
            table_name.clone(),
            vec![
                ColumnSchema::new("id", ValueType::I64, false),
                ColumnSchema::new("v", ValueType::String, true),
                ColumnSchema::new("ts", ValueType::I64, false),
            ],
        ))
        .await
        .unwrap();
    let row = |id: i64, v: &str, ts: i64| Record::new().with("id", id).with("v", v).with("ts", ts);
    store
        .insert_rows(&table_name, vec![row(1, "z", 25)])
        .await
        .unwrap();

    let batch = Batch::new(vec![row(1, "b", 20), row(2, "c", 5)]);
    let outcome = Merger::new(store.clone(), vec!["id".to_string()], "ts")
        .unwrap()
        .merge(&batch, &table_name)
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
    assert_eq!(
        store.table_rows(&table_name).await.unwrap(),
        vec![row(1, "z", 25), row(2, "c", 5)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_records_replace_all_fields() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name, vec![customer(1, "ada", 5)]).await;

    let updated = Record::new()
        .with("customer_id", 1i64)
        .with("name", "ada lovelace")
        .with(LAST_UPDATED, cdc_upsert::test_utils::records::ts(9));
    let outcome = customers_merger(store.clone())
        .merge(&Batch::new(vec![updated.clone()]), &table_name)
        .await
        .unwrap();

    assert_eq!(outcome.updated, 1);
    // The email column was absent from the incoming record and is cleared.
    assert_table_rows(&store, &table_name, &key_columns(), &[updated]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn replaying_a_batch_leaves_the_table_unchanged() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name, vec![customer(1, "ada", 5), customer(4, "dan", 1)]).await;
    let batch = customers(&[(1, "ada-2", 6), (2, "bob", 1), (3, "cy", 1)]);
    let merger = customers_merger(store.clone());

    let first = merger.merge(&batch, &table_name).await.unwrap();
    let after_first = table_rows(&store, &table_name).await;
    let second = merger.merge(&batch, &table_name).await.unwrap();
    let after_second = table_rows(&store, &table_name).await;

    assert_eq!(
        first,
        MergeOutcome {
            inserted: 2,
            updated: 1,
            skipped: 0
        }
    );
    // Equal recency updates again, which rewrites identical rows.
    assert_eq!(
        second,
        MergeOutcome {
            inserted: 0,
            updated: 3,
            skipped: 0
        }
    );
    assert_eq!(after_first, after_second);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_changes_are_committed_once() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = TestStoreWrapper::wrap(
        customers_store(&table_name, vec![customer(1, "ada", 5), customer(2, "bob", 9)]).await,
    );
    let batch = customers(&[(1, "ada-2", 6), (2, "bob-old", 1), (3, "cy", 1), (4, "dan", 1)]);

    let outcome = customers_merger(store.clone())
        .merge(&batch, &table_name)
        .await
        .unwrap();

    assert_eq!(outcome.total(), batch.len() as u64);
    assert_eq!(store.table_schema_calls().await, 1);
    assert_eq!(store.lookup_rows_calls().await, 1);
    assert_eq!(store.commit_merge_calls().await, 1);

    let changes = store.committed_changes().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].updates.len(), 1);
    assert_eq!(changes[0].inserts.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_of_only_older_records_commits_nothing() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = TestStoreWrapper::wrap(customers_store(&table_name, vec![customer(1, "ada", 5)]).await);

    let outcome = customers_merger(store.clone())
        .merge(&customers(&[(1, "ada-old", 2)]), &table_name)
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 1);
    assert_eq!(store.commit_merge_calls().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commit_leaves_the_table_untouched() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let seeded = vec![customer(1, "ada", 5)];
    let store = TestStoreWrapper::wrap(customers_store(&table_name, seeded.clone()).await);
    store.fail_next_commit(ErrorKind::StoreError).await;

    let err = customers_merger(store.clone())
        .merge(&customers(&[(1, "ada-2", 6), (2, "bob", 1)]), &table_name)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreError);
    assert_table_rows(store.wrapped_store(), &table_name, &key_columns(), &seeded).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_merges_on_the_same_key_conflict() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name, vec![customer(1, "ada", 5)]).await;

    // Both merges read version 1; the second commit finds the row rewritten by the first.
    let snapshot = store
        .lookup_rows(&table_name, &key_columns(), &[])
        .await
        .unwrap();
    customers_merger(store.clone())
        .merge(&customers(&[(1, "ada-2", 6)]), &table_name)
        .await
        .unwrap();

    let err = store
        .commit_merge(
            &table_name,
            cdc_upsert::store::MergeChanges {
                base_version: snapshot.version,
                key_columns: key_columns(),
                updates: vec![customer(1, "ada-3", 7)],
                inserts: vec![],
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MergeConflict);
    assert!(err.kind().is_transient());
    assert_table_rows(&store, &table_name, &key_columns(), &[customer(1, "ada-2", 6)]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_merges_on_disjoint_keys_both_apply() {
    init_test_tracing();
    let table_name = test_table_name("customers");
    let store = customers_store(&table_name, vec![]).await;

    let left = customers_merger(store.clone());
    let right = customers_merger(store.clone());
    let left_batch = customers(&[(1, "ada", 1), (2, "bob", 1)]);
    let right_batch = customers(&[(3, "cy", 1), (4, "dan", 1)]);

    let (left_outcome, right_outcome) = tokio::join!(
        left.merge(&left_batch, &table_name),
        right.merge(&right_batch, &table_name)
    );

    assert_eq!(left_outcome.unwrap().inserted, 2);
    assert_eq!(right_outcome.unwrap().inserted, 2);
    assert_eq!(table_rows(&store, &table_name).await.len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_into_a_missing_table_fails() {
    init_test_tracing();
    let store = MemoryTableStore::new();

    let err = customers_merger(store)
        .merge(&customers(&[(1, "ada", 1)]), &test_table_name("missing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TargetNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn incomparable_existing_recency_fails_without_changes() {
    init_test_tracing();
    let table_name = TableName::new("silver", "loose");
    let store = MemoryTableStore::new();
    store
        .create_table(TableSchema::new(
            table_name.clone(),
            vec![
                ColumnSchema::new("id", ValueType::I64, false),
                ColumnSchema::new("ts", ValueType::I64, true),
            ],
        ))
        .await
        .unwrap();
    let existing = Record::new().with("id", 1i64).with("ts", cdc_upsert::types::Value::Null);
    store
        .insert_rows(&table_name, vec![existing.clone()])
        .await
        .unwrap();

    let batch = Batch::new(vec![
        Record::new().with("id", 1i64).with("ts", 3i64),
        Record::new().with("id", 2i64).with("ts", 3i64),
    ]);
    let err = Merger::new(store.clone(), vec!["id".to_string()], "ts")
        .unwrap()
        .merge(&batch, &table_name)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ComparisonError);
    assert_eq!(store.table_rows(&table_name).await.unwrap(), vec![existing]);
}

#[tokio::test(flavor = "multi_thread")]
async fn narrow_seeded_key_matches_wide_incoming_key() {
    init_test_tracing();
    let table_name = test_table_name("widths");
    let store = MemoryTableStore::new();
    store
        .create_table(TableSchema::new(
            table_name.clone(),
            vec![
                ColumnSchema::new("id", ValueType::I64, false),
                ColumnSchema::new("ts", ValueType::I64, false),
            ],
        ))
        .await
        .unwrap();
    store
        .insert_rows(&table_name, vec![Record::new().with("id", 1i32).with("ts", 99i64)])
        .await
        .unwrap();

    let batch = Batch::new(vec![Record::new().with("id", 1i64).with("ts", 5i64)]);
    let outcome = Merger::new(store.clone(), vec!["id".to_string()], "ts")
        .unwrap()
        .merge(&batch, &table_name)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        MergeOutcome {
            inserted: 0,
            updated: 0,
            skipped: 1
        }
    );
    assert_eq!(
        store.table_rows(&table_name).await.unwrap(),
        vec![Record::new().with("id", 1i64).with("ts", 99i64)]
    );
}
