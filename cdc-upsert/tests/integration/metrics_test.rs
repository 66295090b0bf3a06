use cdc_upsert::merge::Merger;
use cdc_upsert::metrics::{CDC_MERGE_ROWS_TOTAL, register_metrics};
use cdc_upsert::store::memory::MemoryTableStore;
use cdc_upsert::test_utils::records::{
    LAST_UPDATED, customers, customers_schema, key_columns, test_table_name,
};
use cdc_upsert_telemetry::metrics::init_metrics_handle;
use cdc_upsert_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn merge_outcomes_are_exported_per_table() {
    init_test_tracing();
    let handle = init_metrics_handle(Some("metrics-test")).unwrap();
    register_metrics();

    let table_name = test_table_name("customers");
    let store = MemoryTableStore::new();
    store
        .create_table(customers_schema(table_name.clone()))
        .await
        .unwrap();

    Merger::new(store, key_columns(), LAST_UPDATED)
        .unwrap()
        .merge(&customers(&[(1, "ada", 1), (2, "bob", 1)]), &table_name)
        .await
        .unwrap();

    let rendered = handle.render();
    let inserted_line = rendered
        .lines()
        .find(|line| {
            line.starts_with(CDC_MERGE_ROWS_TOTAL)
                && line.contains(&table_name.to_string())
                && line.contains("outcome=\"inserted\"")
        })
        .expect("merge rows metric is rendered");

    assert!(inserted_line.ends_with(" 2"));
    assert!(inserted_line.contains("pipeline=\"metrics-test\""));
}
