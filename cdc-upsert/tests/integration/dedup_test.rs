use cdc_upsert::dedup::{Deduplicator, deduplicate};
use cdc_upsert::error::ErrorKind;
use cdc_upsert::test_utils::records::{LAST_UPDATED, customer, customers, key_columns};
use cdc_upsert::types::{Batch, Record, Value};
use cdc_upsert_config::shared::{DedupConfig, TieBreak};
use cdc_upsert_telemetry::tracing::init_test_tracing;

#[test]
fn latest_record_wins_per_key() {
    init_test_tracing();

    let batch = Batch::new(vec![
        Record::new().with("id", 1i64).with("v", "a").with("ts", 10i64),
        Record::new().with("id", 1i64).with("v", "b").with("ts", 20i64),
        Record::new().with("id", 2i64).with("v", "c").with("ts", 5i64),
    ]);

    let result = deduplicate(&batch, &["id".to_string()], "ts").unwrap();

    assert_eq!(
        result,
        Batch::new(vec![
            Record::new().with("id", 1i64).with("v", "b").with("ts", 20i64),
            Record::new().with("id", 2i64).with("v", "c").with("ts", 5i64),
        ])
    );
}

#[test]
fn single_partition_matches_many_partitions() {
    init_test_tracing();

    let batch = customers(&[
        (1, "ada", 3),
        (2, "bob", 1),
        (1, "ada-2", 7),
        (3, "cy", 2),
        (2, "bob-2", 1),
        (3, "cy-2", 1),
    ]);

    let single = Deduplicator::new(key_columns(), LAST_UPDATED)
        .unwrap()
        .with_partitions(1)
        .deduplicate(&batch)
        .unwrap();
    let many = Deduplicator::new(key_columns(), LAST_UPDATED)
        .unwrap()
        .with_config(&DedupConfig {
            partitions: 64,
            tie_break: TieBreak::FirstSeen,
        })
        .deduplicate(&batch)
        .unwrap();

    assert_eq!(single, many);
    assert_eq!(
        single,
        Batch::new(vec![customer(1, "ada-2", 7), customer(2, "bob", 1), customer(3, "cy", 2)])
    );
}

#[test]
fn json_lines_input_is_deduplicated() {
    init_test_tracing();

    let input = r#"{"id": 7, "region": "eu", "ts": "2024-01-02"}
{"id": 7, "region": "us", "ts": "2024-01-01"}
{"id": 7, "region": "eu", "ts": "2024-01-03"}
"#;
    let batch = Batch::from_json_lines(input).unwrap();

    let result = deduplicate(&batch, &["id".to_string(), "region".to_string()], "ts").unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.records()[0].get("ts"), Some(&Value::from("2024-01-03")));
    assert_eq!(result.records()[1].get("region"), Some(&Value::from("us")));
}

#[test]
fn mixed_integer_widths_compare_numerically() {
    init_test_tracing();

    let batch = Batch::new(vec![
        Record::new().with("id", 1i64).with("ts", 10i32),
        Record::new().with("id", 1i64).with("ts", 9.5f64),
        Record::new().with("id", 1i64).with("ts", 11i64),
    ]);

    let result = deduplicate(&batch, &["id".to_string()], "ts").unwrap();

    assert_eq!(result.records()[0].get("ts"), Some(&Value::I64(11)));
}

#[test]
fn mixed_integer_width_keys_collapse_to_one_record() {
    init_test_tracing();

    let batch = Batch::new(vec![
        Record::new().with("id", 1i32).with("ts", 10i64),
        Record::new().with("id", 1i64).with("ts", 20i64),
        Record::new().with("id", 2i32).with("ts", 5i64),
    ]);

    let result = deduplicate(&batch, &["id".to_string()], "ts").unwrap();

    assert_eq!(
        result.records(),
        &[
            Record::new().with("id", 1i64).with("ts", 20i64),
            Record::new().with("id", 2i32).with("ts", 5i64),
        ]
    );
}

#[test]
fn missing_recency_field_is_schema_error() {
    init_test_tracing();

    let batch = Batch::new(vec![Record::new().with("customer_id", 1i64)]);

    let err = deduplicate(&batch, &key_columns(), LAST_UPDATED).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
}
