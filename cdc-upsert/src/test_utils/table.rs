use std::collections::HashMap;

use crate::store::memory::MemoryTableStore;
use crate::types::{CompositeKey, Record, TableName, Value};

/// Fields of a record sorted by name, without null fields.
pub type NormalizedRecord = Vec<(String, Value)>;

/// Normalizes a record so that field order and absent nullable columns do not matter.
pub fn normalize(record: &Record) -> NormalizedRecord {
    let mut fields: NormalizedRecord = record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    fields
}

/// Indexes normalized rows by their key over `key_columns`, panicking on unkeyed or repeated
/// rows.
pub fn rows_by_key(
    rows: &[Record],
    key_columns: &[String],
) -> HashMap<CompositeKey, NormalizedRecord> {
    let mut by_key = HashMap::with_capacity(rows.len());
    for row in rows {
        let key = CompositeKey::from_record(row, key_columns).unwrap();
        let previous = by_key.insert(key.clone(), normalize(row));
        assert!(previous.is_none(), "rows hold key {key} more than once");
    }

    by_key
}

/// Returns the rows of `table_name`, panicking if the table does not exist.
pub async fn table_rows(store: &MemoryTableStore, table_name: &TableName) -> Vec<Record> {
    store
        .table_rows(table_name)
        .await
        .unwrap_or_else(|| panic!("table {table_name} does not exist"))
}

/// Asserts that `table_name` holds exactly `expected`, compared per key with [`normalize`].
pub async fn assert_table_rows(
    store: &MemoryTableStore,
    table_name: &TableName,
    key_columns: &[String],
    expected: &[Record],
) {
    let actual = rows_by_key(&table_rows(store, table_name).await, key_columns);
    let expected = rows_by_key(expected, key_columns);

    assert_eq!(actual, expected, "unexpected rows in table {table_name}");
}
