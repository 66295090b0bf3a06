use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Batch, ColumnSchema, Record, TableName, TableSchema, ValueType};

/// Key column of the customers test table.
pub const CUSTOMER_ID: &str = "customer_id";
/// Recency column of the customers test table.
pub const LAST_UPDATED: &str = "last_updated_timestamp";
/// Audit column of the customers test table.
pub const PROCESS_TIMESTAMP: &str = "process_timestamp";

/// Returns a table name unique to the calling test.
pub fn test_table_name(name: &str) -> TableName {
    TableName::new("test", format!("{name}_{}", Uuid::new_v4().simple()))
}

/// Schema of the customers test table: `customer_id`, `name`, `email`, `last_updated_timestamp`
/// and a nullable `process_timestamp`.
pub fn customers_schema(table_name: TableName) -> TableSchema {
    TableSchema::new(
        table_name,
        vec![
            ColumnSchema::new(CUSTOMER_ID, ValueType::I64, false),
            ColumnSchema::new("name", ValueType::String, false),
            ColumnSchema::new("email", ValueType::String, true),
            ColumnSchema::new(LAST_UPDATED, ValueType::TimestampTz, false),
            ColumnSchema::new(PROCESS_TIMESTAMP, ValueType::TimestampTz, true),
        ],
    )
}

/// Returns the instant `seconds` after a fixed epoch.
pub fn ts(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
}

/// Builds a customer change record updated at [`ts`]`(updated_at)`.
pub fn customer(id: i64, name: &str, updated_at: i64) -> Record {
    Record::new()
        .with(CUSTOMER_ID, id)
        .with("name", name)
        .with("email", format!("{name}@example.com"))
        .with(LAST_UPDATED, ts(updated_at))
}

/// Builds a batch of customer records from `(id, name, updated_at)` triples.
pub fn customers(rows: &[(i64, &str, i64)]) -> Batch {
    rows.iter()
        .map(|(id, name, updated_at)| customer(*id, name, *updated_at))
        .collect()
}

pub fn key_columns() -> Vec<String> {
    vec![CUSTOMER_ID.to_string()]
}
