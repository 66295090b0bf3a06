//! Composite key identifying the entity a record describes.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Record, Value};

/// Ordered tuple of a record's key field values.
///
/// Keys compare component by component, so `("1", "23")` and `("12", "3")` are different keys.
/// Integer components compare by value regardless of width, so `I32(1)` and `I64(1)` are the
/// same key component. Floating point components compare by bit pattern, which keeps equality
/// reflexive for `NaN` and consistent with [`Hash`].
#[derive(Debug, Clone)]
pub struct CompositeKey {
    values: Vec<Value>,
}

impl CompositeKey {
    /// Creates a key from already extracted values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Extracts the key of `record` for the given key columns, in column order.
    ///
    /// Fails with [`ErrorKind::SchemaError`] when a key field is absent or null.
    pub fn from_record(record: &Record, key_columns: &[String]) -> EtlResult<Self> {
        let mut values = Vec::with_capacity(key_columns.len());

        for column in key_columns {
            match record.get(column) {
                None => bail!(
                    ErrorKind::SchemaError,
                    "Key field missing from record",
                    format!("record has no key field `{column}`")
                ),
                Some(Value::Null) => bail!(
                    ErrorKind::SchemaError,
                    "Key field is null",
                    format!("key field `{column}` is null")
                ),
                Some(value) => values.push(value.clone()),
            }
        }

        Ok(Self { values })
    }

    /// Returns the key components in key column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Maps the key to one of `partitions` buckets.
    ///
    /// Equal keys map to the same bucket within a build. The bucket assignment is not meant to
    /// be persisted, since the hashing algorithm may change between Rust releases.
    pub fn partition(&self, partitions: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);

        (hasher.finish() % partitions.max(1) as u64) as usize
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| value_key_eq(a, b))
    }
}

impl Eq for CompositeKey {}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.len().hash(state);
        for value in &self.values {
            value_hash(value, state);
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

fn value_key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
        (Value::I32(a), Value::I64(b)) | (Value::I64(b), Value::I32(a)) => i64::from(*a) == *b,
        _ => a == b,
    }
}

fn value_hash<H: Hasher>(value: &Value, state: &mut H) {
    // Both integer widths hash as `I64` to stay consistent with `value_key_eq`.
    if let Value::I32(v) = value {
        return value_hash(&Value::I64(i64::from(*v)), state);
    }

    std::mem::discriminant(value).hash(state);

    match value {
        Value::Null | Value::I32(_) => {}
        Value::Bool(v) => v.hash(state),
        Value::I64(v) => v.hash(state),
        Value::F64(v) => v.to_bits().hash(state),
        Value::String(v) => v.hash(state),
        Value::Bytes(v) => v.hash(state),
        Value::Date(v) => v.hash(state),
        Value::Time(v) => v.hash(state),
        Value::Timestamp(v) => v.hash(state),
        Value::TimestampTz(v) => v.hash(state),
        Value::Uuid(v) => v.hash(state),
        Value::Json(v) => v.to_string().hash(state),
    }
}
