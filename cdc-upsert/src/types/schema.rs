use std::fmt;

use cdc_upsert_config::shared::TargetTableConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, EtlError};
use crate::etl_error;
use crate::types::{Record, Value, ValueType};

/// A fully qualified target table name consisting of a namespace and a table name.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// The namespace (catalog and schema) containing the table.
    pub namespace: String,
    /// The name of the table within the namespace.
    pub name: String,
}

impl TableName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl From<&TargetTableConfig> for TableName {
    fn from(config: &TargetTableConfig) -> Self {
        Self::new(config.namespace.clone(), config.name.clone())
    }
}

/// Schema of a single target table column.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    /// The name of the column.
    pub name: String,
    /// The type of values stored in the column.
    pub typ: ValueType,
    /// Whether the column can contain null values.
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ValueType, nullable: bool) -> ColumnSchema {
        Self {
            name: name.into(),
            typ,
            nullable,
        }
    }

    /// Converts `value` to the representation stored in this column.
    ///
    /// Integers are widened or narrowed between `I32` and `I64` when the value fits. Returns
    /// [`None`] when the value cannot be stored, including null in a non-nullable column.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self.typ, value) {
            (_, Value::Null) => self.nullable.then_some(Value::Null),
            (ValueType::I64, Value::I32(v)) => Some(Value::I64(i64::from(*v))),
            (ValueType::I32, Value::I64(v)) => i32::try_from(*v).ok().map(Value::I32),
            (typ, value) if value.value_type() == Some(typ) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Schema of a target table: its name and its columns in storage order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>) -> Self {
        Self {
            name,
            column_schemas,
        }
    }

    /// Returns the schema of the column named `name`.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.column_schemas.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.column_schemas.iter().map(|column| column.name.as_str())
    }

    /// Conforms `record` to this schema.
    ///
    /// The returned record holds every column in storage order with its value coerced through
    /// [`ColumnSchema::coerce`]; absent columns are filled with null. Unknown fields, type
    /// mismatches and nulls in non-nullable columns are all reported.
    pub fn conform(&self, record: &Record) -> Result<Record, Vec<EtlError>> {
        let mut errors = Vec::new();

        for name in record.field_names() {
            if !self.has_column(name) {
                errors.push(etl_error!(
                    ErrorKind::SchemaError,
                    "Unknown column in record",
                    format!("table {} has no column `{name}`", self.name)
                ));
            }
        }

        let mut conformed = Record::new();
        for column in &self.column_schemas {
            let value = record.get(&column.name).unwrap_or(&Value::Null);

            match column.coerce(value) {
                Some(value) => {
                    conformed.set(column.name.clone(), value);
                }
                None if value.is_null() => errors.push(etl_error!(
                    ErrorKind::SchemaError,
                    "Null value in non-nullable column",
                    format!("column `{}` of table {} is not nullable", column.name, self.name)
                )),
                None => errors.push(etl_error!(
                    ErrorKind::SchemaError,
                    "Value does not match column type",
                    format!(
                        "value {value} cannot be stored in column `{}` of type {}",
                        column.name, column.typ
                    )
                )),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(conformed)
    }
}
