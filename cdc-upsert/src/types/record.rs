use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Value;

/// An ordered mapping from field names to values.
///
/// Field order is insertion order and names are unique: setting an existing field replaces its
/// value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets `name` to `value`, returning the previous value if the field existed.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();

        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Returns the value of `name`, failing with [`ErrorKind::SchemaError`] if it is absent.
    pub fn require(&self, name: &str) -> EtlResult<&Value> {
        match self.get(name) {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::SchemaError,
                "Field missing from record",
                format!("record has no field `{name}`")
            ),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Builds a record from a JSON object, preserving its key order.
    ///
    /// Values are converted with [`Value::from_json`].
    pub fn from_json(json: serde_json::Value) -> EtlResult<Self> {
        let serde_json::Value::Object(object) = json else {
            bail!(
                ErrorKind::DeserializationError,
                "Record is not a JSON object",
                format!("expected a JSON object, got `{json}`")
            );
        };

        Ok(object
            .into_iter()
            .map(|(name, value)| (name, Value::from_json(value)))
            .collect())
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }

        record
    }
}
