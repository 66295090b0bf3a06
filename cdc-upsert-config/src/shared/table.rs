use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Fully qualified name of the table a pipeline merges into.
///
/// The namespace is always given explicitly so that the same pipeline code can target
/// different catalogs or layers without rebuilding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TargetTableConfig {
    /// Namespace (schema, database or catalog layer) containing the table.
    pub namespace: String,
    /// Name of the table within the namespace.
    pub name: String,
}

impl TargetTableConfig {
    /// Validates that both parts of the name are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::BlankName("table.namespace"));
        }

        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName("table.name"));
        }

        Ok(())
    }
}
