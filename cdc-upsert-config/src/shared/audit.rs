use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings for stamping merged records with their processing time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// Whether records are stamped before being merged.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Column receiving the processing timestamp.
    #[serde(default = "default_audit_column")]
    pub column: String,
}

impl AuditConfig {
    /// Default column name for the processing timestamp.
    pub const DEFAULT_COLUMN: &'static str = "process_timestamp";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.column.trim().is_empty() {
            return Err(ValidationError::BlankName("audit.column"));
        }

        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            column: default_audit_column(),
        }
    }
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_column() -> String {
    AuditConfig::DEFAULT_COLUMN.to_string()
}
