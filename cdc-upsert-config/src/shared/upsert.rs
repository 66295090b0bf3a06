use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{AuditConfig, DedupConfig, TargetTableConfig, ValidationError};

/// Configuration of one deduplicate-then-merge pipeline.
///
/// Owned by the pipeline driver and passed to the core as plain parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct UpsertConfig {
    /// Table the deduplicated batches are merged into.
    pub table: TargetTableConfig,
    /// Ordered list of columns forming the composite key.
    pub key_columns: Vec<String>,
    /// Column whose value decides which version of an entity is the latest.
    pub recency_column: String,
    /// Deduplication settings.
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Processing timestamp settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl UpsertConfig {
    /// Validates the full configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.table.validate()?;

        if self.key_columns.is_empty() {
            return Err(ValidationError::KeyColumnsEmpty);
        }

        let mut seen = HashSet::with_capacity(self.key_columns.len());
        for column in &self.key_columns {
            if column.trim().is_empty() {
                return Err(ValidationError::BlankName("key_columns"));
            }

            if !seen.insert(column.as_str()) {
                return Err(ValidationError::DuplicateKeyColumn(column.clone()));
            }
        }

        if self.recency_column.trim().is_empty() {
            return Err(ValidationError::BlankName("recency_column"));
        }

        if seen.contains(self.recency_column.as_str()) {
            return Err(ValidationError::RecencyColumnIsKey(
                self.recency_column.clone(),
            ));
        }

        self.dedup.validate()?;
        self.audit.validate()?;

        if self.audit.enabled
            && (seen.contains(self.audit.column.as_str())
                || self.audit.column == self.recency_column)
        {
            return Err(ValidationError::AuditColumnCollision(
                self.audit.column.clone(),
            ));
        }

        Ok(())
    }
}

impl Config for UpsertConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["key_columns"];
}
