use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Policy choosing the surviving record when several records share both the composite key and
/// the maximum recency value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The record appearing first in the incoming batch wins.
    #[default]
    FirstSeen,
    /// The record appearing last in the incoming batch wins.
    LastSeen,
    /// The record with the greatest value in the named column wins; remaining ties fall back to
    /// [`TieBreak::FirstSeen`].
    Column(String),
}

/// Deduplication settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DedupConfig {
    /// Number of hash partitions records are spread over before per-key selection.
    #[serde(default = "default_dedup_partitions")]
    pub partitions: usize,
    /// Resolution of exact recency ties.
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl DedupConfig {
    /// Default number of hash partitions.
    pub const DEFAULT_PARTITIONS: usize = 16;

    /// Validates deduplication settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partitions == 0 {
            return Err(ValidationError::DedupPartitionsZero);
        }

        if let TieBreak::Column(column) = &self.tie_break
            && column.trim().is_empty()
        {
            return Err(ValidationError::BlankName("dedup.tie_break.column"));
        }

        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            partitions: default_dedup_partitions(),
            tie_break: TieBreak::default(),
        }
    }
}

fn default_dedup_partitions() -> usize {
    DedupConfig::DEFAULT_PARTITIONS
}
