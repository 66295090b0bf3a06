use std::io::BufRead;

use crate::error::{EtlError, EtlResult};
use crate::types::Record;

/// A finite collection of records.
///
/// Batches may be empty and may hold several records for the same key. Their order carries no
/// meaning, although operations of this crate keep it deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Parses newline-delimited JSON objects, one record per non-blank line.
    ///
    /// Every malformed line is reported, aggregated into a single error.
    pub fn from_json_lines(input: &str) -> EtlResult<Self> {
        Self::from_json_reader(input.as_bytes())
    }

    /// Reads newline-delimited JSON objects from `reader`.
    pub fn from_json_reader<R: BufRead>(reader: R) -> EtlResult<Self> {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(record) => records.push(record),
                Err(err) => errors.push(EtlError::from((
                    err.kind(),
                    "Invalid record line",
                    format!("line {}: {}", index + 1, err.detail().unwrap_or_default()),
                ))),
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(Self { records })
    }
}

fn parse_line(line: &str) -> EtlResult<Record> {
    let json: serde_json::Value = serde_json::from_str(line)?;
    Record::from_json(json)
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
