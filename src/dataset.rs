// 📦 Dataset - one import batch
//
// Records in file order. No sorting, no deduplication: the register does
// not promise chronological order per number, and repeated numbers are
// handed to the reconciliation engine unchanged.

use crate::entities::{InstitutionRecord, InstitutionType};
use crate::error::Result;
use crate::parser::{decode_line, Decoded};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Ordered, append-only batch of applicable records
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<InstitutionRecord>,
    skipped: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Decode every line and collect the applicable records
    ///
    /// Fails on the first malformed line; no partial dataset escapes.
    /// Line numbers are 1-based.
    pub fn build<I, S>(lines: I) -> Result<Dataset>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dataset = Dataset::new();

        for (index, line) in lines.into_iter().enumerate() {
            match decode_line(line.as_ref(), index + 1)? {
                Decoded::Record(record) => dataset.push(record),
                Decoded::Skip(_) => dataset.skipped += 1,
            }
        }

        debug!(
            records = dataset.len(),
            skipped = dataset.skipped,
            "dataset built"
        );

        Ok(dataset)
    }

    pub fn push(&mut self, record: InstitutionRecord) {
        self.records.push(record);
    }

    /// Number of applicable records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lines that decoded to a skip (legacy layout or blank code)
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn records(&self) -> &[InstitutionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstitutionRecord> {
        self.records.iter()
    }

    pub fn count_by_type(&self, kind: InstitutionType) -> usize {
        self.records.iter().filter(|r| r.kind() == kind).count()
    }

    // ========================================================================
    // DERIVED VIEWS
    // ========================================================================

    /// Legacy view keyed by number alone: the last record in file order wins
    ///
    /// This is what the current table ends up holding after reconciliation,
    /// even when an earlier line has a later validity window.
    pub fn current_by_identifier(&self) -> HashMap<&str, &InstitutionRecord> {
        let mut current = HashMap::new();
        for record in &self.records {
            current.insert(record.identifier(), record);
        }
        current
    }

    /// Composite view keyed by (number, valid_from): every window kept
    pub fn by_composite_key(&self) -> HashMap<(&str, DateTime<Utc>), &InstitutionRecord> {
        let mut windows = HashMap::new();
        for record in &self.records {
            windows.insert((record.identifier(), record.valid_from()), record);
        }
        windows
    }

    /// Per number, the record whose window starts latest
    pub fn latest_validity_by_identifier(&self) -> HashMap<&str, &InstitutionRecord> {
        let mut latest: HashMap<&str, &InstitutionRecord> = HashMap::new();
        for record in &self.records {
            latest
                .entry(record.identifier())
                .and_modify(|existing| {
                    if record.valid_from() > existing.valid_from() {
                        *existing = record;
                    }
                })
                .or_insert(record);
        }
        latest
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a InstitutionRecord;
    type IntoIter = std::slice::Iter<'a, InstitutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
