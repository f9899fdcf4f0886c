//! Ordered, append-only index of acquired photo records.
//!
//! Insertion order is metadata arrival order. The presentation layer
//! addresses records most-recent-first ("slots"); the index itself never
//! reorders — the reversal is a view-level transform applied at lookup time.

use std::path::PathBuf;

use crate::types::PhotoRecord;

/// The acquired-record index. Exclusively owned and mutated by the
/// coordinator; at most one record per id.
#[derive(Debug, Default, Clone)]
pub struct PhotoIndex {
    records: Vec<PhotoRecord>,
}

impl PhotoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record. No-op if a record with the same id already exists;
    /// the existing record is left untouched.
    pub fn insert(&mut self, record: PhotoRecord) {
        if self.position_of(&record.id).is_none() {
            self.records.push(record);
        }
    }

    /// Bounds-checked lookup by arrival position.
    pub fn record_at(&self, position: usize) -> Option<&PhotoRecord> {
        self.records.get(position)
    }

    /// Linear lookup by identifier. Ids are unique, so the first match is
    /// well-defined.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Attach the local image path to the record with `id`. Returns `false`
    /// (no-op) when the record is absent.
    pub fn attach_local(&mut self, id: &str, path: PathBuf) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.local_path = Some(path);
                true
            }
            None => false,
        }
    }

    /// Remove the record with `id`. Returns `false` (no-op) when absent.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(position) => {
                self.records.remove(position);
                true
            }
            None => false,
        }
    }

    /// Translate a presentation slot (most-recent-first) into an arrival
    /// position. `None` when the slot is out of range.
    pub fn slot_to_position(&self, slot: usize) -> Option<usize> {
        if slot < self.records.len() {
            Some(self.records.len() - 1 - slot)
        } else {
            None
        }
    }

    /// Translate an arrival position into a presentation slot. Callers must
    /// not cache the result: positions shift as records are inserted or
    /// removed.
    pub fn position_to_slot(&self, position: usize) -> usize {
        self.records.len() - 1 - position
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
