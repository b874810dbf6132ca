// src/query/engine.rs
//! Side-effect-free resolution of the two root operations over a dataset snapshot

use crate::dataset::JobRecord;

/// Borrowing view over one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    snapshot: &'a [JobRecord],
}

impl<'a> QueryEngine<'a> {
    pub fn new(snapshot: &'a [JobRecord]) -> Self {
        Self { snapshot }
    }

    /// Every record, in snapshot order.
    pub fn list_all(&self) -> &'a [JobRecord] {
        self.snapshot
    }

    /// First record whose identifier equals `id`. Duplicate ids resolve to the earliest.
    pub fn get_by_id(&self, id: i64) -> Option<&'a JobRecord> {
        self.snapshot.iter().find(|job| job.id == id)
    }
}
