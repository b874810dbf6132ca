// src/dataset/mod.rs
//! Job postings and the snapshot sources they are loaded from

pub mod load;

pub use load::{JsonFileSnapshot, SnapshotError, SnapshotSource};

use serde::{Deserialize, Serialize};

/// A single job posting. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: i64,
    pub position: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub skills_required: Vec<String>,
    pub location: String,
    pub employment_type: String,
}
