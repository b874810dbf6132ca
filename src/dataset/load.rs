// src/dataset/load.rs
use super::JobRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to open dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Yields a fresh, read-only copy of the job dataset on every call.
pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<Vec<JobRecord>, SnapshotError>;
}

/// Dataset stored as a JSON array on disk, re-read on every load.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSnapshot {
    fn load(&self) -> Result<Vec<JobRecord>, SnapshotError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            warn!("Failed to open dataset {}: {}", self.path.display(), source);
            SnapshotError::Read {
                path: self.path.clone(),
                source,
            }
        })?;

        let jobs: Vec<JobRecord> = serde_json::from_str(&raw).map_err(|source| {
            warn!("Failed to parse dataset {}: {}", self.path.display(), source);
            SnapshotError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!(
            "Loaded {} job records from {}",
            jobs.len(),
            self.path.display()
        );
        Ok(jobs)
    }
}

/// Fixed in-memory dataset, handed out by clone.
impl SnapshotSource for Vec<JobRecord> {
    fn load(&self) -> Result<Vec<JobRecord>, SnapshotError> {
        Ok(self.clone())
    }
}
