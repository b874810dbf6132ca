// src/render/error.rs
use super::RenderState;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid render target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("browser channel unavailable: {0}")]
    Channel(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("selector {selector:?} not visible within {timeout:?}")]
    ReadyTimeout { selector: String, timeout: Duration },
    #[error("page capture failed: {0}")]
    Capture(String),
}

impl RenderError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RenderError::InvalidTarget { .. } => "INVALID_TARGET",
            RenderError::Channel(_) => "BROWSER_UNAVAILABLE",
            RenderError::Protocol(_) => "BROWSER_PROTOCOL_ERROR",
            RenderError::Navigation { .. } => "NAVIGATION_FAILED",
            RenderError::ReadyTimeout { .. } => "READY_TIMEOUT",
            RenderError::Capture(_) => "CAPTURE_FAILED",
        }
    }
}

/// A render job that ended in `Failed`.
#[derive(Debug, Error)]
#[error("render job {job_id} for {url} failed in state {failed_in}: {error}")]
pub struct RenderFailure {
    pub job_id: Uuid,
    pub url: String,
    pub failed_in: RenderState,
    pub visited: Vec<RenderState>,
    #[source]
    pub error: RenderError,
}
