// src/render/pipeline.rs
//! Announce -> Navigate -> AwaitReady -> Capture, one browser session per job

use super::channel::{BrowserChannel, BrowserSession};
use super::error::{RenderError, RenderFailure};
use super::{RenderJob, RenderState};
use crate::utils::format_elapsed;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a job that reached `Done`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub job_id: Uuid,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub visited: Vec<RenderState>,
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

/// Tracks the state machine of one job; states can only move forward one step at a time.
#[derive(Debug)]
struct Progress {
    job_id: Uuid,
    state: RenderState,
    visited: Vec<RenderState>,
}

impl Progress {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            state: RenderState::Created,
            visited: vec![RenderState::Created],
        }
    }

    fn advance(&mut self) {
        debug_assert!(!self.state.is_terminal());
        let next = self.state.successor();
        debug!(job_id = %self.job_id, from = %self.state, to = %next, "Render state transition");
        self.state = next;
        self.visited.push(next);
    }

    fn fail(mut self, job: &RenderJob, error: RenderError) -> RenderFailure {
        let failed_in = self.state;
        self.visited.push(RenderState::Failed);
        error!(
            job_id = %job.id,
            url = %job.url,
            state = %failed_in,
            "Render job failed: {}",
            error
        );
        RenderFailure {
            job_id: job.id,
            url: job.url.to_string(),
            failed_in,
            visited: self.visited,
            error,
        }
    }
}

#[derive(Clone)]
pub struct RenderPipeline {
    channel: Arc<dyn BrowserChannel>,
}

impl RenderPipeline {
    pub fn new(channel: Arc<dyn BrowserChannel>) -> Self {
        Self { channel }
    }

    /// Run `job` to completion. The session is always closed once it was opened.
    pub async fn run(&self, job: &RenderJob) -> Result<RenderReport, RenderFailure> {
        let mut progress = Progress::new(job.id);
        let started_at = Utc::now();
        info!(job_id = %job.id, url = %job.url, "Starting render job");

        let mut session = match self.channel.open_session().await {
            Ok(session) => session,
            Err(error) => return Err(progress.fail(job, error)),
        };

        let clock = Instant::now();
        let outcome = drive(session.as_mut(), job, &mut progress).await;
        let elapsed = clock.elapsed();

        if let Err(e) = session.close().await {
            warn!(job_id = %job.id, "Failed to close browser session: {}", e);
        }

        match outcome {
            Ok(pdf) => {
                progress.advance();
                info!(
                    job_id = %job.id,
                    url = %job.url,
                    pdf_size = pdf.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Took: {}",
                    format_elapsed(elapsed)
                );
                Ok(RenderReport {
                    job_id: job.id,
                    url: job.url.to_string(),
                    started_at,
                    elapsed,
                    visited: progress.visited,
                    pdf,
                })
            }
            Err(error) => Err(progress.fail(job, error)),
        }
    }
}

async fn drive(
    session: &mut dyn BrowserSession,
    job: &RenderJob,
    progress: &mut Progress,
) -> Result<Vec<u8>, RenderError> {
    // The user agent has to be in place before the first request leaves the browser.
    session.set_user_agent(&job.user_agent).await?;
    progress.advance();

    session.navigate(job.url.as_str()).await?;
    progress.advance();

    match tokio::time::timeout(job.ready_timeout, session.wait_visible(&job.selector)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(RenderError::ReadyTimeout {
                selector: job.selector.clone(),
                timeout: job.ready_timeout,
            })
        }
    }
    progress.advance();

    let pdf = session.print_to_pdf(true).await?;
    progress.advance();

    Ok(pdf)
}
