// src/render/mod.rs
//! URL to PDF rendering through a remote-controlled browser

pub mod channel;
pub mod devtools;
pub mod error;
pub mod pipeline;

pub use channel::{BrowserChannel, BrowserSession};
pub use devtools::DevToolsChannel;
pub use error::{RenderError, RenderFailure};
pub use pipeline::{RenderPipeline, RenderReport};

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_USER_AGENT: &str = "WebScraper 1.0";
pub const DEFAULT_READY_SELECTOR: &str = "body";
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// One execution of the render pipeline for a single target URL.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: Uuid,
    pub url: Url,
    pub selector: String,
    pub ready_timeout: Duration,
    pub user_agent: String,
}

impl RenderJob {
    /// Only absolute `http`/`https` URLs are accepted.
    pub fn new(target: &str) -> Result<Self, RenderError> {
        let target = target.trim();
        let url = Url::parse(target).map_err(|e| RenderError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RenderError::InvalidTarget {
                target: target.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            url,
            selector: DEFAULT_READY_SELECTOR.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Pipeline states. `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderState {
    Created,
    Announced,
    Navigated,
    Ready,
    Captured,
    Done,
    Failed,
}

impl RenderState {
    /// Next state on success. Terminal states map to themselves.
    pub fn successor(self) -> RenderState {
        match self {
            RenderState::Created => RenderState::Announced,
            RenderState::Announced => RenderState::Navigated,
            RenderState::Navigated => RenderState::Ready,
            RenderState::Ready => RenderState::Captured,
            RenderState::Captured => RenderState::Done,
            RenderState::Done => RenderState::Done,
            RenderState::Failed => RenderState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderState::Created => "created",
            RenderState::Announced => "announced",
            RenderState::Navigated => "navigated",
            RenderState::Ready => "ready",
            RenderState::Captured => "captured",
            RenderState::Done => "done",
            RenderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_job_defaults() {
        let job = RenderJob::new("https://www.wikipedia.org").unwrap();
        assert_eq!(job.selector, "body");
        assert_eq!(job.user_agent, "WebScraper 1.0");
        assert_eq!(job.ready_timeout, Duration::from_secs(10));
        assert_eq!(job.url.host_str(), Some("www.wikipedia.org"));
    }

    #[test]
    fn test_render_job_builders() {
        let job = RenderJob::new(" http://localhost:8080/page ")
            .unwrap()
            .with_selector("footer")
            .with_ready_timeout(Duration::from_millis(250))
            .with_user_agent("Agent/2");
        assert_eq!(job.selector, "footer");
        assert_eq!(job.ready_timeout, Duration::from_millis(250));
        assert_eq!(job.user_agent, "Agent/2");
    }

    #[test]
    fn test_render_job_rejects_bad_targets() {
        assert!(matches!(
            RenderJob::new("not a url"),
            Err(RenderError::InvalidTarget { .. })
        ));
        assert!(matches!(
            RenderJob::new("file:///etc/passwd"),
            Err(RenderError::InvalidTarget { .. })
        ));
        assert!(RenderJob::new("").is_err());
    }

    #[test]
    fn test_state_order() {
        let mut state = RenderState::Created;
        let mut visited = vec![state];
        while !state.is_terminal() {
            state = state.successor();
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                RenderState::Created,
                RenderState::Announced,
                RenderState::Navigated,
                RenderState::Ready,
                RenderState::Captured,
                RenderState::Done,
            ]
        );
        assert_eq!(RenderState::Failed.successor(), RenderState::Failed);
    }
}
