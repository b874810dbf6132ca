// src/render/channel.rs
//! Seam between the render pipeline and the remote browser

use super::RenderError;
use async_trait::async_trait;

/// Opens isolated browser sessions, one per render job.
#[async_trait]
pub trait BrowserChannel: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// A single browser tab. Every command resolves once the browser acknowledges it.
#[async_trait]
pub trait BrowserSession: Send {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), RenderError>;

    /// Resolves once the document has loaded, not when the navigation commits.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Resolves once `selector` matches a visible element. Unbounded; callers apply their own timeout.
    async fn wait_visible(&mut self, selector: &str) -> Result<(), RenderError>;

    async fn print_to_pdf(&mut self, print_background: bool) -> Result<Vec<u8>, RenderError>;

    /// Tears the session down. Safe to call more than once. Implementations release the
    /// browser target on drop when this was never called.
    async fn close(&mut self) -> Result<(), RenderError>;
}
