//! Collaborators that retrieve markup for the harvesting core.
//!
//! - [`Fetcher`]: one-shot retrieval of a [`SourceDescriptor`], used by the
//!   concurrent harvester. [`http::HttpFetcher`] is the production
//!   implementation.
//! - [`Viewport`]: a live, scrollable page used by the convergence
//!   controller. `browser::BrowserViewport` drives headless Chromium when the
//!   `browser` feature is enabled.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;

use crate::error::Result;
use crate::models::{Document, SourceDescriptor};

/// Fetches a source once and returns its markup.
pub trait Fetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Document>;
}

/// Scroll geometry of a live page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scroll_top: f64,
    pub view_height: f64,
    pub content_height: f64,
}

impl ViewportState {
    /// Largest meaningful `scroll_top`.
    pub fn max_scroll_top(&self) -> f64 {
        (self.content_height - self.view_height).max(0.0)
    }

    /// Whether the bottom of the view has reached the end of the content.
    pub fn at_bottom(&self, tolerance: f64) -> bool {
        self.scroll_top + self.view_height >= self.content_height - tolerance
    }
}

/// A page whose content is mounted lazily as it is scrolled.
///
/// Calls are strictly sequential; the controller never overlaps them.
pub trait Viewport {
    async fn read_state(&mut self) -> Result<ViewportState>;
    async fn scroll_to(&mut self, top: f64) -> Result<()>;
    /// Current rendered markup.
    async fn snapshot(&mut self) -> Result<Document>;
}
