//! Headless Chromium [`Viewport`] backed by `chromiumoxide`.
//!
//! Only compiled with the `browser` feature. Navigation failures are setup
//! errors: without the initial page there is nothing to harvest.

use super::{Viewport, ViewportState};
use crate::error::{HarvestError, Result};
use crate::models::Document;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

const READ_GEOMETRY: &str = r#"(() => {
    const el = document.scrollingElement || document.documentElement;
    return {
        scrollTop: el.scrollTop,
        viewHeight: window.innerHeight,
        contentHeight: el.scrollHeight
    };
})()"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Geometry {
    scroll_top: f64,
    view_height: f64,
    content_height: f64,
}

/// A single browser tab on the page being harvested.
pub struct BrowserViewport {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    locator: Url,
}

impl std::fmt::Debug for BrowserViewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserViewport")
            .field("locator", &self.locator.as_str())
            .finish()
    }
}

impl BrowserViewport {
    /// Launch a headless browser and navigate to `locator`.
    #[instrument(level = "info", skip_all, fields(url = %locator))]
    pub async fn open(locator: &Url, window_height: u32) -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(1280, window_height)
            .build()
            .map_err(|e| HarvestError::setup(format!("browser config: {e}")))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::setup(format!("cannot launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page(locator.as_str())
            .await
            .map_err(|e| HarvestError::setup(format!("cannot open {locator}: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| HarvestError::setup(format!("navigation to {locator} failed: {e}")))?;

        info!("Browser page ready");
        Ok(Self {
            browser,
            page,
            handler,
            locator: locator.clone(),
        })
    }

    /// Close the browser and wait for its event loop to finish.
    pub async fn close(self) {
        let Self {
            mut browser,
            handler,
            ..
        } = self;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        if let Err(e) = handler.await {
            debug!(error = %e, "Browser event loop ended with an error");
        }
    }
}

impl Viewport for BrowserViewport {
    async fn read_state(&mut self) -> Result<ViewportState> {
        let geometry: Geometry = self
            .page
            .evaluate(READ_GEOMETRY)
            .await
            .map_err(|e| HarvestError::viewport("geometry", e))?
            .into_value()
            .map_err(|e| HarvestError::viewport("geometry", e))?;

        Ok(ViewportState {
            scroll_top: geometry.scroll_top,
            view_height: geometry.view_height,
            content_height: geometry.content_height,
        })
    }

    async fn scroll_to(&mut self, top: f64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {top})"))
            .await
            .map_err(|e| HarvestError::viewport("scroll", e))?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<Document> {
        let body = self
            .page
            .content()
            .await
            .map_err(|e| HarvestError::viewport("snapshot", e))?;
        Ok(Document::new(self.locator.clone(), body))
    }
}
