//! Plain HTTP fetching for server-rendered pages.

use super::Fetcher;
use crate::config::CrawlConfig;
use crate::error::{HarvestError, Result};
use crate::models::{Document, SourceDescriptor};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// `reqwest`-backed [`Fetcher`] that identifies itself with the configured
/// user agent and language preference.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| HarvestError::setup(format!("invalid user agent: {e}")))?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| HarvestError::setup(format!("invalid accept-language: {e}")))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| HarvestError::setup(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// 2xx and 3xx count as success; everything else fails the source.
pub fn accepts_status(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.id, url = %source.locator))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Document> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(source.locator.clone())
            .send()
            .await
            .map_err(|e| HarvestError::source_fetch(&source.id, e))?;

        let status = response.status();
        if !accepts_status(status) {
            return Err(HarvestError::source_fetch(
                &source.id,
                format!("unexpected status {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::source_fetch(&source.id, e))?;
        debug!(%status, "Fetched source");
        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Downloaded source page"
        );

        Ok(Document::new(source.locator.clone(), body).labelled(source.label.clone()))
    }
}
