//! Emoji index scraper.
//!
//! Scrolls the emoji listing page until it converges and produces a JSON
//! object keyed by slug:
//!
//! ```json
//! {
//!   "grinning-face": {
//!     "href": "https://emojipedia.org/apple/ios-18/grinning-face",
//!     "image": "https://em-content.zobj.net/.../grinning-face_1f600.png",
//!     "name": "Grinning Face"
//!   }
//! }
//! ```

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::extractors::emoji::EmojiExtractor;
use crate::fetchers::Viewport;
use crate::harvest::{Collected, ConvergenceController, ConvergenceOutcome};
use serde_json::{Map, Value};
use tracing::{info, instrument};

/// Run the convergence loop over an already-open viewport.
#[instrument(level = "info", skip_all)]
pub async fn harvest<V: Viewport>(
    viewport: &mut V,
    config: &HarvestConfig,
) -> Result<ConvergenceOutcome> {
    let extractor = EmojiExtractor::from_pattern(&config.emoji.image_host_pattern)
        .map_err(|e| HarvestError::setup(format!("invalid image host pattern: {e}")))?;

    let outcome = ConvergenceController::new(config.scroll.clone())
        .run(viewport, &extractor)
        .await;

    info!(
        emoji = outcome.records.len(),
        cycles = outcome.cycles,
        reason = ?outcome.reason,
        "Emoji harvest finished"
    );
    Ok(outcome)
}

/// `slug -> {attributes}` as a JSON object.
pub fn to_payload(records: Collected) -> Value {
    let map: Map<String, Value> = records
        .into_iter()
        .map(|(key, record)| {
            let attrs = record
                .attributes
                .into_iter()
                .map(|(name, value)| (name, value.map(Value::String).unwrap_or(Value::Null)))
                .collect::<Map<_, _>>();
            (key, Value::Object(attrs))
        })
        .collect();
    Value::Object(map)
}

/// Open a headless browser on the configured start page and harvest it.
#[cfg(feature = "browser")]
pub async fn harvest_with_browser(config: &HarvestConfig) -> Result<ConvergenceOutcome> {
    use crate::fetchers::browser::BrowserViewport;

    let start = url::Url::parse(&config.emoji.start_url)
        .map_err(|e| HarvestError::setup(format!("invalid start URL: {e}")))?;
    let mut viewport = BrowserViewport::open(&start, 1000).await?;
    let outcome = harvest(&mut viewport, config).await;
    viewport.close().await;
    outcome
}

#[cfg(not(feature = "browser"))]
pub async fn harvest_with_browser(_config: &HarvestConfig) -> Result<ConvergenceOutcome> {
    Err(HarvestError::setup(
        "this build has no browser support; rebuild with `--features browser`",
    ))
}
