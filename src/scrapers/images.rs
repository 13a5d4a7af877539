//! Download the image of every entry in an emoji index.
//!
//! Entries are read from a `key -> {name, image}` JSON object. Each image is
//! saved as `{key}{ext}` in the output directory, where the extension comes
//! from the image URL (query string ignored, `.png` when there is none).
//! Files that already exist are left alone, so an interrupted run can simply
//! be started again. A failed download is logged and skipped.

use crate::config::ImagesConfig;
use crate::error::{HarvestError, Result};
use crate::utils::{ensure_writable_dir, image_extension, is_plain_file_name};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub existing: usize,
    pub missing_image: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Downloaded,
    Existing,
    MissingImage,
    Failed,
}

/// Download every image referenced by the index at `index_path` into `out_dir`.
#[instrument(
    level = "info",
    skip_all,
    fields(index = %index_path.display(), out = %out_dir.display())
)]
pub async fn download_all(
    index_path: &Path,
    out_dir: &Path,
    config: &ImagesConfig,
) -> Result<DownloadSummary> {
    let raw = tokio::fs::read_to_string(index_path)
        .await
        .map_err(|e| HarvestError::setup(format!("cannot read {}: {e}", index_path.display())))?;
    let index: BTreeMap<String, IndexEntry> = serde_json::from_str(&raw)
        .map_err(|e| {
            HarvestError::setup(format!("{} is not an emoji index: {e}", index_path.display()))
        })?;

    ensure_writable_dir(out_dir)
        .await
        .map_err(|e| HarvestError::setup(format!("{} is not writable: {e}", out_dir.display())))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| HarvestError::setup(format!("cannot build HTTP client: {e}")))?;

    info!(entries = index.len(), "Downloading images");
    let outcomes: Vec<Outcome> = stream::iter(index.iter())
        .map(|(key, entry)| {
            let client = &client;
            async move { download_one(client, out_dir, key, entry).await }
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut summary = DownloadSummary::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Downloaded => summary.downloaded += 1,
            Outcome::Existing => summary.existing += 1,
            Outcome::MissingImage => summary.missing_image += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    info!(
        downloaded = summary.downloaded,
        existing = summary.existing,
        missing_image = summary.missing_image,
        failed = summary.failed,
        "Image download complete"
    );
    Ok(summary)
}

/// Where the image for `key` is stored, or `None` when the key would not
/// stay inside `out_dir`.
pub fn image_path(out_dir: &Path, key: &str, image_url: &str) -> Option<PathBuf> {
    let file_name = format!("{}{}", key, image_extension(image_url));
    (is_plain_file_name(key) && is_plain_file_name(&file_name)).then(|| out_dir.join(file_name))
}

async fn download_one(
    client: &reqwest::Client,
    out_dir: &Path,
    key: &str,
    entry: &IndexEntry,
) -> Outcome {
    let name = entry.name.as_deref().unwrap_or(key);
    let Some(url) = entry.image.as_deref().filter(|u| !u.is_empty()) else {
        warn!(%name, "No image URL");
        return Outcome::MissingImage;
    };

    let Some(path) = image_path(out_dir, key, url) else {
        error!(%key, "Refusing key that is not a plain file name");
        return Outcome::Failed;
    };
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        info!(file = %path.display(), "Skipping (already exists)");
        return Outcome::Existing;
    }

    match fetch_bytes(client, url).await {
        Ok(bytes) => match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                info!(%name, file = %path.display(), bytes = bytes.len(), "Downloaded image");
                Outcome::Downloaded
            }
            Err(e) => {
                error!(%name, file = %path.display(), error = %e, "Failed to save image");
                Outcome::Failed
            }
        },
        Err(e) => {
            error!(%name, %url, error = %e, "Failed to download image");
            Outcome::Failed
        }
    }
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
) -> std::result::Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
