//! Push a local JSON document to a sink.

use crate::error::{HarvestError, Result};
use crate::sinks::{Sink, WriteMode};
use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument};

/// Read `input` and write it to `sink`. Returns the number of top-level
/// entries written.
///
/// An unreadable or malformed input file is a setup error: nothing is sent.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), target = %sink.target(), ?mode)
)]
pub async fn upload<S: Sink>(input: &Path, sink: &S, mode: WriteMode) -> Result<usize> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .map_err(|e| HarvestError::setup(format!("cannot read {}: {e}", input.display())))?;
    let payload: Value = serde_json::from_str(&raw)
        .map_err(|e| HarvestError::setup(format!("{} is not valid JSON: {e}", input.display())))?;

    let entries = match &payload {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 1,
    };

    sink.write(&payload, mode).await?;
    info!(entries, "Uploaded document");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::file::FileSink;
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("apple_emojis.json");
        tokio::fs::write(&input, r#"{"fire": {"name": "Fire"}, "sparkles": {"name": "Sparkles"}}"#)
            .await
            .unwrap();
        let sink = FileSink::new(dir.path().join("copy.json"));

        let entries = upload(&input, &sink, WriteMode::Overwrite).await.unwrap();
        assert_eq!(entries, 2);

        let copied: Value =
            serde_json::from_str(&tokio::fs::read_to_string(sink.path()).await.unwrap()).unwrap();
        assert_eq!(copied["fire"], json!({"name": "Fire"}));
    }

    #[tokio::test]
    async fn test_missing_input_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("copy.json"));
        let result = upload(&dir.path().join("nope.json"), &sink, WriteMode::Overwrite).await;
        assert!(matches!(result, Err(HarvestError::Setup(_))));
        assert!(!sink.path().exists());
    }

    #[tokio::test]
    async fn test_malformed_input_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.json");
        tokio::fs::write(&input, "{ nope").await.unwrap();
        let sink = FileSink::new(dir.path().join("copy.json"));
        let result = upload(&input, &sink, WriteMode::Merge).await;
        assert!(matches!(result, Err(HarvestError::Setup(_))));
    }
}
