//! Local JSON file sink.
//!
//! The payload is written to a sibling temporary file and renamed into place,
//! so a failed write never leaves a truncated document behind.

use super::{Sink, WriteMode};
use crate::error::{HarvestError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn existing_object(&self) -> Result<Option<serde_json::Map<String, Value>>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HarvestError::write(self.target(), e)),
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(HarvestError::write(
                self.target(),
                "existing document is not a JSON object; cannot merge",
            )),
            Err(e) => Err(HarvestError::write(
                self.target(),
                format!("existing document is not valid JSON: {e}"),
            )),
        }
    }
}

impl Sink for FileSink {
    fn target(&self) -> String {
        self.path.display().to_string()
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), ?mode))]
    async fn write(&self, payload: &Value, mode: WriteMode) -> Result<()> {
        let document = match mode {
            WriteMode::Overwrite => payload.clone(),
            WriteMode::Merge => {
                let Value::Object(incoming) = payload else {
                    return Err(HarvestError::write(
                        self.target(),
                        "merge mode needs a JSON object payload",
                    ));
                };
                let mut merged = self.existing_object().await?.unwrap_or_default();
                for (key, value) in incoming {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
        };

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| HarvestError::write(self.target(), e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::write(self.target(), e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| HarvestError::write(self.target(), e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| HarvestError::write(self.target(), e))?;

        info!(bytes = json.len(), "Wrote JSON file");
        Ok(())
    }
}
