//! Remote tree-structured database sink.
//!
//! The store exposes every node of its tree as `{base}/{path}.json`: a `PUT`
//! replaces the node, a `PATCH` updates only the given children. Requests are
//! authenticated with a static database secret passed as `?auth=`.

use super::{Sink, WriteMode};
use crate::error::{HarvestError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use url::Url;

/// Connection details, usually loaded from a credentials file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(alias = "databaseURL", alias = "databaseUrl")]
    pub database_url: Option<String>,
    #[serde(alias = "databaseSecret", alias = "auth")]
    pub secret: Option<String>,
}

impl Credentials {
    /// Read credentials from a JSON file. Any failure is a setup error.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            HarvestError::setup(format!("cannot read credentials {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            HarvestError::setup(format!("invalid credentials {}: {e}", path.display()))
        })
    }

    /// Fill gaps from another source (e.g. flags over file contents).
    pub fn or(self, other: Credentials) -> Credentials {
        Credentials {
            database_url: self.database_url.or(other.database_url),
            secret: self.secret.or(other.secret),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteSink {
    client: reqwest::Client,
    base: Url,
    path: String,
    secret: Option<String>,
}

impl RemoteSink {
    /// Build a sink for `path` under the database named in `credentials`.
    pub fn new(credentials: &Credentials, path: &str) -> Result<Self> {
        let raw = credentials
            .database_url
            .as_deref()
            .ok_or_else(|| HarvestError::setup("no database URL configured"))?;
        let base = Url::parse(raw)
            .map_err(|e| HarvestError::setup(format!("invalid database URL {raw}: {e}")))?;
        if base.scheme() != "https" && base.scheme() != "http" {
            return Err(HarvestError::setup(format!("unsupported database URL scheme: {raw}")));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HarvestError::setup(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            path: path.trim_matches('/').to_string(),
            secret: credentials.secret.clone(),
        })
    }

    /// `{base}/{encoded path}.json[?auth=secret]`
    pub fn endpoint(&self) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        let path = self
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut endpoint = if path.is_empty() {
            format!("{base}/.json")
        } else {
            format!("{base}/{path}.json")
        };
        if let Some(secret) = &self.secret {
            endpoint.push_str("?auth=");
            endpoint.push_str(&urlencoding::encode(secret));
        }
        endpoint
    }
}

impl Sink for RemoteSink {
    fn target(&self) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), self.path)
    }

    #[instrument(level = "info", skip_all, fields(target = %self.target(), ?mode))]
    async fn write(&self, payload: &Value, mode: WriteMode) -> Result<()> {
        let t0 = Instant::now();
        let request = match mode {
            WriteMode::Overwrite => self.client.put(self.endpoint()),
            WriteMode::Merge => {
                if !payload.is_object() {
                    return Err(HarvestError::write(
                        self.target(),
                        "merge mode needs a JSON object payload",
                    ));
                }
                self.client.patch(self.endpoint())
            }
        };

        let response = request
            .json(payload)
            .send()
            .await
            .map_err(|e| HarvestError::write(self.target(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::write(
                self.target(),
                format!("status {status}: {}", crate::utils::truncate_for_log(&body, 300)),
            ));
        }

        info!(
            %status,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Remote write complete"
        );
        Ok(())
    }
}
