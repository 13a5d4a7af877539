//! Runtime configuration loaded from an optional YAML file.
//!
//! Every field has a default, so an absent file or a partial file is fine.
//! Command-line flags are applied on top by [`crate::cli`].
//!
//! ```yaml
//! scroll:
//!   quiet_period_ms: 15000
//! crawl:
//!   concurrency: 2
//!   politeness_delay_ms: 1500
//! headlines:
//!   sources:
//!     - id: world
//!       locator: https://www.bbc.com/news/world
//!       label: World
//! ```

use crate::error::{HarvestError, Result};
use crate::models::SourceDescriptor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub scroll: ScrollConfig,
    pub crawl: CrawlConfig,
    pub emoji: EmojiConfig,
    pub headlines: HeadlinesConfig,
    pub images: ImagesConfig,
}

/// Tuning for the infinite-scroll convergence loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Fraction of the viewport height advanced per cycle.
    pub fraction: f64,
    /// Fixed pixels added to every advance.
    pub nudge_px: f64,
    /// Pause after each advance so the page can mount new content.
    pub cycle_delay_ms: u64,
    /// Stop when nothing new has been added for this long.
    pub quiet_period_ms: u64,
    /// Absolute upper bound on cycles.
    pub max_cycles: usize,
    /// Number of back-and-forth passes once the bottom is reached.
    pub settle_passes: usize,
    /// How far each settling pass scrolls back.
    pub settle_back_px: f64,
    /// Pause after each settling scroll.
    pub settle_delay_ms: u64,
    /// Slack when comparing the view bottom against the content height.
    pub bottom_tolerance_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            fraction: 0.85,
            nudge_px: 40.0,
            cycle_delay_ms: 700,
            quiet_period_ms: 10_000,
            max_cycles: 1_500,
            settle_passes: 3,
            settle_back_px: 150.0,
            settle_delay_ms: 400,
            bottom_tolerance_px: 2.0,
        }
    }
}

impl ScrollConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// HTTP crawl settings shared by the headline scraper and the HTTP fetcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum number of fetches in flight.
    pub concurrency: usize,
    /// Pause a slot takes after its fetch completes.
    pub politeness_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            politeness_delay_ms: 1_000,
            timeout_secs: 20,
            user_agent: concat!(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/129.0 Safari/537.36"
            )
            .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmojiConfig {
    /// The infinite-scroll listing page.
    pub start_url: String,
    /// Only image URLs matching this pattern are accepted.
    pub image_host_pattern: String,
}

impl Default for EmojiConfig {
    fn default() -> Self {
        Self {
            start_url: "https://emojipedia.org/apple".to_string(),
            image_host_pattern: r"^https://em-content\.zobj\.net/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadlinesConfig {
    pub sources: Vec<SourceDescriptor>,
    /// Shorter titles are treated as navigation chrome.
    pub min_title_len: usize,
    /// Titles containing any of these phrases (case-insensitive) are dropped.
    pub denylist: Vec<String>,
}

impl Default for HeadlinesConfig {
    fn default() -> Self {
        let sections = [
            ("home", "https://www.bbc.com/news", "Home"),
            ("world", "https://www.bbc.com/news/world", "World"),
            ("business", "https://www.bbc.com/business", "Business"),
            ("technology", "https://www.bbc.com/innovation/technology", "Technology"),
            ("science", "https://www.bbc.com/innovation/science", "Science"),
            ("health", "https://www.bbc.com/news/health", "Health"),
            ("culture", "https://www.bbc.com/culture", "Culture"),
            ("travel", "https://www.bbc.com/travel", "Travel"),
        ];
        let sources = sections
            .iter()
            .filter_map(|(id, url, label)| {
                Url::parse(url).ok().map(|locator| SourceDescriptor {
                    id: id.to_string(),
                    locator,
                    label: label.to_string(),
                })
            })
            .collect();

        Self {
            sources,
            min_title_len: 20,
            denylist: [
                "advertisement",
                "sign in",
                "sign up",
                "subscribe",
                "cookie",
                "privacy policy",
                "terms of use",
                "newsletter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 10,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let raw = tokio::fs::read_to_string(Path::new(p))
                    .await
                    .map_err(|e| HarvestError::setup(format!("cannot read config {p}: {e}")))?;
                let config = Self::from_yaml(&raw)?;
                info!(path = p, "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| HarvestError::setup(format!("invalid config: {e}")))
    }

    /// Reject settings that would make a run hang or do nothing.
    pub fn validate(&self) -> Result<()> {
        if self.crawl.concurrency == 0 {
            return Err(HarvestError::setup("crawl.concurrency must be at least 1"));
        }
        if self.images.concurrency == 0 {
            return Err(HarvestError::setup("images.concurrency must be at least 1"));
        }
        if !(self.scroll.fraction > 0.0) {
            return Err(HarvestError::setup("scroll.fraction must be positive"));
        }
        if self.scroll.max_cycles == 0 {
            return Err(HarvestError::setup("scroll.max_cycles must be at least 1"));
        }
        Regex::new(&self.emoji.image_host_pattern).map_err(|e| {
            HarvestError::setup(format!("emoji.image_host_pattern is not a valid regex: {e}"))
        })?;
        Ok(())
    }
}
