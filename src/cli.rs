//! Command-line interface definitions for Awful Harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Database connection settings can also come from environment variables or
//! a credentials file.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::sinks::file::FileSink;
use crate::sinks::remote::{Credentials, RemoteSink};
use crate::sinks::{AnySink, WriteMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Awful Harvest application.
///
/// # Examples
///
/// ```sh
/// # Scroll the emoji listing and write a local index
/// awful_harvest emoji -o apple_emojis.json
///
/// # Crawl news sections with two workers and push to a database node
/// awful_harvest headlines --concurrency 2 --remote-path news/headlines
///
/// # Upload an existing index, keeping unrelated keys
/// awful_harvest upload -i apple_emojis.json --remote-path emoji/apple --mode merge
///
/// # Download every image referenced by an index
/// awful_harvest images -i apple_emojis.json -o emoji_images
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scroll an emoji listing in a headless browser and write a slug-keyed index
    Emoji {
        #[command(flatten)]
        sink: SinkArgs,

        /// Listing page to start from
        #[arg(long)]
        start_url: Option<String>,

        /// Regex an image URL must match to be accepted
        #[arg(long)]
        image_host_pattern: Option<String>,

        /// Stop after this long without new entries
        #[arg(long)]
        quiet_period_ms: Option<u64>,

        /// Absolute cap on scroll cycles
        #[arg(long)]
        max_cycles: Option<usize>,
    },

    /// Fetch news sections concurrently and write deduplicated headlines
    Headlines {
        #[command(flatten)]
        sink: SinkArgs,

        /// Maximum fetches in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Pause after each fetch before the slot takes another source
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Upload a local JSON file to a sink
    Upload {
        /// JSON file to upload
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        sink: SinkArgs,
    },

    /// Download the image of every entry in an emoji index
    Images {
        /// Emoji index JSON file
        #[arg(short, long)]
        index: PathBuf,

        /// Directory to save images in
        #[arg(short, long, default_value = "emoji_images")]
        out_dir: PathBuf,

        /// Maximum downloads in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

/// Where the result goes.
#[derive(Args, Debug, Clone)]
pub struct SinkArgs {
    /// Write to this local JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write to this node of the remote database instead of a file
    #[arg(long, conflicts_with = "output")]
    pub remote_path: Option<String>,

    /// Remote database base URL
    #[arg(long, env = "HARVEST_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Remote database secret
    #[arg(long, env = "HARVEST_DATABASE_SECRET", hide_env_values = true)]
    pub database_secret: Option<String>,

    /// JSON credentials file with `database_url` and `secret`
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Replace the target, or merge top-level keys into it
    #[arg(long, value_enum, default_value_t = WriteMode::Overwrite)]
    pub mode: WriteMode,
}

impl SinkArgs {
    /// Resolve the sink. Missing or invalid credentials are setup errors.
    pub async fn into_sink(self) -> Result<AnySink> {
        if let Some(remote_path) = self.remote_path {
            let flags = Credentials {
                database_url: self.database_url,
                secret: self.database_secret,
            };
            let credentials = match &self.credentials {
                Some(path) => flags.or(Credentials::load(path).await?),
                None => flags,
            };
            return Ok(AnySink::Remote(RemoteSink::new(&credentials, &remote_path)?));
        }
        match self.output {
            Some(path) => Ok(AnySink::File(FileSink::new(path))),
            None => Err(HarvestError::setup(
                "no output target: pass --output <file> or --remote-path <node>",
            )),
        }
    }
}

impl Command {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut HarvestConfig) {
        match self {
            Command::Emoji {
                start_url,
                image_host_pattern,
                quiet_period_ms,
                max_cycles,
                ..
            } => {
                if let Some(url) = start_url {
                    config.emoji.start_url = url.clone();
                }
                if let Some(pattern) = image_host_pattern {
                    config.emoji.image_host_pattern = pattern.clone();
                }
                if let Some(ms) = quiet_period_ms {
                    config.scroll.quiet_period_ms = *ms;
                }
                if let Some(cap) = max_cycles {
                    config.scroll.max_cycles = *cap;
                }
            }
            Command::Headlines {
                concurrency,
                delay_ms,
                ..
            } => {
                if let Some(c) = concurrency {
                    config.crawl.concurrency = *c;
                }
                if let Some(ms) = delay_ms {
                    config.crawl.politeness_delay_ms = *ms;
                }
            }
            Command::Images { concurrency, .. } => {
                if let Some(c) = concurrency {
                    config.images.concurrency = *c;
                }
            }
            Command::Upload { .. } => {}
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Emoji { .. } => "emoji",
            Command::Headlines { .. } => "headlines",
            Command::Upload { .. } => "upload",
            Command::Images { .. } => "images",
        }
    }
}
