//! # Awful Harvest
//!
//! Bounded, polite and idempotent web harvesting. Each run collects keyed
//! records from a website, deduplicates them, and writes the final mapping
//! exactly once to a local JSON file or a remote tree database.
//!
//! ## Features
//!
//! - Scrolls an infinite-scroll emoji listing in a headless browser until the
//!   page stops yielding new entries, bottoms out, or hits a cycle cap
//! - Crawls a fixed list of news sections over HTTP with bounded concurrency
//!   and a politeness delay, tolerating per-section failures
//! - Uploads an existing JSON document with overwrite or merge semantics
//! - Downloads the image of every entry in an emoji index
//!
//! ## Usage
//!
//! ```sh
//! awful_harvest emoji -o apple_emojis.json
//! awful_harvest headlines --remote-path news/headlines --mode merge
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: a [`fetchers::Viewport`] (browser) or [`fetchers::Fetcher`] (HTTP)
//! 2. **Extraction**: an [`extractors::Extractor`] turns documents into keyed candidates
//! 3. **Harvesting**: [`harvest`] merges candidates first-write-wins until done
//! 4. **Output**: one [`sinks::Sink`] write at the end of the run

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod extractors;
mod fetchers;
mod harvest;
mod models;
mod scrapers;
mod sinks;
mod utils;

use cli::{Cli, Command};
use config::HarvestConfig;
use error::Result;
use fetchers::http::HttpFetcher;
use sinks::Sink;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    let command = args.command.name();
    info!(command, "awful_harvest starting up");
    debug!(?args, "Parsed CLI arguments");

    match run(args).await {
        Ok(()) => {
            info!(
                command,
                elapsed_secs = start_time.elapsed().as_secs_f64(),
                "Run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(command, error = %e, fatal = e.is_fatal(), "Run failed");
            ExitCode::FAILURE
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<()> {
    let mut config = HarvestConfig::load(args.config.as_deref()).await?;
    args.command.apply_overrides(&mut config);
    config.validate()?;

    match args.command {
        Command::Emoji { sink, .. } => {
            let mode = sink.mode;
            let sink = sink.into_sink().await?;
            let outcome = scrapers::emoji::harvest_with_browser(&config).await?;
            let count = outcome.records.len();
            let payload = scrapers::emoji::to_payload(outcome.records);
            sink.write(&payload, mode).await?;
            info!(count, target = %sink.target(), "Wrote emoji index");
        }
        Command::Headlines { sink, .. } => {
            let mode = sink.mode;
            let sink = sink.into_sink().await?;
            let fetcher = HttpFetcher::new(&config.crawl)?;
            let report = scrapers::headlines::harvest(&fetcher, &config).await;
            let payload = serde_json::to_value(&report)?;
            sink.write(&payload, mode).await?;
            info!(count = report.count, target = %sink.target(), "Wrote headlines");
        }
        Command::Upload { input, sink } => {
            let mode = sink.mode;
            let sink = sink.into_sink().await?;
            scrapers::upload::upload(&input, &sink, mode).await?;
        }
        Command::Images { index, out_dir, .. } => {
            let summary = scrapers::images::download_all(&index, &out_dir, &config.images).await?;
            if summary.failed > 0 {
                info!(failed = summary.failed, "Re-run to retry failed downloads");
            }
        }
    }
    Ok(())
}
