//! Headline scraper for a news homepage and its section pages.
//!
//! Every configured section is fetched once over plain HTTP under the crawl
//! concurrency cap. Headlines are deduplicated by `title|url`, then by `url`
//! across sections, and written sorted by section and key.

use crate::config::HarvestConfig;
use crate::extractors::headlines::HeadlineExtractor;
use crate::fetchers::Fetcher;
use crate::harvest::ConcurrentHarvester;
use crate::models::HeadlineReport;
use chrono::Utc;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(sources = config.headlines.sources.len()))]
pub async fn harvest<F: Fetcher>(fetcher: &F, config: &HarvestConfig) -> HeadlineReport {
    let extractor =
        HeadlineExtractor::new(config.headlines.min_title_len, &config.headlines.denylist);
    let harvester =
        ConcurrentHarvester::new(config.crawl.concurrency, config.crawl.politeness_delay())
            .group_by("section")
            .unique_by("url");

    let report = harvester
        .run(fetcher, &extractor, &config.headlines.sources)
        .await;

    if report.failed > 0 {
        info!(
            failed = report.failed,
            attempted = report.attempted,
            "Some sections failed and contributed no headlines"
        );
    }

    let headlines: Vec<_> = report.records.into_iter().map(|r| r.attributes).collect();
    HeadlineReport {
        generated_at: Utc::now(),
        sources: report.attempted,
        count: headlines.len(),
        headlines,
    }
}
