//! Bounded concurrent harvesting over a fixed list of independent sources.
//!
//! At most `concurrency` fetches are in flight. Sources are admitted in list
//! order, and a slot only takes its next source after its own fetch has
//! completed and the politeness delay has elapsed, so the request rate is
//! roughly `concurrency / delay`.
//!
//! In-flight fetches share nothing: each produces a local candidate list.
//! Merging happens once everything has settled, in source-declaration order,
//! so the output does not depend on which fetch finished first.

use super::dedup::{Collected, merge};
use crate::extractors::Extractor;
use crate::fetchers::Fetcher;
use crate::models::{Candidate, Record, SourceDescriptor};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Merged output of one concurrent harvest.
#[derive(Debug)]
pub struct HarvestReport {
    /// Deduplicated records sorted by the grouping attribute, then key.
    pub records: Vec<Record>,
    pub attempted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ConcurrentHarvester {
    concurrency: usize,
    politeness_delay: Duration,
    group_by: String,
    secondary_identity: Option<String>,
}

impl ConcurrentHarvester {
    /// `concurrency` below one is treated as one.
    pub fn new(concurrency: usize, politeness_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            politeness_delay,
            group_by: "section".to_string(),
            secondary_identity: None,
        }
    }

    /// Attribute used as the primary sort key of the output.
    pub fn group_by(mut self, attribute: &str) -> Self {
        self.group_by = attribute.to_string();
        self
    }

    /// Attribute that must also be unique across the merged output, e.g.
    /// `url` when the same story is listed under different titles.
    pub fn unique_by(mut self, attribute: &str) -> Self {
        self.secondary_identity = Some(attribute.to_string());
        self
    }

    /// Fetch and extract every source once, then merge and sort.
    #[instrument(
        level = "info",
        skip_all,
        fields(sources = sources.len(), concurrency = self.concurrency)
    )]
    pub async fn run<F, E>(
        &self,
        fetcher: &F,
        extractor: &E,
        sources: &[SourceDescriptor],
    ) -> HarvestReport
    where
        F: Fetcher,
        E: Extractor,
    {
        let delay = self.politeness_delay;

        let mut partials: Vec<(usize, Option<Vec<Candidate>>)> =
            stream::iter(sources.iter().enumerate())
                .map(|(index, source)| async move {
                    let partial = match fetcher.fetch(source).await {
                        Ok(document) => {
                            let candidates = extractor.extract(&document);
                            info!(
                                source = %source.id,
                                candidates = candidates.len(),
                                "Extracted source"
                            );
                            Some(candidates)
                        }
                        Err(e) => {
                            warn!(
                                source = %source.id,
                                url = %source.locator,
                                error = %e,
                                "Source failed; contributing nothing"
                            );
                            None
                        }
                    };
                    sleep(delay).await;
                    (index, partial)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        partials.sort_by_key(|(index, _)| *index);

        let failed = partials.iter().filter(|(_, p)| p.is_none()).count();
        let candidates = partials.into_iter().filter_map(|(_, p)| p).flatten();
        let records = self.finalize(first_seen(candidates));
        info!(
            attempted = sources.len(),
            failed,
            records = records.len(),
            "Concurrent harvest complete"
        );

        HarvestReport {
            records,
            attempted: sources.len(),
            failed,
        }
    }

    /// Drop repeats of the secondary identity, keeping the first seen in
    /// source order, then sort by `(group, key)`.
    fn finalize(&self, in_source_order: Vec<Record>) -> Vec<Record> {
        let unique: Vec<Record> = match &self.secondary_identity {
            Some(attribute) => in_source_order
                .into_iter()
                .unique_by(|r| {
                    r.attr(attribute)
                        .map(str::to_string)
                        .unwrap_or_else(|| r.key.clone())
                })
                .collect(),
            None => in_source_order,
        };

        let group_by = self.group_by.as_str();
        unique
            .into_iter()
            .sorted_by(|a, b| (a.attr(group_by), &a.key).cmp(&(b.attr(group_by), &b.key)))
            .collect()
    }
}

/// Merge candidates key-first-wins and return the survivors in the order
/// they were first seen.
fn first_seen<I>(candidates: I) -> Vec<Record>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut collected = Collected::new();
    let mut order = Vec::new();
    for candidate in candidates {
        let key = candidate.key.clone();
        if merge(&mut collected, [candidate]) == 1 {
            order.push(key);
        }
    }
    order
        .iter()
        .filter_map(|key| collected.remove(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarvestError, Result};
    use crate::models::Document;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;
    use url::Url;

    /// Serves canned bodies with per-source latency and tracks concurrency.
    struct FakeFetcher {
        bodies: HashMap<String, String>,
        latency_ms: HashMap<String, u64>,
        failing: Vec<String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                bodies: HashMap::new(),
                latency_ms: HashMap::new(),
                failing: Vec::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, source: &SourceDescriptor) -> Result<Document> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let latency = self.latency_ms.get(&source.id).copied().unwrap_or(10);
            sleep(Duration::from_millis(latency)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&source.id) {
                return Err(HarvestError::source_fetch(&source.id, "connection reset"));
            }
            let body = self.bodies.get(&source.id).cloned().unwrap_or_default();
            Ok(Document::new(source.locator.clone(), body).labelled(source.label.clone()))
        }
    }

    /// One `title|url` per line.
    struct Lines;

    impl Extractor for Lines {
        fn extract(&self, document: &Document) -> Vec<Candidate> {
            document
                .body
                .lines()
                .filter_map(|line| line.split_once('|'))
                .map(|(title, url)| {
                    Record::new(format!("{title}|{url}"))
                        .with("title", title)
                        .with("url", url)
                        .with_opt("section", document.label.clone())
                })
                .collect()
        }
    }

    fn source(id: &str) -> SourceDescriptor {
        SourceDescriptor {
            id: id.to_string(),
            locator: Url::parse(&format!("https://news.example.com/{id}")).unwrap(),
            label: id.to_uppercase(),
        }
    }

    fn fifteen_sources(fetcher: &mut FakeFetcher) -> Vec<SourceDescriptor> {
        (0..15)
            .map(|i| {
                let s = source(&format!("s{i:02}"));
                fetcher
                    .bodies
                    .insert(s.id.clone(), format!("Story {i}|u{i}\nShared|u-shared"));
                s
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_concurrency() {
        let mut fetcher = FakeFetcher::new();
        let sources = fifteen_sources(&mut fetcher);
        for (i, s) in sources.iter().enumerate() {
            fetcher.latency_ms.insert(s.id.clone(), 5 + (i as u64 * 37) % 50);
        }

        let report = ConcurrentHarvester::new(3, Duration::from_millis(100))
            .run(&fetcher, &Lines, &sources)
            .await;

        assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 15);
        assert_eq!(report.attempted, 15);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_independent_of_completion_order() {
        let mut fast_first = FakeFetcher::new();
        let sources = fifteen_sources(&mut fast_first);
        let mut slow_first = FakeFetcher::new();
        fifteen_sources(&mut slow_first);
        for (i, s) in sources.iter().enumerate() {
            fast_first.latency_ms.insert(s.id.clone(), 10 + i as u64 * 10);
            slow_first.latency_ms.insert(s.id.clone(), 160 - i as u64 * 10);
        }

        let harvester = ConcurrentHarvester::new(3, Duration::from_millis(50)).unique_by("url");
        let a = harvester.run(&fast_first, &Lines, &sources).await;
        let b = harvester.run(&slow_first, &Lines, &sources).await;

        assert_eq!(a.records, b.records);
        // 15 distinct stories plus one shared one.
        assert_eq!(a.records.len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_contributes_nothing() {
        let mut fetcher = FakeFetcher::new();
        let sources = fifteen_sources(&mut fetcher);
        fetcher.failing.push("s07".to_string());

        let report = ConcurrentHarvester::new(3, Duration::from_millis(10))
            .run(&fetcher, &Lines, &sources)
            .await;

        assert_eq!(report.failed, 1);
        assert!(report.records.iter().all(|r| r.attr("section") != Some("S07")));
        let stories = report
            .records
            .iter()
            .filter(|r| r.attr("title").is_some_and(|t| t.starts_with("Story")))
            .count();
        assert_eq!(stories, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headline_style_scenario() {
        let mut fetcher = FakeFetcher::new();
        fetcher.bodies.insert("one".into(), "X|u1".into());
        fetcher.bodies.insert("two".into(), "X|u1\nY|u2".into());
        let sources = vec![source("one"), source("two")];

        let report = ConcurrentHarvester::new(2, Duration::ZERO)
            .unique_by("url")
            .run(&fetcher, &Lines, &sources)
            .await;

        assert_eq!(report.records.len(), 2);
        let x = report.records.iter().find(|r| r.attr("title") == Some("X")).unwrap();
        assert_eq!(x.attr("section"), Some("ONE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_seen_copy_wins_across_sections() {
        let mut fetcher = FakeFetcher::new();
        fetcher.bodies.insert("world".into(), "Original headline|u1".into());
        fetcher.bodies.insert("business".into(), "Rewritten headline|u1".into());
        // The later source finishes first; declaration order still decides.
        fetcher.latency_ms.insert("world".into(), 80);
        fetcher.latency_ms.insert("business".into(), 5);
        let sources = vec![source("world"), source("business")];

        let report = ConcurrentHarvester::new(2, Duration::ZERO)
            .unique_by("url")
            .run(&fetcher, &Lines, &sources)
            .await;

        let kept: Vec<(Option<&str>, Option<&str>)> = report
            .records
            .iter()
            .map(|r| (r.attr("section"), r.attr("title")))
            .collect();
        assert_eq!(kept, vec![(Some("WORLD"), Some("Original headline"))]);
    }

    #[test]
    fn test_first_seen_keeps_order_and_first_copy() {
        let records = first_seen(vec![
            Record::new("b").with("v", "1"),
            Record::new("a").with("v", "2"),
            Record::new("b").with("v", "3"),
        ]);
        let seen: Vec<(&str, Option<&str>)> =
            records.iter().map(|r| (r.key.as_str(), r.attr("v"))).collect();
        assert_eq!(seen, vec![("b", Some("1")), ("a", Some("2"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sorted_by_group_then_key() {
        let mut fetcher = FakeFetcher::new();
        fetcher.bodies.insert("b".into(), "Zeta|z\nAlpha|a".into());
        fetcher.bodies.insert("a".into(), "Mid|m".into());
        let sources = vec![source("b"), source("a")];

        let report = ConcurrentHarvester::new(2, Duration::ZERO)
            .run(&fetcher, &Lines, &sources)
            .await;

        let keys: Vec<&str> = report.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Mid|m", "Alpha|a", "Zeta|z"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_politeness_delay_holds_slot() {
        let mut fetcher = FakeFetcher::new();
        let sources = vec![source("a"), source("b"), source("c")];
        for s in &sources {
            fetcher.latency_ms.insert(s.id.clone(), 0);
        }

        let started = Instant::now();
        ConcurrentHarvester::new(1, Duration::from_secs(1))
            .run(&fetcher, &Lines, &sources)
            .await;

        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let fetcher = FakeFetcher::new();
        let report = ConcurrentHarvester::new(3, Duration::ZERO)
            .run(&fetcher, &Lines, &[])
            .await;
        assert!(report.records.is_empty());
        assert_eq!(report.attempted, 0);
    }
}
