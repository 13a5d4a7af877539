//! Convergence loop for a single infinite-scroll source.
//!
//! The page is scrolled in steps, harvesting what is mounted after each step,
//! until one of three things happens:
//!
//! - the bottom of the content is reached, after which a few back-and-forth
//!   settling passes catch items whose rendering waits on an intersection
//!   change ([`StopReason::Settled`]);
//! - nothing new has been collected for the quiet period
//!   ([`StopReason::Quiet`]);
//! - the absolute cycle cap is hit ([`StopReason::CycleCap`]).
//!
//! One cycle fully completes before the next begins. The only suspension
//! points are the fixed pauses after each scroll.

use super::dedup::{Collected, HarvestState};
use crate::config::ScrollConfig;
use crate::extractors::Extractor;
use crate::fetchers::{Viewport, ViewportState};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Harvesting,
    Settling,
    Done(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Bottom reached and settling passes done.
    Settled,
    /// No new records for longer than the quiet period.
    Quiet,
    /// Safety cap on cycles reached.
    CycleCap,
}

/// Result of one convergence run.
#[derive(Debug)]
pub struct ConvergenceOutcome {
    pub records: Collected,
    pub cycles: usize,
    pub reason: StopReason,
}

/// Drives scroll/extract cycles over one [`Viewport`].
#[derive(Debug, Clone)]
pub struct ConvergenceController {
    config: ScrollConfig,
}

impl ConvergenceController {
    pub fn new(config: ScrollConfig) -> Self {
        Self { config }
    }

    /// Run to completion and return everything collected.
    #[instrument(level = "info", skip_all)]
    pub async fn run<V, E>(&self, viewport: &mut V, extractor: &E) -> ConvergenceOutcome
    where
        V: Viewport,
        E: Extractor,
    {
        let mut state = HarvestState::new();
        let mut phase = Phase::Starting;

        let reason = loop {
            phase = match phase {
                Phase::Starting => {
                    if let Err(e) = viewport.scroll_to(0.0).await {
                        warn!(error = %e, "Could not reset scroll position");
                    }
                    state.last_progress = Instant::now();
                    state.cycle_count = 0;
                    Phase::Harvesting
                }
                Phase::Harvesting => self.harvest_cycle(viewport, extractor, &mut state).await,
                Phase::Settling => {
                    info!(
                        cycles = state.cycle_count,
                        collected = state.len(),
                        "Reached end of content; settling"
                    );
                    self.settle(viewport, extractor, &mut state).await
                }
                Phase::Done(reason) => break reason,
            };
        };

        info!(
            ?reason,
            cycles = state.cycle_count,
            collected = state.len(),
            "Convergence finished"
        );
        ConvergenceOutcome {
            cycles: state.cycle_count,
            records: state.into_records(),
            reason,
        }
    }

    async fn harvest_cycle<V, E>(
        &self,
        viewport: &mut V,
        extractor: &E,
        state: &mut HarvestState,
    ) -> Phase
    where
        V: Viewport,
        E: Extractor,
    {
        let added = self.collect(viewport, extractor, state).await;
        self.advance(viewport).await;
        sleep(self.config.cycle_delay()).await;
        state.cycle_count += 1;

        debug!(
            cycle = state.cycle_count,
            added,
            collected = state.len(),
            "Harvest cycle complete"
        );

        if state.cycle_count >= self.config.max_cycles {
            warn!(cap = self.config.max_cycles, "Cycle cap reached");
            return Phase::Done(StopReason::CycleCap);
        }
        if self.reached_end(viewport).await {
            return Phase::Settling;
        }
        if state.last_progress.elapsed() > self.config.quiet_period() {
            info!(
                quiet_ms = self.config.quiet_period_ms,
                "No new records within quiet period"
            );
            return Phase::Done(StopReason::Quiet);
        }
        Phase::Harvesting
    }

    /// Nudge back then forward past the prior position, harvesting after each
    /// pass.
    async fn settle<V, E>(
        &self,
        viewport: &mut V,
        extractor: &E,
        state: &mut HarvestState,
    ) -> Phase
    where
        V: Viewport,
        E: Extractor,
    {
        for pass in 0..self.config.settle_passes {
            if state.cycle_count >= self.config.max_cycles {
                return Phase::Done(StopReason::CycleCap);
            }
            match viewport.read_state().await {
                Ok(view) => {
                    let back = (view.scroll_top - self.config.settle_back_px).max(0.0);
                    let forward = view.scroll_top + self.config.nudge_px;
                    if let Err(e) = viewport.scroll_to(back).await {
                        warn!(pass, error = %e, "Settling scroll failed");
                    }
                    sleep(self.config.settle_delay()).await;
                    if let Err(e) = viewport.scroll_to(forward).await {
                        warn!(pass, error = %e, "Settling scroll failed");
                    }
                    sleep(self.config.settle_delay()).await;
                }
                Err(e) => warn!(pass, error = %e, "Could not read viewport while settling"),
            }

            let added = self.collect(viewport, extractor, state).await;
            state.cycle_count += 1;
            debug!(pass, added, collected = state.len(), "Settling pass complete");
        }
        Phase::Done(StopReason::Settled)
    }

    /// Extract from the current view and merge; failures count as zero added.
    async fn collect<V, E>(
        &self,
        viewport: &mut V,
        extractor: &E,
        state: &mut HarvestState,
    ) -> usize
    where
        V: Viewport,
        E: Extractor,
    {
        match viewport.snapshot().await {
            Ok(document) => state.absorb(extractor.extract(&document)),
            Err(e) => {
                warn!(error = %e, "Snapshot failed; treating cycle as empty");
                0
            }
        }
    }

    /// Scroll forward by a fraction of the viewport plus the nudge, clamped to
    /// the content.
    async fn advance<V: Viewport>(&self, viewport: &mut V) {
        match viewport.read_state().await {
            Ok(view) => {
                let target = next_scroll_top(&view, &self.config);
                if let Err(e) = viewport.scroll_to(target).await {
                    warn!(error = %e, target, "Scroll failed");
                }
            }
            Err(e) => warn!(error = %e, "Could not read viewport"),
        }
    }

    async fn reached_end<V: Viewport>(&self, viewport: &mut V) -> bool {
        match viewport.read_state().await {
            Ok(view) => view.at_bottom(self.config.bottom_tolerance_px),
            Err(e) => {
                warn!(error = %e, "Could not read viewport");
                false
            }
        }
    }
}

/// Where the next harvesting cycle should scroll to.
pub fn next_scroll_top(view: &ViewportState, config: &ScrollConfig) -> f64 {
    let step = view.view_height * config.fraction + config.nudge_px;
    (view.scroll_top + step).min(view.max_scroll_top())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarvestError, Result};
    use crate::models::{Candidate, Document, Record};
    use std::time::Duration;
    use url::Url;

    const VIEW: f64 = 100.0;

    /// A page that reveals one scripted batch per snapshot.
    struct ScriptedViewport {
        batches: Vec<Vec<&'static str>>,
        snapshots: usize,
        scroll_top: f64,
        content_height: f64,
        fail_snapshot_at: Option<usize>,
        /// Emit a brand new key on every snapshot past the script.
        endless: bool,
    }

    impl ScriptedViewport {
        fn new(batches: Vec<Vec<&'static str>>) -> Self {
            Self {
                batches,
                snapshots: 0,
                scroll_top: 0.0,
                content_height: f64::MAX,
                fail_snapshot_at: None,
                endless: false,
            }
        }

        /// Bottom is reached after exactly `scrolls` full-view advances.
        fn bottom_after(mut self, scrolls: usize) -> Self {
            self.content_height = VIEW * (scrolls as f64 + 1.0);
            self
        }
    }

    impl Viewport for ScriptedViewport {
        async fn read_state(&mut self) -> Result<ViewportState> {
            Ok(ViewportState {
                scroll_top: self.scroll_top,
                view_height: VIEW,
                content_height: self.content_height,
            })
        }

        async fn scroll_to(&mut self, top: f64) -> Result<()> {
            self.scroll_top = top.clamp(0.0, (self.content_height - VIEW).max(0.0));
            Ok(())
        }

        async fn snapshot(&mut self) -> Result<Document> {
            let index = self.snapshots;
            self.snapshots += 1;
            if self.fail_snapshot_at == Some(index) {
                return Err(HarvestError::viewport("snapshot", "renderer crashed"));
            }
            let body = match self.batches.get(index) {
                Some(keys) => keys
                    .iter()
                    .map(|k| format!("{k}=cycle{}", index + 1))
                    .collect::<Vec<_>>()
                    .join(","),
                None if self.endless => format!("item{index}=cycle{}", index + 1),
                None => String::new(),
            };
            Ok(Document::new(Url::parse("https://example.com/list").unwrap(), body))
        }
    }

    /// Parses `key=value,key=value` bodies.
    struct KeyValues;

    impl Extractor for KeyValues {
        fn extract(&self, document: &Document) -> Vec<Candidate> {
            document
                .body
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| Record::new(k).with("seen", v))
                .collect()
        }
    }

    fn config(quiet_cycles: u64) -> ScrollConfig {
        ScrollConfig {
            fraction: 1.0,
            nudge_px: 0.0,
            cycle_delay_ms: 1_000,
            quiet_period_ms: 1_000 * quiet_cycles,
            max_cycles: 50,
            settle_passes: 3,
            settle_back_px: 30.0,
            settle_delay_ms: 100,
            bottom_tolerance_px: 0.0,
        }
    }

    #[test]
    fn test_next_scroll_top_clamped() {
        let cfg = ScrollConfig {
            fraction: 0.5,
            nudge_px: 10.0,
            ..ScrollConfig::default()
        };
        let view = ViewportState {
            scroll_top: 0.0,
            view_height: 800.0,
            content_height: 5_000.0,
        };
        assert_eq!(next_scroll_top(&view, &cfg), 410.0);

        let near_end = ViewportState {
            scroll_top: 4_000.0,
            ..view
        };
        assert_eq!(next_scroll_top(&near_end, &cfg), 4_200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emoji_style_scenario() {
        let mut viewport = ScriptedViewport::new(vec![vec!["a", "b"], vec!["b", "c"]]);
        let outcome = ConvergenceController::new(config(2))
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::Quiet);
        let keys: Vec<&str> = outcome.records.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(outcome.records["a"].attr("seen"), Some("cycle1"));
        assert_eq!(outcome.records["b"].attr("seen"), Some("cycle1"));
        assert_eq!(outcome.records["c"].attr("seen"), Some("cycle2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_bounds_cycles() {
        let productive = 4;
        let quiet_cycles = 3;
        let batches = (0..productive)
            .map(|i| vec![["a", "b", "c", "d"][i]])
            .collect();
        let mut viewport = ScriptedViewport::new(batches);

        let cfg = config(quiet_cycles as u64);
        let outcome = ConvergenceController::new(cfg.clone())
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::Quiet);
        assert_eq!(outcome.records.len(), productive);
        assert!(outcome.cycles <= productive + quiet_cycles);
        assert!(outcome.cycles <= cfg.max_cycles);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bottom_then_settle() {
        let bottom_at = 3;
        let mut viewport =
            ScriptedViewport::new(vec![vec!["a"], vec!["b"], vec!["c"]]).bottom_after(bottom_at);
        let cfg = config(100);
        let outcome = ConvergenceController::new(cfg.clone())
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::Settled);
        assert_eq!(outcome.cycles, bottom_at + cfg.settle_passes);
        assert_eq!(outcome.records.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settling_catches_stragglers() {
        // Bottom after the first cycle; the straggler only shows up during settling.
        let mut viewport =
            ScriptedViewport::new(vec![vec!["a"], vec![], vec!["late"]]).bottom_after(1);
        let outcome = ConvergenceController::new(config(100))
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::Settled);
        assert!(outcome.records.contains_key("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_cap_on_endless_source() {
        let mut viewport = ScriptedViewport::new(vec![]);
        viewport.endless = true;
        let cfg = ScrollConfig {
            max_cycles: 12,
            ..config(2)
        };
        let outcome = ConvergenceController::new(cfg)
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::CycleCap);
        assert_eq!(outcome.cycles, 12);
        assert_eq!(outcome.records.len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_is_not_fatal() {
        let mut viewport = ScriptedViewport::new(vec![vec!["a"], vec!["b"], vec!["c"]]);
        viewport.fail_snapshot_at = Some(1);
        let outcome = ConvergenceController::new(config(3))
            .run(&mut viewport, &KeyValues)
            .await;

        assert_eq!(outcome.reason, StopReason::Quiet);
        let keys: Vec<&str> = outcome.records.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_measured_in_time() {
        let mut viewport = ScriptedViewport::new(vec![vec!["a"]]);
        let started = Instant::now();
        ConvergenceController::new(config(2))
            .run(&mut viewport, &KeyValues)
            .await;
        // One productive cycle then quiet for more than two cycle delays.
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
