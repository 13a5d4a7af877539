//! The harvesting core: deduplication plus the two drivers that feed it.
//!
//! - [`dedup`]: first-write-wins merging and the per-run [`dedup::HarvestState`]
//! - [`convergence`]: scroll/extract cycles over one evolving page until it
//!   goes quiet, bottoms out, or hits the cycle cap
//! - [`concurrent`]: one fetch per source over a fixed list, bounded and
//!   polite, merged deterministically

pub mod concurrent;
pub mod convergence;
pub mod dedup;

pub use concurrent::ConcurrentHarvester;
pub use convergence::{ConvergenceController, ConvergenceOutcome, StopReason};
pub use dedup::Collected;
