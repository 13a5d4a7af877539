//! First-write-wins deduplication and the per-run harvest state.

use crate::models::{Candidate, Record};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tokio::time::Instant;

/// Records collected during one run, keyed by [`Record::key`].
pub type Collected = BTreeMap<String, Record>;

/// Merge `incoming` into `existing`, returning how many keys were new.
///
/// A candidate whose key is already present is dropped as-is: no overwrite and
/// no field-level merge. Candidates with an empty key are ignored.
pub fn merge<I>(existing: &mut Collected, incoming: I) -> usize
where
    I: IntoIterator<Item = Candidate>,
{
    let mut added = 0;
    for candidate in incoming {
        if candidate.key.is_empty() {
            continue;
        }
        if let Entry::Vacant(slot) = existing.entry(candidate.key.clone()) {
            slot.insert(candidate);
            added += 1;
        }
    }
    added
}

/// Mutable state of a single harvest run.
///
/// Owned by exactly one controller; concurrent workers produce local
/// candidate lists that are merged in afterwards.
#[derive(Debug)]
pub struct HarvestState {
    pub collected: Collected,
    pub last_progress: Instant,
    pub cycle_count: usize,
}

impl HarvestState {
    pub fn new() -> Self {
        Self {
            collected: Collected::new(),
            last_progress: Instant::now(),
            cycle_count: 0,
        }
    }

    /// Merge candidates and refresh `last_progress` when anything was added.
    pub fn absorb(&mut self, candidates: Vec<Candidate>) -> usize {
        let added = merge(&mut self.collected, candidates);
        if added > 0 {
            self.last_progress = Instant::now();
        }
        added
    }

    pub fn len(&self) -> usize {
        self.collected.len()
    }

    pub fn into_records(self) -> Collected {
        self.collected
    }
}

impl Default for HarvestState {
    fn default() -> Self {
        Self::new()
    }
}
