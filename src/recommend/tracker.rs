use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cost::{CostModel, CostOrdering, CostVector};
use crate::error::{HotSwapError, Result};
use crate::profile::{ProfileEntry, RoleSizes};
use crate::types::ContainerAssignment;

/// Cost of one candidate assignment for one batch.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct RecommenderEntry {
    /// Batch the cost was computed for.
    pub batch: u64,
    /// Candidate assignment.
    pub assignment: ContainerAssignment,
    /// Aggregate cost of the batch under `assignment`.
    pub cost: CostVector,
}

/// Scored entries of the most recent batches, evicted oldest batch first.
#[derive(Clone, Debug)]
pub struct RecommendationWindow {
    capacity: usize,
    batches: VecDeque<(u64, Vec<RecommenderEntry>)>,
}

impl RecommendationWindow {
    /// Creates a window holding at most `capacity` batches.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            batches: VecDeque::with_capacity(capacity),
        }
    }

    /// Maximum number of batches retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of batches currently retained.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch is retained.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Batch indices currently retained, oldest first.
    pub fn batches(&self) -> impl Iterator<Item = u64> + '_ {
        self.batches.iter().map(|(batch, _)| *batch)
    }

    /// Every retained entry, oldest batch first.
    pub fn entries(&self) -> impl Iterator<Item = &RecommenderEntry> + '_ {
        self.batches.iter().flat_map(|(_, entries)| entries.iter())
    }

    /// Adds a batch's entries and evicts the oldest batches beyond capacity.
    pub fn push(&mut self, batch: u64, entries: Vec<RecommenderEntry>) {
        self.batches.push_back((batch, entries));
        while self.batches.len() > self.capacity {
            self.batches.pop_front();
        }
    }

    /// Drops every batch.
    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

/// Scores candidates after every batch and ranks them over the window.
pub struct RecommendationTracker {
    candidates: Vec<ContainerAssignment>,
    window: RecommendationWindow,
    ordering: CostOrdering,
    parallel_threshold: usize,
    keep_per_batch: Option<usize>,
}

impl RecommendationTracker {
    /// Default candidate count from which scoring runs in parallel.
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

    /// Creates a tracker over `candidates` with a window of `window_size` batches.
    pub fn new(
        candidates: Vec<ContainerAssignment>,
        window_size: usize,
        ordering: CostOrdering,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(HotSwapError::config("window_size must be positive"));
        }
        if candidates.is_empty() {
            return Err(HotSwapError::config("candidate space is empty"));
        }
        Ok(Self {
            candidates,
            window: RecommendationWindow::new(window_size),
            ordering,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
            keep_per_batch: None,
        })
    }

    /// Sets the candidate count from which scoring runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Keeps only the cheapest `limit` entries of each batch.
    pub fn with_keep_per_batch(mut self, limit: Option<usize>) -> Self {
        self.keep_per_batch = limit;
        self
    }

    /// Candidates scored each batch.
    pub fn candidates(&self) -> &[ContainerAssignment] {
        &self.candidates
    }

    /// Sliding window of scored batches.
    pub fn window(&self) -> &RecommendationWindow {
        &self.window
    }

    /// Order used to compare costs.
    pub fn ordering(&self) -> CostOrdering {
        self.ordering
    }

    fn should_parallelize(&self) -> bool {
        cfg!(feature = "parallel") && self.candidates.len() >= self.parallel_threshold
    }

    fn score(&self, batch: u64, model: &CostModel, entry: &ProfileEntry, sizes: &RoleSizes) -> Vec<RecommenderEntry> {
        let score_one = |assignment: &ContainerAssignment| RecommenderEntry {
            batch,
            assignment: *assignment,
            cost: model.aggregate(assignment, entry, sizes),
        };
        #[cfg(feature = "parallel")]
        {
            if self.should_parallelize() {
                return self.candidates.par_iter().map(score_one).collect();
            }
        }
        self.candidates.iter().map(score_one).collect()
    }

    /// Scores every candidate against `entry` and pushes the batch into the
    /// window. Returns the number of entries retained.
    pub fn score_batch(
        &mut self,
        batch: u64,
        model: &CostModel,
        entry: &ProfileEntry,
        sizes: &RoleSizes,
    ) -> usize {
        let mut scored = self.score(batch, model, entry, sizes);
        if let Some(limit) = self.keep_per_batch {
            let ordering = self.ordering;
            scored.sort_by(|a, b| {
                ordering
                    .compare(&a.cost, &b.cost)
                    .then_with(|| a.assignment.cmp(&b.assignment))
            });
            scored.truncate(limit);
        }
        let retained = scored.len();
        debug!(
            batch,
            candidates = self.candidates.len(),
            retained,
            parallel = self.should_parallelize(),
            "hotswap.recommend.scored"
        );
        self.window.push(batch, scored);
        retained
    }

    /// Alternatives to `active`, cheapest first, each with its most recent cost.
    ///
    /// Equal costs rank the assignment with fewer role changes from `active`
    /// first, then by assignment identity order. Only batches pushed into the
    /// window count, so nothing ages out while scoring is paused.
    pub fn ranked_alternatives(&self, active: &ContainerAssignment) -> Vec<RecommenderEntry> {
        let mut latest: FxHashMap<ContainerAssignment, RecommenderEntry> = FxHashMap::default();
        for entry in self.window.entries() {
            if entry.assignment != *active {
                latest.insert(entry.assignment, *entry);
            }
        }
        let mut ranked: Vec<RecommenderEntry> = latest.into_values().collect();
        let ordering = self.ordering;
        ranked.sort_by(|a, b| {
            ordering
                .compare(&a.cost, &b.cost)
                .then_with(|| {
                    a.assignment
                        .role_changes(active)
                        .cmp(&b.assignment.role_changes(active))
                })
                .then_with(|| a.assignment.cmp(&b.assignment))
        });
        ranked
    }

    /// Empties the window.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}
