use std::sync::Arc;

use tracing::{debug, info};

use crate::config::HotSwapConfig;
use crate::cost::CostModel;
use crate::error::Result;
use crate::profile::{AccessProfiler, ProfileEntry};
use crate::recommend::{RecommendationTracker, RecommenderEntry};
use crate::storage::AccessRecorder;
use crate::swap::{
    budget_exhausted, BatchClock, DecisionInputs, SwapController, SwapExecutor, SwapOutcome,
    SwapPhase, SwapPolicy, SwapState,
};
use crate::types::{ContainerAssignment, StorageRole};

/// Profiling-driven container selection for one graph.
///
/// Call [`record_batch`](Self::record_batch) once a batch has been applied to
/// storage, then [`evaluate_swap`](Self::evaluate_swap) to let the engine
/// replace containers before the next batch starts. Storage reports its
/// accesses through the shared [`AccessRecorder`] returned by
/// [`recorder`](Self::recorder).
pub struct HotSwapEngine {
    config: HotSwapConfig,
    model: CostModel,
    recorder: Arc<AccessRecorder>,
    profiler: AccessProfiler,
    tracker: RecommendationTracker,
    controller: SwapController,
    batches_recorded: u64,
}

impl HotSwapEngine {
    /// Validates `config` and builds an engine with empty history.
    pub fn new(config: HotSwapConfig, model: CostModel) -> Result<Self> {
        config.validate()?;
        let candidates = config.candidates.enumerate()?;
        let candidate_count = candidates.len();
        let tracker =
            RecommendationTracker::new(candidates, config.window_size, config.cost_ordering)?
                .with_parallel_threshold(config.parallel_threshold)
                .with_keep_per_batch(config.max_recommendations_per_batch);
        let profiler = AccessProfiler::new(config.access_history_capacity)?;
        let mut controller = SwapController::new(SwapPolicy::from(&config));
        for (batch, assignment) in config.manual_schedule() {
            controller.schedule_manual(batch, assignment)?;
        }
        info!(
            candidates = candidate_count,
            window_size = config.window_size,
            amortization_batches = config.amortization_batches,
            max_swaps = config.max_swaps,
            "hotswap.engine.created"
        );
        Ok(Self {
            config,
            model,
            recorder: Arc::new(AccessRecorder::new()),
            profiler,
            tracker,
            controller,
            batches_recorded: 0,
        })
    }

    /// Counters storage should report its accesses to.
    pub fn recorder(&self) -> Arc<AccessRecorder> {
        Arc::clone(&self.recorder)
    }

    /// Closes the current batch: drains the recorder and records the counts.
    pub fn record_batch<C, E>(&mut self, clock: &C, storage: &E)
    where
        C: BatchClock + ?Sized,
        E: SwapExecutor + ?Sized,
    {
        let entry = self.recorder.snapshot(true);
        self.record_profile(clock, storage, entry);
    }

    /// Records an externally collected profile for the batch `clock` points at.
    pub fn record_profile<C, E>(&mut self, clock: &C, storage: &E, entry: ProfileEntry)
    where
        C: BatchClock + ?Sized,
        E: SwapExecutor + ?Sized,
    {
        let batch = clock.current_batch_index();
        self.controller.finish_batch(batch, clock.total_batch_count());
        for role in StorageRole::ALL {
            self.profiler.observe_size(
                role,
                storage.container_count(role),
                storage.element_count(role),
            );
        }

        if budget_exhausted(self.config.max_swaps, self.controller.state().swaps_done) {
            debug!(batch, "hotswap.record.scoring_skipped");
        } else {
            let sizes = self.profiler.sizes();
            self.tracker
                .score_batch(batch, &self.model, &entry, &sizes);
        }

        // The first batch is still ranked; it only stays out of the history
        // the efficiency check sums over.
        let first = self.batches_recorded == 0;
        self.batches_recorded += 1;
        if first && !self.config.include_first_batch {
            self.profiler.skip_batch();
            debug!(batch, "hotswap.record.first_batch_skipped");
            return;
        }
        debug!(batch, accesses = entry.total(), "hotswap.record");
        self.profiler.record_batch(entry);
    }

    /// Decides whether to swap after the batch `clock` points at and, if so,
    /// swaps synchronously.
    pub fn evaluate_swap<C, E>(&mut self, clock: &C, storage: &E) -> SwapOutcome
    where
        C: BatchClock + ?Sized,
        E: SwapExecutor + ?Sized,
    {
        let batch = clock.current_batch_index();
        self.controller.finish_batch(batch, clock.total_batch_count());
        self.controller.evaluate(
            batch,
            storage,
            DecisionInputs {
                model: &self.model,
                profiler: &self.profiler,
                tracker: &self.tracker,
            },
        )
    }

    /// [`record_batch`](Self::record_batch) followed by
    /// [`evaluate_swap`](Self::evaluate_swap).
    pub fn end_batch<C, E>(&mut self, clock: &C, storage: &E) -> SwapOutcome
    where
        C: BatchClock + ?Sized,
        E: SwapExecutor + ?Sized,
    {
        self.record_batch(clock, storage);
        self.evaluate_swap(clock, storage)
    }

    /// Forces a swap to `assignment` after `batch`, bypassing cost checks,
    /// warm-up and budget.
    pub fn schedule_manual_swap(&mut self, batch: u64, assignment: ContainerAssignment) -> Result<()> {
        self.controller.schedule_manual(batch, assignment)
    }

    /// Clears history, window, counters and swap statistics. The manual
    /// schedule survives.
    pub fn reset(&mut self) {
        self.profiler.reset();
        self.tracker.reset();
        self.controller.reset();
        self.recorder.clear();
        self.batches_recorded = 0;
        info!("hotswap.engine.reset");
    }

    /// Successful swaps since creation or the last reset.
    pub fn swaps_done(&self) -> u64 {
        self.controller.state().swaps_done
    }

    /// Assignment of the first successful swap.
    pub fn first_switch(&self) -> Option<ContainerAssignment> {
        self.controller.state().first_switch
    }

    /// Alternatives to `active`, cheapest first.
    ///
    /// Batches stop being scored once the swap budget is spent, so from then
    /// on the window keeps, and this returns, the last batches scored before
    /// the budget ran out.
    pub fn ranked_alternatives(&self, active: &ContainerAssignment) -> Vec<RecommenderEntry> {
        self.tracker.ranked_alternatives(active)
    }

    /// Controller state.
    pub fn state(&self) -> &SwapState {
        self.controller.state()
    }

    /// Controller phase.
    pub fn phase(&self) -> SwapPhase {
        self.controller.phase()
    }

    /// Configuration in effect.
    pub fn config(&self) -> &HotSwapConfig {
        &self.config
    }

    /// Cost model in use.
    pub fn model(&self) -> &CostModel {
        &self.model
    }

    /// Access history.
    pub fn profiler(&self) -> &AccessProfiler {
        &self.profiler
    }

    /// Recommendation tracker.
    pub fn tracker(&self) -> &RecommendationTracker {
        &self.tracker
    }
}
