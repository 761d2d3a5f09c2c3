use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HotSwapConfig;
use crate::cost::{CostModel, CostOrdering, CostVector};
use crate::error::Result;
use crate::profile::{AccessProfiler, ProfileEntry, RoleSizes};
use crate::recommend::RecommendationTracker;
use crate::types::ContainerAssignment;

use super::executor::{InsertionChecksPaused, SwapExecutor};

/// Where the controller is within one decision.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    /// Between batches.
    #[default]
    Idle,
    /// Weighing alternatives.
    Evaluating,
    /// Storage is rebuilding containers.
    Swapping,
    /// Decided to keep the active assignment.
    Skipping,
}

/// Persistent controller state; survives until [`SwapController::reset`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwapState {
    /// Most recently finished batch.
    pub last_finished_batch: Option<u64>,
    /// Total batches in the run, if known.
    pub total_batches: Option<u64>,
    /// Successful swaps so far.
    pub swaps_done: u64,
    /// Assignment of the first successful swap.
    pub first_switch: Option<ContainerAssignment>,
    /// Manually scheduled swaps by batch index.
    pub manual: BTreeMap<u64, ContainerAssignment>,
}

/// Amortized costs that justified a swap.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct SwapCosts {
    /// Projected cost of keeping the active assignment.
    pub current: CostVector,
    /// Projected cost under the alternative.
    pub alternative: CostVector,
    /// One-off cost of rebuilding the changed roles.
    pub swap: CostVector,
}

impl SwapCosts {
    /// Projects `accesses` over the horizon for both assignments and prices
    /// the rebuild between them.
    pub fn project(
        model: &CostModel,
        accesses: &ProfileEntry,
        prefactor: f64,
        active: &ContainerAssignment,
        alternative: &ContainerAssignment,
        sizes: &RoleSizes,
    ) -> Self {
        Self {
            current: model.aggregate(active, accesses, sizes) * prefactor,
            alternative: model.aggregate(alternative, accesses, sizes) * prefactor,
            swap: model.swap_cost(active, alternative, sizes),
        }
    }

    /// Whether `alternative + swap` is strictly cheaper than `current`.
    pub fn is_efficient(&self, ordering: &CostOrdering) -> bool {
        ordering.less(&(self.alternative + self.swap), &self.current)
    }
}

/// Why the active assignment was kept.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A manual swap was scheduled but its assignment is already active.
    ManualAlreadyActive,
    /// `max_swaps` swaps have already been made.
    BudgetExhausted,
    /// The run has not passed the warm-up threshold.
    WarmupNotElapsed {
        /// First batch at which automatic swaps are considered.
        until: u64,
    },
    /// No alternative pays for itself within the horizon.
    NoEfficientAlternative,
    /// Storage rejected the rebuild.
    SwapFailed {
        /// Error reported by storage.
        message: String,
    },
}

/// Reason attached to every [`SwapOutcome`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapReason {
    /// Swapped because of a manual schedule entry.
    Manual,
    /// Swapped because the alternative amortizes within the horizon.
    Efficient(SwapCosts),
    /// Kept the active assignment.
    Skipped(SkipReason),
}

impl fmt::Display for SwapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapReason::Manual => f.write_str("manual schedule"),
            SwapReason::Efficient(costs) => write!(
                f,
                "efficient (current {}, alternative {}, swap {})",
                costs.current, costs.alternative, costs.swap
            ),
            SwapReason::Skipped(SkipReason::ManualAlreadyActive) => {
                f.write_str("manual assignment already active")
            }
            SwapReason::Skipped(SkipReason::BudgetExhausted) => f.write_str("swap budget exhausted"),
            SwapReason::Skipped(SkipReason::WarmupNotElapsed { until }) => {
                write!(f, "warm-up until batch {until}")
            }
            SwapReason::Skipped(SkipReason::NoEfficientAlternative) => {
                f.write_str("no efficient alternative")
            }
            SwapReason::Skipped(SkipReason::SwapFailed { message }) => {
                write!(f, "swap failed: {message}")
            }
        }
    }
}

/// Result of evaluating one batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapOutcome {
    /// Batch the decision was made after.
    pub batch: u64,
    /// Whether storage now uses a different assignment.
    pub swapped: bool,
    /// Assignment active after the decision.
    pub assignment: ContainerAssignment,
    /// Why.
    pub reason: SwapReason,
}

impl SwapOutcome {
    /// Terminal phase this outcome corresponds to.
    pub fn phase(&self) -> SwapPhase {
        if self.swapped {
            SwapPhase::Swapping
        } else {
            SwapPhase::Skipping
        }
    }
}

/// Batches to look ahead: the configured horizon, capped by the batches
/// left in the run. Zero when the total is unknown or already reached.
pub fn amortization_horizon(configured: usize, total: Option<u64>, last_finished: u64) -> usize {
    match total {
        Some(total) if total > last_finished => (configured as u64).min(total - last_finished) as usize,
        _ => 0,
    }
}

/// Whether `done` swaps exhaust a budget of `max_swaps` (negative = unlimited).
pub fn budget_exhausted(max_swaps: i64, done: u64) -> bool {
    max_swaps >= 0 && done >= max_swaps as u64
}

/// First batch at which automatic swaps are considered.
pub fn warmup_batches(lower_bound: f64, window_size: usize) -> u64 {
    (lower_bound * window_size as f64).floor() as u64
}

/// Decision parameters taken from [`HotSwapConfig`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SwapPolicy {
    /// Recommendation window in batches.
    pub window_size: usize,
    /// Fraction of the window that must elapse before automatic swaps.
    pub lower_bound: f64,
    /// Configured amortization horizon in batches.
    pub amortization_batches: usize,
    /// Swap budget; negative means unlimited.
    pub max_swaps: i64,
    /// Order used to compare cost vectors.
    pub ordering: CostOrdering,
}

impl From<&HotSwapConfig> for SwapPolicy {
    fn from(config: &HotSwapConfig) -> Self {
        Self {
            window_size: config.window_size,
            lower_bound: config.lower_bound,
            amortization_batches: config.amortization_batches,
            max_swaps: config.max_swaps,
            ordering: config.cost_ordering,
        }
    }
}

/// Read-only inputs of one decision.
pub struct DecisionInputs<'a> {
    /// Calibrated cost model.
    pub model: &'a CostModel,
    /// Access history and sizes.
    pub profiler: &'a AccessProfiler,
    /// Ranked candidates.
    pub tracker: &'a RecommendationTracker,
}

/// Stay-or-swap state machine run after every batch.
#[derive(Debug)]
pub struct SwapController {
    policy: SwapPolicy,
    state: SwapState,
    phase: SwapPhase,
}

impl SwapController {
    /// Creates an idle controller.
    pub fn new(policy: SwapPolicy) -> Self {
        Self {
            policy,
            state: SwapState::default(),
            phase: SwapPhase::Idle,
        }
    }

    /// Decision parameters.
    pub fn policy(&self) -> &SwapPolicy {
        &self.policy
    }

    /// Persistent state.
    pub fn state(&self) -> &SwapState {
        &self.state
    }

    /// Current phase; [`SwapPhase::Idle`] between batches.
    pub fn phase(&self) -> SwapPhase {
        self.phase
    }

    /// Notes that `batch` finished in a run of `total` batches.
    pub fn finish_batch(&mut self, batch: u64, total: Option<u64>) {
        self.state.last_finished_batch = Some(batch);
        self.state.total_batches = total;
    }

    /// Schedules an unconditional swap to `assignment` after `batch`.
    pub fn schedule_manual(&mut self, batch: u64, assignment: ContainerAssignment) -> Result<()> {
        assignment.validate()?;
        self.state.manual.insert(batch, assignment);
        debug!(batch, assignment = %assignment, "hotswap.manual.scheduled");
        Ok(())
    }

    /// Clears counters and history markers; the manual schedule is kept.
    pub fn reset(&mut self) {
        let manual = std::mem::take(&mut self.state.manual);
        self.state = SwapState {
            manual,
            ..SwapState::default()
        };
        self.phase = SwapPhase::Idle;
    }

    /// Decides whether to swap after `batch` and performs the swap.
    pub fn evaluate<E: SwapExecutor + ?Sized>(
        &mut self,
        batch: u64,
        storage: &E,
        inputs: DecisionInputs<'_>,
    ) -> SwapOutcome {
        self.phase = SwapPhase::Evaluating;
        let outcome = self.decide(batch, storage, &inputs);
        debug!(
            batch,
            swapped = outcome.swapped,
            reason = %outcome.reason,
            "hotswap.evaluate.completed"
        );
        self.phase = SwapPhase::Idle;
        outcome
    }

    fn decide<E: SwapExecutor + ?Sized>(
        &mut self,
        batch: u64,
        storage: &E,
        inputs: &DecisionInputs<'_>,
    ) -> SwapOutcome {
        let active = storage.current_assignment();

        if let Some(target) = self.state.manual.get(&batch).copied() {
            if target == active {
                return self.skip(batch, active, SkipReason::ManualAlreadyActive);
            }
            info!(batch, to = %target, "hotswap.manual.triggered");
            return self.execute(batch, storage, active, target, SwapReason::Manual);
        }

        let until = warmup_batches(self.policy.lower_bound, self.policy.window_size);
        if batch < until {
            return self.skip(batch, active, SkipReason::WarmupNotElapsed { until });
        }
        if budget_exhausted(self.policy.max_swaps, self.state.swaps_done) {
            return self.skip(batch, active, SkipReason::BudgetExhausted);
        }

        let horizon =
            amortization_horizon(self.policy.amortization_batches, self.state.total_batches, batch);
        let accumulated = inputs.profiler.accumulate(horizon);
        let prefactor = accumulated.prefactor(horizon);
        let sizes = inputs.profiler.sizes();
        debug!(
            batch,
            horizon,
            occupied = accumulated.occupied,
            prefactor,
            "hotswap.evaluate.horizon"
        );

        for candidate in inputs.tracker.ranked_alternatives(&active) {
            if candidate.assignment == active {
                continue;
            }
            let costs = SwapCosts::project(
                inputs.model,
                &accumulated.entry,
                prefactor,
                &active,
                &candidate.assignment,
                &sizes,
            );
            if costs.is_efficient(&self.policy.ordering) {
                return self.execute(
                    batch,
                    storage,
                    active,
                    candidate.assignment,
                    SwapReason::Efficient(costs),
                );
            }
            debug!(
                batch,
                candidate = %candidate.assignment,
                current = %costs.current,
                alternative = %costs.alternative,
                swap = %costs.swap,
                "hotswap.evaluate.inefficient"
            );
        }
        self.skip(batch, active, SkipReason::NoEfficientAlternative)
    }

    fn skip(&mut self, batch: u64, active: ContainerAssignment, reason: SkipReason) -> SwapOutcome {
        self.phase = SwapPhase::Skipping;
        SwapOutcome {
            batch,
            swapped: false,
            assignment: active,
            reason: SwapReason::Skipped(reason),
        }
    }

    fn execute<E: SwapExecutor + ?Sized>(
        &mut self,
        batch: u64,
        storage: &E,
        previous: ContainerAssignment,
        target: ContainerAssignment,
        reason: SwapReason,
    ) -> SwapOutcome {
        self.phase = SwapPhase::Swapping;
        let result = {
            let _paused = InsertionChecksPaused::new(storage);
            storage.apply_swap(&target)
        };
        match result {
            Ok(()) => {
                self.state.swaps_done += 1;
                self.state.first_switch.get_or_insert(target);
                info!(
                    batch,
                    from = %previous,
                    to = %target,
                    swaps_done = self.state.swaps_done,
                    "hotswap.swap.applied"
                );
                SwapOutcome {
                    batch,
                    swapped: true,
                    assignment: target,
                    reason,
                }
            }
            Err(err) => {
                warn!(batch, to = %target, error = %err, "hotswap.swap.failed");
                self.skip(
                    batch,
                    previous,
                    SkipReason::SwapFailed {
                        message: err.to_string(),
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_is_capped_by_remaining_batches() {
        assert_eq!(amortization_horizon(5, Some(100), 10), 5);
        assert_eq!(amortization_horizon(5, Some(12), 10), 2);
        assert_eq!(amortization_horizon(5, Some(10), 10), 0);
        assert_eq!(amortization_horizon(5, Some(3), 10), 0);
        assert_eq!(amortization_horizon(5, None, 10), 0);
    }

    #[test]
    fn negative_budget_is_unlimited() {
        assert!(!budget_exhausted(-1, u64::MAX));
        assert!(budget_exhausted(0, 0));
        assert!(!budget_exhausted(2, 1));
        assert!(budget_exhausted(2, 2));
    }

    #[test]
    fn warmup_rounds_down() {
        assert_eq!(warmup_batches(0.5, 5), 2);
        assert_eq!(warmup_batches(0.0, 5), 0);
        assert_eq!(warmup_batches(1.0, 3), 3);
    }

    #[test]
    fn efficiency_is_strict() {
        let costs = SwapCosts {
            current: CostVector::new(10.0, 0.0),
            alternative: CostVector::new(6.0, 0.0),
            swap: CostVector::new(4.0, 0.0),
        };
        assert!(!costs.is_efficient(&CostOrdering::Lexicographic));
        let cheaper = SwapCosts {
            swap: CostVector::new(3.9, 0.0),
            ..costs
        };
        assert!(cheaper.is_efficient(&CostOrdering::Lexicographic));
    }

    #[test]
    fn infinite_costs_never_swap() {
        let costs = SwapCosts {
            current: CostVector::INFINITE,
            alternative: CostVector::INFINITE,
            swap: CostVector::ZERO,
        };
        assert!(!costs.is_efficient(&CostOrdering::Lexicographic));
    }

    #[test]
    fn reset_keeps_manual_schedule() {
        let mut controller = SwapController::new(SwapPolicy::from(&HotSwapConfig::default()));
        controller
            .schedule_manual(3, ContainerAssignment::default())
            .unwrap();
        controller.finish_batch(2, Some(10));
        controller.reset();
        assert_eq!(controller.state().last_finished_batch, None);
        assert_eq!(controller.state().manual.len(), 1);
        assert_eq!(controller.phase(), SwapPhase::Idle);
    }
}
