#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};

use graphswap::cost::{CalibrationTable, Complexity, CostModel, CostRecord};
use graphswap::profile::ProfileEntry;
use graphswap::recommend::CandidateSpace;
use graphswap::storage::TraceStorage;
use graphswap::swap::{RunClock, SkipReason, SwapExecutor, SwapPhase, SwapReason};
use graphswap::{
    ContainerAssignment, HotSwapConfig, HotSwapEngine, HotSwapError, ImplKind, OperationKind,
    Result, StorageRole,
};

/// Array costs 10 per operation, hash sets cost 1; memory is free.
fn flat_model() -> CostModel {
    let mut table = CalibrationTable::new();
    for (kind, time) in [(ImplKind::Array, 10.0), (ImplKind::HashSet, 1.0)] {
        for op in OperationKind::ALL {
            table.insert(
                kind,
                op,
                CostRecord {
                    time: Complexity::constant(time),
                    memory: Complexity::constant(0.0),
                },
            );
        }
    }
    CostModel::new(table)
}

fn array() -> ContainerAssignment {
    ContainerAssignment::default()
}

fn hashed_edges() -> ContainerAssignment {
    array().with(StorageRole::EdgeList, ImplKind::HashSet)
}

fn two_candidates() -> CandidateSpace {
    CandidateSpace::Explicit {
        assignments: vec![array(), hashed_edges()],
    }
}

fn base_config() -> HotSwapConfig {
    HotSwapConfig::new()
        .window_size(3)
        .lower_bound(0.0)
        .amortization_batches(2)
        .max_swaps(-1)
        .candidates(two_candidates())
}

fn edge_adds(n: u64) -> ProfileEntry {
    ProfileEntry::new().with(StorageRole::EdgeList, OperationKind::Add, n)
}

/// Runs `batches` batches of 100 edge insertions and returns every outcome.
fn run_adds(
    engine: &mut HotSwapEngine,
    storage: &TraceStorage,
    batches: u64,
    total: Option<u64>,
) -> Vec<graphswap::swap::SwapOutcome> {
    (0..batches)
        .map(|batch| {
            storage.set_size(StorageRole::EdgeList, 1, 100 * (batch + 1));
            let clock = RunClock::at(batch, total);
            engine.record_profile(&clock, storage, edge_adds(100));
            engine.evaluate_swap(&clock, storage)
        })
        .collect()
}

#[test]
fn cheaper_alternative_is_adopted_once() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 5, Some(5));

    let first_swap = outcomes.iter().position(|o| o.swapped).unwrap();
    assert!(first_swap <= 2, "swapped only at batch {first_swap}");
    assert!(matches!(outcomes[first_swap].reason, SwapReason::Efficient(_)));
    assert_eq!(engine.swaps_done(), 1);
    assert_eq!(engine.first_switch(), Some(hashed_edges()));
    assert_eq!(storage.current_assignment(), hashed_edges());
    assert_eq!(outcomes.iter().filter(|o| o.swapped).count(), 1);
}

#[test]
fn zero_budget_never_swaps() {
    let mut engine = HotSwapEngine::new(base_config().max_swaps(0), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 5, Some(5));

    assert!(outcomes.iter().all(|o| !o.swapped));
    assert!(outcomes
        .iter()
        .all(|o| o.reason == SwapReason::Skipped(SkipReason::BudgetExhausted)));
    assert_eq!(storage.swaps_applied(), 0);
    assert_eq!(engine.first_switch(), None);
}

#[test]
fn unknown_run_length_gives_no_horizon() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 5, None);

    assert!(outcomes
        .iter()
        .all(|o| o.reason == SwapReason::Skipped(SkipReason::NoEfficientAlternative)));
    assert_eq!(engine.swaps_done(), 0);
}

#[test]
fn idle_batches_never_pay_for_a_swap() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    storage.set_size(StorageRole::EdgeList, 1, 500);
    for batch in 0..5 {
        let clock = RunClock::at(batch, Some(5));
        engine.record_profile(&clock, &storage, ProfileEntry::new());
        let outcome = engine.evaluate_swap(&clock, &storage);
        assert!(!outcome.swapped);
    }
    assert_eq!(engine.swaps_done(), 0);
}

#[test]
fn warm_up_blocks_early_swaps() {
    let config = base_config().lower_bound(1.0);
    let mut engine = HotSwapEngine::new(config, flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 6, Some(6));

    for outcome in &outcomes[..3] {
        assert_eq!(
            outcome.reason,
            SwapReason::Skipped(SkipReason::WarmupNotElapsed { until: 3 })
        );
    }
    assert!(outcomes[3].swapped);
    assert_eq!(engine.swaps_done(), 1);
}

#[test]
fn manual_swap_overrides_budget_and_warm_up() {
    let config = base_config().lower_bound(1.0).max_swaps(1);
    let mut engine = HotSwapEngine::new(config, flat_model()).unwrap();
    let target = ContainerAssignment::uniform(ImplKind::BTreeSet);
    engine.schedule_manual_swap(1, target).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 6, Some(6));

    assert!(outcomes[1].swapped);
    assert_eq!(outcomes[1].reason, SwapReason::Manual);
    assert_eq!(outcomes[1].phase(), SwapPhase::Swapping);
    assert_eq!(engine.first_switch(), Some(target));
    // The manual swap consumed the only budgeted swap.
    assert_eq!(engine.swaps_done(), 1);
    assert!(outcomes[3..]
        .iter()
        .all(|o| o.reason == SwapReason::Skipped(SkipReason::BudgetExhausted)));
    assert_eq!(storage.current_assignment(), target);
}

#[test]
fn manual_swap_from_config_and_already_active() {
    let config = base_config().max_swaps(0).manual_swap(0, array());
    let mut engine = HotSwapEngine::new(config, flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 1, Some(3));
    assert_eq!(
        outcomes[0].reason,
        SwapReason::Skipped(SkipReason::ManualAlreadyActive)
    );
    assert_eq!(engine.swaps_done(), 0);
}

#[test]
fn manual_schedule_rejects_unsupported_assignment() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let err = engine
        .schedule_manual_swap(2, ContainerAssignment::uniform(ImplKind::SlotArray))
        .unwrap_err();
    assert!(matches!(err, HotSwapError::UnsupportedImpl { .. }));
}

#[test]
fn repeated_evaluation_is_idempotent() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 2, Some(5));
    assert!(outcomes[1].swapped);

    let clock = RunClock::at(1, Some(5));
    let again = engine.evaluate_swap(&clock, &storage);
    assert!(!again.swapped);
    assert_eq!(again.assignment, hashed_edges());
    assert_eq!(engine.swaps_done(), 1);
    assert_eq!(storage.swaps_applied(), 1);
}

#[test]
fn window_holds_at_most_configured_batches() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    run_adds(&mut engine, &storage, 10, Some(10));
    let window = engine.tracker().window();
    assert_eq!(window.len(), 3);
    assert_eq!(window.batches().collect::<Vec<_>>(), vec![7, 8, 9]);
}

#[test]
fn first_batch_is_ranked_but_kept_out_of_history() {
    let config = HotSwapConfig::new().candidates(two_candidates());
    assert!(!config.include_first_batch);
    let mut engine = HotSwapEngine::new(config, flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    storage.set_size(StorageRole::EdgeList, 1, 100);
    engine.record_profile(&RunClock::at(0, Some(5)), &storage, edge_adds(100));

    assert_eq!(engine.tracker().window().batches().collect::<Vec<_>>(), vec![0]);
    assert_eq!(engine.profiler().occupied(), 0);
    let ranked = engine.ranked_alternatives(&array());
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].assignment, hashed_edges());
    assert_eq!(ranked[0].batch, 0);
}

#[test]
fn exhausted_budget_freezes_the_window() {
    let mut engine = HotSwapEngine::new(base_config().max_swaps(1), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 8, Some(8));
    let swapped_at = outcomes.iter().position(|o| o.swapped).unwrap() as u64;
    assert_eq!(engine.swaps_done(), 1);

    let batches: Vec<u64> = engine.tracker().window().batches().collect();
    assert_eq!(batches.last(), Some(&swapped_at));
    let ranked = engine.ranked_alternatives(&hashed_edges());
    assert!(!ranked.is_empty());
    assert!(ranked.iter().all(|entry| entry.batch <= swapped_at));
}

#[test]
fn insertion_checks_are_restored_after_swap() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    let outcomes = run_adds(&mut engine, &storage, 3, Some(5));
    assert!(outcomes.iter().any(|o| o.swapped));
    assert!(storage.checks_enabled());
}

#[test]
fn reset_clears_statistics_but_keeps_schedule() {
    let mut engine = HotSwapEngine::new(base_config(), flat_model()).unwrap();
    engine.schedule_manual_swap(40, hashed_edges()).unwrap();
    let storage = TraceStorage::new(array()).unwrap();
    run_adds(&mut engine, &storage, 3, Some(5));
    assert_eq!(engine.swaps_done(), 1);

    engine.reset();
    assert_eq!(engine.swaps_done(), 0);
    assert_eq!(engine.first_switch(), None);
    assert!(engine.tracker().window().is_empty());
    assert_eq!(engine.profiler().occupied(), 0);
    assert_eq!(engine.state().manual.get(&40), Some(&hashed_edges()));
}

struct RejectingStorage {
    checks: AtomicBool,
    suspended_during_swap: AtomicBool,
}

impl SwapExecutor for RejectingStorage {
    fn current_assignment(&self) -> ContainerAssignment {
        array()
    }

    fn element_count(&self, _role: StorageRole) -> u64 {
        100
    }

    fn container_count(&self, _role: StorageRole) -> u64 {
        1
    }

    fn apply_swap(&self, _target: &ContainerAssignment) -> Result<()> {
        self.suspended_during_swap
            .store(!self.checks.load(Ordering::SeqCst), Ordering::SeqCst);
        Err(HotSwapError::SwapFailed("out of memory".into()))
    }

    fn suspend_insertion_checks(&self) {
        self.checks.store(false, Ordering::SeqCst);
    }

    fn resume_insertion_checks(&self) {
        self.checks.store(true, Ordering::SeqCst);
    }
}

#[test]
fn failed_swap_keeps_assignment_and_budget() {
    let mut engine = HotSwapEngine::new(base_config().max_swaps(1), flat_model()).unwrap();
    let storage = RejectingStorage {
        checks: AtomicBool::new(true),
        suspended_during_swap: AtomicBool::new(false),
    };
    let mut failures = 0;
    for batch in 0..4 {
        let clock = RunClock::at(batch, Some(10));
        engine.record_profile(&clock, &storage, edge_adds(100));
        let outcome = engine.evaluate_swap(&clock, &storage);
        assert!(!outcome.swapped);
        assert_eq!(outcome.assignment, array());
        if let SwapReason::Skipped(SkipReason::SwapFailed { message }) = &outcome.reason {
            assert!(message.contains("out of memory"));
            failures += 1;
        }
    }
    // Budget was never consumed, so every efficient batch retried.
    assert_eq!(failures, 3);
    assert_eq!(engine.swaps_done(), 0);
    assert!(storage.suspended_during_swap.load(Ordering::SeqCst));
    assert!(storage.checks.load(Ordering::SeqCst));
}
