use crate::error::Result;
use crate::types::{ContainerAssignment, StorageRole};

/// Contract the graph storage layer honours so the engine can replace its
/// containers.
///
/// `apply_swap` rebuilds every role whose implementation differs from the
/// current assignment. Elements and cross-role references must survive the
/// rebuild, readers must never observe a half-built state, and a failure must
/// leave the previous containers in place.
pub trait SwapExecutor {
    /// Assignment currently live in the store.
    fn current_assignment(&self) -> ContainerAssignment;

    /// Elements currently held across every container of `role`.
    fn element_count(&self, role: StorageRole) -> u64;

    /// Number of containers backing `role` (1 for graph-wide lists).
    fn container_count(&self, role: StorageRole) -> u64;

    /// Rebuilds the containers of every changed role.
    fn apply_swap(&self, target: &ContainerAssignment) -> Result<()>;

    /// Disables per-insertion duplicate checks.
    fn suspend_insertion_checks(&self);

    /// Puts back the check setting that was in force before the matching
    /// [`suspend_insertion_checks`](Self::suspend_insertion_checks).
    fn resume_insertion_checks(&self);
}

/// Remembers the insertion-check setting across nested suspensions.
#[derive(Copy, Clone, Debug, Default)]
pub struct ChecksSuspension {
    depth: u32,
    previous: bool,
}

impl ChecksSuspension {
    /// Records a suspension. Only the outermost one saves `current`.
    pub fn suspend(&mut self, current: bool) {
        if self.depth == 0 {
            self.previous = current;
        }
        self.depth = self.depth.saturating_add(1);
    }

    /// Ends a suspension. Returns the saved setting once the outermost one ends.
    pub fn resume(&mut self) -> Option<bool> {
        self.depth = self.depth.checked_sub(1)?;
        (self.depth == 0).then_some(self.previous)
    }

    /// Whether any suspension is open.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }
}

/// Keeps insertion checks suspended until dropped.
pub struct InsertionChecksPaused<'a, E: SwapExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: SwapExecutor + ?Sized> InsertionChecksPaused<'a, E> {
    /// Suspends checks on `executor`.
    pub fn new(executor: &'a E) -> Self {
        executor.suspend_insertion_checks();
        Self { executor }
    }
}

impl<E: SwapExecutor + ?Sized> Drop for InsertionChecksPaused<'_, E> {
    fn drop(&mut self) {
        self.executor.resume_insertion_checks();
    }
}

/// Batch position supplied by the run driver.
pub trait BatchClock {
    /// Total number of batches in the run, if known.
    fn total_batch_count(&self) -> Option<u64>;

    /// Index of the batch that just finished.
    fn current_batch_index(&self) -> u64;
}

/// Plain counter implementation of [`BatchClock`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunClock {
    batch: u64,
    total: Option<u64>,
}

impl RunClock {
    /// Starts at batch 0 of a run with `total` batches.
    pub fn new(total: Option<u64>) -> Self {
        Self { batch: 0, total }
    }

    /// Positions the clock at `batch`.
    pub fn at(batch: u64, total: Option<u64>) -> Self {
        Self { batch, total }
    }

    /// Moves to the next batch.
    pub fn advance(&mut self) {
        self.batch += 1;
    }
}

impl BatchClock for RunClock {
    fn total_batch_count(&self) -> Option<u64> {
        self.total
    }

    fn current_batch_index(&self) -> u64 {
        self.batch
    }
}
