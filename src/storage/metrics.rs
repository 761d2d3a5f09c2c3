use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::profile::ProfileEntry;
use crate::types::{OperationKind, StorageRole};

/// Sink for container accesses performed by the graph store.
///
/// The store reports every logical container operation here; the hot-swap
/// engine reads the counts back once per batch.
pub trait AccessMetrics: Send + Sync {
    /// Records `count` operations of kind `op` against `role`.
    fn record(&self, role: StorageRole, op: OperationKind, count: u64);
}

/// A no-op implementation of [`AccessMetrics`] that discards all accesses.
#[derive(Default)]
pub struct NoopMetrics;

impl AccessMetrics for NoopMetrics {
    fn record(&self, _role: StorageRole, _op: OperationKind, _count: u64) {}
}

/// Thread-safe per-(role, operation) counters.
///
/// The graph store bumps these from whichever thread applies a mutation;
/// [`AccessRecorder::snapshot`] freezes them into a [`ProfileEntry`] at the
/// end of a batch.
#[derive(Default)]
pub struct AccessRecorder {
    counters: [[AtomicU64; OperationKind::COUNT]; StorageRole::COUNT],
}

impl AccessRecorder {
    /// Creates a recorder with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts, optionally resetting them to zero.
    pub fn snapshot(&self, reset: bool) -> ProfileEntry {
        let load = |counter: &AtomicU64| {
            if reset {
                counter.swap(0, Ordering::Relaxed)
            } else {
                counter.load(Ordering::Relaxed)
            }
        };
        let mut entry = ProfileEntry::new();
        for role in StorageRole::ALL {
            for op in OperationKind::ALL {
                entry.record(role, op, load(&self.counters[role.index()][op.index()]));
            }
        }
        entry
    }

    /// Zeroes every counter.
    pub fn clear(&self) {
        self.counters
            .iter()
            .flatten()
            .for_each(|counter| counter.store(0, Ordering::Relaxed));
    }
}

impl AccessMetrics for AccessRecorder {
    fn record(&self, role: StorageRole, op: OperationKind, count: u64) {
        if count == 0 {
            return;
        }
        self.counters[role.index()][op.index()].fetch_add(count, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn AccessMetrics> {
    Arc::new(NoopMetrics)
}
