use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{HotSwapError, Result};
use crate::profile::ProfileEntry;
use crate::types::StorageRole;

/// Size observation for one role: how many containers back it and how
/// many elements a container holds on average.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSize {
    /// Running mean of elements per container.
    pub mean_size: f64,
    /// Number of containers last observed for the role.
    pub containers: u64,
}

impl RoleSize {
    /// Elements that a full rebuild of the role would reinsert.
    pub fn total_elements(&self) -> f64 {
        self.containers as f64 * self.mean_size
    }
}

/// Per-role size view handed to the cost model.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSizes([RoleSize; StorageRole::COUNT]);

impl RoleSizes {
    /// Size observation for `role`.
    pub fn get(&self, role: StorageRole) -> RoleSize {
        self.0[role.index()]
    }

    /// Returns a copy with `role` set to the given observation.
    pub fn with(mut self, role: StorageRole, mean_size: f64, containers: u64) -> Self {
        self.0[role.index()] = RoleSize {
            mean_size,
            containers,
        };
        self
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct SizeTracker {
    samples: u64,
    mean: f64,
    containers: u64,
}

impl SizeTracker {
    fn observe(&mut self, containers: u64, elements: u64) {
        let per_container = if containers == 0 {
            0.0
        } else {
            elements as f64 / containers as f64
        };
        self.samples += 1;
        self.mean += (per_container - self.mean) / self.samples as f64;
        self.containers = containers;
    }
}

/// Result of summing the most recent history slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulated {
    /// Element-wise sum of the occupied slots.
    pub entry: ProfileEntry,
    /// Number of occupied slots that contributed to `entry`.
    pub occupied: usize,
}

impl Accumulated {
    /// Scale factor that extrapolates the accumulated counts over `horizon`
    /// batches; zero when nothing was accumulated.
    pub fn prefactor(&self, horizon: usize) -> f64 {
        if self.occupied == 0 {
            return 0.0;
        }
        horizon as f64 / self.occupied as f64
    }
}

/// Fixed-capacity circular history of closed batch profiles.
#[derive(Debug)]
pub struct AccessProfiler {
    slots: Vec<Option<ProfileEntry>>,
    cursor: usize,
    sizes: [SizeTracker; StorageRole::COUNT],
}

impl AccessProfiler {
    /// Creates a profiler that retains `capacity` batches.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(HotSwapError::config(
                "access history capacity must be positive",
            ));
        }
        Ok(Self {
            slots: vec![None; capacity],
            cursor: 0,
            sizes: Default::default(),
        })
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently holding a profile.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Appends a closed batch profile, overwriting the oldest slot when full.
    pub fn record_batch(&mut self, entry: ProfileEntry) {
        trace!(slot = self.cursor, total = entry.total(), "profiler.record");
        self.push(Some(entry));
    }

    /// Advances the ring without storing a profile for this batch.
    pub fn skip_batch(&mut self) {
        trace!(slot = self.cursor, "profiler.skip");
        self.push(None);
    }

    fn push(&mut self, slot: Option<ProfileEntry>) {
        self.slots[self.cursor] = slot;
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Most recently recorded profile, if its slot is occupied.
    pub fn latest(&self) -> Option<&ProfileEntry> {
        let idx = (self.cursor + self.slots.len() - 1) % self.slots.len();
        self.slots[idx].as_ref()
    }

    /// Sums the most recent `k` slots (bounded by capacity).
    pub fn accumulate(&self, k: usize) -> Accumulated {
        let len = self.slots.len();
        let mut acc = Accumulated::default();
        for back in 1..=k.min(len) {
            let idx = (self.cursor + len - back) % len;
            if let Some(entry) = &self.slots[idx] {
                acc.entry += entry;
                acc.occupied += 1;
            }
        }
        acc
    }

    /// Folds one size sample for `role` into its running mean.
    pub fn observe_size(&mut self, role: StorageRole, containers: u64, elements: u64) {
        self.sizes[role.index()].observe(containers, elements);
    }

    /// Current size view for every role.
    pub fn sizes(&self) -> RoleSizes {
        let mut sizes = RoleSizes::default();
        for role in StorageRole::ALL {
            let tracker = self.sizes[role.index()];
            sizes = sizes.with(role, tracker.mean, tracker.containers);
        }
        sizes
    }

    /// Drops every stored profile and size sample.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.cursor = 0;
        self.sizes = Default::default();
    }
}
