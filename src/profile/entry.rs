use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::types::{OperationKind, StorageRole};

type CountTable = [[u64; OperationKind::COUNT]; StorageRole::COUNT];

/// Serialized form: role -> operation -> count, zero counts omitted.
pub type ProfileMap = BTreeMap<StorageRole, BTreeMap<OperationKind, u64>>;

/// Operation counts observed for every storage role during one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProfileMap", into = "ProfileMap")]
pub struct ProfileEntry {
    counts: CountTable,
}

impl ProfileEntry {
    /// Creates an entry with every count at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count recorded for `(role, op)`.
    pub fn count(&self, role: StorageRole, op: OperationKind) -> u64 {
        self.counts[role.index()][op.index()]
    }

    /// Adds `n` to `(role, op)`, saturating at `u64::MAX`.
    pub fn record(&mut self, role: StorageRole, op: OperationKind, n: u64) {
        let slot = &mut self.counts[role.index()][op.index()];
        *slot = slot.saturating_add(n);
    }

    /// Builder-style variant of [`ProfileEntry::record`].
    pub fn with(mut self, role: StorageRole, op: OperationKind, n: u64) -> Self {
        self.record(role, op, n);
        self
    }

    /// Sum of every count in the entry.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .flatten()
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    /// Sum of the counts recorded against `role`.
    pub fn role_total(&self, role: StorageRole) -> u64 {
        self.counts[role.index()]
            .iter()
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    /// Whether no operation was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().flatten().all(|n| *n == 0)
    }

    /// Iterates the non-zero `(role, op, count)` triples.
    pub fn nonzero(&self) -> impl Iterator<Item = (StorageRole, OperationKind, u64)> + '_ {
        StorageRole::ALL.into_iter().flat_map(move |role| {
            OperationKind::ALL.into_iter().filter_map(move |op| {
                let n = self.count(role, op);
                (n > 0).then_some((role, op, n))
            })
        })
    }
}

impl AddAssign<&ProfileEntry> for ProfileEntry {
    fn add_assign(&mut self, rhs: &ProfileEntry) {
        for (row, other) in self.counts.iter_mut().zip(rhs.counts.iter()) {
            for (slot, n) in row.iter_mut().zip(other.iter()) {
                *slot = slot.saturating_add(*n);
            }
        }
    }
}

impl Add<&ProfileEntry> for ProfileEntry {
    type Output = ProfileEntry;

    fn add(mut self, rhs: &ProfileEntry) -> ProfileEntry {
        self += rhs;
        self
    }
}

impl From<ProfileMap> for ProfileEntry {
    fn from(map: ProfileMap) -> Self {
        let mut entry = ProfileEntry::new();
        for (role, ops) in map {
            for (op, n) in ops {
                entry.record(role, op, n);
            }
        }
        entry
    }
}

impl From<ProfileEntry> for ProfileMap {
    fn from(entry: ProfileEntry) -> Self {
        let mut map = ProfileMap::new();
        for (role, op, n) in entry.nonzero() {
            map.entry(role).or_default().insert(op, n);
        }
        map
    }
}
