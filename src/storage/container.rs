use std::collections::{btree_set, BTreeSet};
use std::hash::Hash;
use std::{iter, slice};

use rustc_hash::FxHashSet;

use crate::types::{EdgeId, ImplKind, NodeId};

/// Slot arrays only hold ids below this bound.
pub const MAX_SLOT_ID: u64 = 1 << 22;

/// Element stored in a container: a small copyable id.
pub trait ElementKey: Copy + Ord + Hash + Send + Sync + 'static {
    /// Dense slot used by [`Container::Slots`].
    fn slot(self) -> u64;
}

impl ElementKey for NodeId {
    fn slot(self) -> u64 {
        self.0
    }
}

impl ElementKey for EdgeId {
    fn slot(self) -> u64 {
        self.0
    }
}

impl ElementKey for u64 {
    fn slot(self) -> u64 {
        self
    }
}

fn slot_index<T: ElementKey>(value: T) -> Option<usize> {
    let slot = value.slot();
    if slot < MAX_SLOT_ID {
        usize::try_from(slot).ok()
    } else {
        None
    }
}

/// A set of element ids backed by one of the [`ImplKind`] strategies.
#[derive(Clone, Debug)]
pub enum Container<T: ElementKey> {
    /// Unsorted vector.
    Array(Vec<T>),
    /// Vector kept in ascending order.
    SortedArray(Vec<T>),
    /// Hash set.
    Hash(FxHashSet<T>),
    /// Ordered tree set.
    Tree(BTreeSet<T>),
    /// Optional slots indexed by [`ElementKey::slot`].
    Slots {
        /// Slot storage; grows to the largest id seen.
        slots: Vec<Option<T>>,
        /// Number of occupied slots.
        len: usize,
    },
}

impl<T: ElementKey> Container<T> {
    /// Creates an empty container of the given kind.
    pub fn new(kind: ImplKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    /// Creates an empty container sized for `capacity` elements.
    pub fn with_capacity(kind: ImplKind, capacity: usize) -> Self {
        match kind {
            ImplKind::Array => Container::Array(Vec::with_capacity(capacity)),
            ImplKind::SortedArray => Container::SortedArray(Vec::with_capacity(capacity)),
            ImplKind::HashSet => {
                let mut set = FxHashSet::default();
                set.reserve(capacity);
                Container::Hash(set)
            }
            ImplKind::BTreeSet => Container::Tree(BTreeSet::new()),
            ImplKind::SlotArray => Container::Slots {
                slots: Vec::with_capacity(capacity),
                len: 0,
            },
        }
    }

    /// Implementation behind this container.
    pub fn kind(&self) -> ImplKind {
        match self {
            Container::Array(_) => ImplKind::Array,
            Container::SortedArray(_) => ImplKind::SortedArray,
            Container::Hash(_) => ImplKind::HashSet,
            Container::Tree(_) => ImplKind::BTreeSet,
            Container::Slots { .. } => ImplKind::SlotArray,
        }
    }

    /// Whether `value` can be stored here. Only slot arrays are bounded.
    pub fn accepts(&self, value: T) -> bool {
        !matches!(self, Container::Slots { .. }) || slot_index(value).is_some()
    }

    /// Whether every element would fit in a container of `kind`.
    pub fn fits_in(&self, kind: ImplKind) -> bool {
        kind != ImplKind::SlotArray || self.iter().all(|value| slot_index(value).is_some())
    }

    /// Inserts `value`. With `check_duplicates` off the caller guarantees
    /// `value` is absent, which lets array-backed variants skip the scan.
    /// Slot arrays return `false` for ids at or past [`MAX_SLOT_ID`]; see
    /// [`Container::accepts`].
    pub fn insert(&mut self, value: T, check_duplicates: bool) -> bool {
        match self {
            Container::Array(items) => {
                if check_duplicates && items.contains(&value) {
                    return false;
                }
                items.push(value);
                true
            }
            Container::SortedArray(items) => match items.binary_search(&value) {
                Ok(_) if check_duplicates => false,
                Ok(pos) | Err(pos) => {
                    items.insert(pos, value);
                    true
                }
            },
            Container::Hash(set) => set.insert(value),
            Container::Tree(set) => set.insert(value),
            Container::Slots { slots, len } => {
                let Some(idx) = slot_index(value) else {
                    return false;
                };
                if idx >= slots.len() {
                    slots.resize(idx + 1, None);
                }
                if slots[idx].is_some() {
                    return false;
                }
                slots[idx] = Some(value);
                *len += 1;
                true
            }
        }
    }

    /// Removes `value`, returning whether it was present.
    pub fn remove(&mut self, value: T) -> bool {
        match self {
            Container::Array(items) => match items.iter().position(|item| *item == value) {
                Some(pos) => {
                    items.swap_remove(pos);
                    true
                }
                None => false,
            },
            Container::SortedArray(items) => match items.binary_search(&value) {
                Ok(pos) => {
                    items.remove(pos);
                    true
                }
                Err(_) => false,
            },
            Container::Hash(set) => set.remove(&value),
            Container::Tree(set) => set.remove(&value),
            Container::Slots { slots, len } => {
                let Some(idx) = slot_index(value) else {
                    return false;
                };
                let Some(slot) = slots.get_mut(idx) else {
                    return false;
                };
                if slot.take().is_some() {
                    *len -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Membership test.
    pub fn contains(&self, value: T) -> bool {
        match self {
            Container::Array(items) => items.contains(&value),
            Container::SortedArray(items) => items.binary_search(&value).is_ok(),
            Container::Hash(set) => set.contains(&value),
            Container::Tree(set) => set.contains(&value),
            Container::Slots { slots, .. } => {
                let slot = match slot_index(value) {
                    Some(idx) => slots.get(idx),
                    None => None,
                };
                matches!(slot, Some(Some(item)) if *item == value)
            }
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Container::Array(items) | Container::SortedArray(items) => items.len(),
            Container::Hash(set) => set.len(),
            Container::Tree(set) => set.len(),
            Container::Slots { len, .. } => *len,
        }
    }

    /// Whether the container holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the elements. Order is implementation-defined.
    pub fn iter(&self) -> Iter<'_, T> {
        match self {
            Container::Array(items) | Container::SortedArray(items) => Iter::Slice(items.iter()),
            Container::Hash(set) => Iter::Hash(set.iter()),
            Container::Tree(set) => Iter::Tree(set.iter()),
            Container::Slots { slots, .. } => Iter::Slots(slots.iter().flatten()),
        }
    }

    /// Copies every element into a fresh container of `kind`.
    pub fn rebuilt_as(&self, kind: ImplKind, check_duplicates: bool) -> Container<T> {
        if kind == ImplKind::SortedArray && !check_duplicates {
            let mut items: Vec<T> = self.iter().collect();
            items.sort_unstable();
            return Container::SortedArray(items);
        }
        let mut next = Container::with_capacity(kind, self.len());
        for value in self.iter() {
            next.insert(value, check_duplicates);
        }
        next
    }
}

/// Iterator over a [`Container`].
pub enum Iter<'a, T> {
    /// Array-backed variants.
    Slice(slice::Iter<'a, T>),
    /// Hash set.
    Hash(std::collections::hash_set::Iter<'a, T>),
    /// Tree set.
    Tree(btree_set::Iter<'a, T>),
    /// Occupied slots only.
    Slots(iter::Flatten<slice::Iter<'a, Option<T>>>),
}

impl<T: Copy> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            Iter::Slice(it) => it.next().copied(),
            Iter::Hash(it) => it.next().copied(),
            Iter::Tree(it) => it.next().copied(),
            Iter::Slots(it) => it.next().copied(),
        }
    }
}
