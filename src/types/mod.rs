//! Closed taxonomies shared by the profiler, the cost model and the storage layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{HotSwapError, Result};

/// Identifier of a graph node.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a graph edge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical container slot inside the graph.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageRole {
    /// The global list of nodes.
    NodeList,
    /// The global list of edges.
    EdgeList,
    /// One node's list of incident edges.
    IncidentEdges,
    /// One node's list of adjacent nodes.
    AdjacentNodes,
}

impl StorageRole {
    /// Number of roles.
    pub const COUNT: usize = 4;
    /// Every role, in declaration order.
    pub const ALL: [StorageRole; StorageRole::COUNT] = [
        StorageRole::NodeList,
        StorageRole::EdgeList,
        StorageRole::IncidentEdges,
        StorageRole::AdjacentNodes,
    ];

    /// Dense index used for table lookups.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether a single graph-wide container backs this role.
    pub const fn is_global(self) -> bool {
        matches!(self, StorageRole::NodeList | StorageRole::EdgeList)
    }

    /// Stable snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageRole::NodeList => "node_list",
            StorageRole::EdgeList => "edge_list",
            StorageRole::IncidentEdges => "incident_edges",
            StorageRole::AdjacentNodes => "adjacent_nodes",
        }
    }
}

impl fmt::Display for StorageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageRole {
    type Err = HotSwapError;

    fn from_str(s: &str) -> Result<Self> {
        StorageRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| HotSwapError::config(format!("unknown storage role `{s}`")))
    }
}

/// Kind of container operation counted by the profiler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Creating an empty container.
    Initialize,
    /// Inserting one element.
    Add,
    /// Removing one element.
    Remove,
    /// Membership test.
    Contains,
    /// Positional or keyed lookup.
    Get,
    /// Full scan over the container.
    Iterate,
    /// Length query.
    Size,
}

impl OperationKind {
    /// Number of operation kinds.
    pub const COUNT: usize = 7;
    /// Every operation kind, in declaration order.
    pub const ALL: [OperationKind; OperationKind::COUNT] = [
        OperationKind::Initialize,
        OperationKind::Add,
        OperationKind::Remove,
        OperationKind::Contains,
        OperationKind::Get,
        OperationKind::Iterate,
        OperationKind::Size,
    ];

    /// Dense index used for table lookups.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Initialize => "initialize",
            OperationKind::Add => "add",
            OperationKind::Remove => "remove",
            OperationKind::Contains => "contains",
            OperationKind::Get => "get",
            OperationKind::Iterate => "iterate",
            OperationKind::Size => "size",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = HotSwapError;

    fn from_str(s: &str) -> Result<Self> {
        OperationKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| HotSwapError::config(format!("unknown operation kind `{s}`")))
    }
}

/// Identifier of a concrete container implementation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplKind {
    /// Unsorted vector with linear membership tests.
    Array,
    /// Sorted vector searched by bisection.
    SortedArray,
    /// Hash set.
    HashSet,
    /// Ordered tree set.
    #[serde(rename = "btree_set")]
    BTreeSet,
    /// Vector of optional slots addressed by element id.
    SlotArray,
}

impl ImplKind {
    /// Number of implementations.
    pub const COUNT: usize = 5;
    /// Every implementation, in declaration order.
    pub const ALL: [ImplKind; ImplKind::COUNT] = [
        ImplKind::Array,
        ImplKind::SortedArray,
        ImplKind::HashSet,
        ImplKind::BTreeSet,
        ImplKind::SlotArray,
    ];

    /// Dense index used for table lookups.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether this implementation can back `role`.
    ///
    /// Slot arrays are sized by the largest element id, which is only
    /// affordable for the graph-wide lists.
    pub const fn supports(self, role: StorageRole) -> bool {
        match self {
            ImplKind::SlotArray => role.is_global(),
            _ => true,
        }
    }

    /// Stable snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ImplKind::Array => "array",
            ImplKind::SortedArray => "sorted_array",
            ImplKind::HashSet => "hash_set",
            ImplKind::BTreeSet => "btree_set",
            ImplKind::SlotArray => "slot_array",
        }
    }
}

impl fmt::Display for ImplKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplKind {
    type Err = HotSwapError;

    fn from_str(s: &str) -> Result<Self> {
        ImplKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HotSwapError::config(format!("unknown container implementation `{s}`")))
    }
}

/// Roles whose implementation differs between two assignments.
pub type ChangedRoles = SmallVec<[StorageRole; StorageRole::COUNT]>;

/// One implementation per storage role.
///
/// The fixed-size layout makes partial assignments unrepresentable. The
/// derived `Ord` is the identity order used for deterministic tie-breaks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<StorageRole, ImplKind>",
    into = "BTreeMap<StorageRole, ImplKind>"
)]
pub struct ContainerAssignment([ImplKind; StorageRole::COUNT]);

impl ContainerAssignment {
    /// Assigns `kind` to every role.
    ///
    /// The result may name unsupported combinations; call
    /// [`ContainerAssignment::validate`] before handing it to the engine.
    pub const fn uniform(kind: ImplKind) -> Self {
        Self([kind; StorageRole::COUNT])
    }

    /// Returns a copy with `role` mapped to `kind`.
    pub fn with(mut self, role: StorageRole, kind: ImplKind) -> Self {
        self.0[role.index()] = kind;
        self
    }

    /// Implementation backing `role`.
    pub const fn get(&self, role: StorageRole) -> ImplKind {
        self.0[role.index()]
    }

    /// Maps `role` to `kind` in place.
    pub fn set(&mut self, role: StorageRole, kind: ImplKind) {
        self.0[role.index()] = kind;
    }

    /// Iterates `(role, impl)` pairs in role order.
    pub fn iter(&self) -> impl Iterator<Item = (StorageRole, ImplKind)> + '_ {
        StorageRole::ALL.into_iter().map(|role| (role, self.get(role)))
    }

    /// Roles whose implementation differs from `other`.
    pub fn changed_roles(&self, other: &ContainerAssignment) -> ChangedRoles {
        StorageRole::ALL
            .into_iter()
            .filter(|role| self.get(*role) != other.get(*role))
            .collect()
    }

    /// Number of roles that would be rebuilt when moving from `other` to `self`.
    pub fn role_changes(&self, other: &ContainerAssignment) -> usize {
        StorageRole::ALL
            .into_iter()
            .filter(|role| self.get(*role) != other.get(*role))
            .count()
    }

    /// Fails if any role is mapped to an implementation that cannot back it.
    pub fn validate(&self) -> Result<()> {
        for (role, kind) in self.iter() {
            if !kind.supports(role) {
                return Err(HotSwapError::UnsupportedImpl { role, kind });
            }
        }
        Ok(())
    }

    /// Builds an assignment from a map that must name every role.
    pub fn from_map(map: &BTreeMap<StorageRole, ImplKind>) -> Result<Self> {
        let mut slots = [ImplKind::Array; StorageRole::COUNT];
        for role in StorageRole::ALL {
            let kind = map.get(&role).ok_or_else(|| {
                HotSwapError::config(format!("assignment is missing the `{role}` role"))
            })?;
            slots[role.index()] = *kind;
        }
        let assignment = Self(slots);
        assignment.validate()?;
        Ok(assignment)
    }
}

impl Default for ContainerAssignment {
    fn default() -> Self {
        Self::uniform(ImplKind::Array)
    }
}

impl TryFrom<BTreeMap<StorageRole, ImplKind>> for ContainerAssignment {
    type Error = HotSwapError;

    fn try_from(map: BTreeMap<StorageRole, ImplKind>) -> Result<Self> {
        Self::from_map(&map)
    }
}

impl From<ContainerAssignment> for BTreeMap<StorageRole, ImplKind> {
    fn from(assignment: ContainerAssignment) -> Self {
        assignment.iter().collect()
    }
}

impl fmt::Display for ContainerAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (role, kind)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{role}={kind}")?;
        }
        Ok(())
    }
}
