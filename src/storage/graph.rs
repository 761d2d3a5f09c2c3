use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{HotSwapError, Result};
use crate::swap::{ChecksSuspension, SwapExecutor};
use crate::types::{ContainerAssignment, EdgeId, ImplKind, NodeId, OperationKind, StorageRole};

use super::container::{Container, MAX_SLOT_ID};
use super::metrics::AccessMetrics;
use super::options::GraphStoreOptions;

/// In-memory undirected graph whose containers follow a [`ContainerAssignment`].
///
/// Nodes and edges are addressed by stable ids, so cross-role references
/// (edge endpoints, adjacency entries) survive any container swap untouched.
pub struct GraphStore {
    inner: RwLock<GraphInner>,
    check_duplicates: AtomicBool,
    suspension: Mutex<ChecksSuspension>,
    metrics: Arc<dyn AccessMetrics>,
    max_rebuild_elements: Option<u64>,
}

struct GraphInner {
    assignment: ContainerAssignment,
    nodes: Container<NodeId>,
    edges: Container<EdgeId>,
    endpoints: FxHashMap<EdgeId, (NodeId, NodeId)>,
    incident: FxHashMap<NodeId, Container<EdgeId>>,
    adjacent: FxHashMap<NodeId, Container<NodeId>>,
    next_edge: u64,
}

#[derive(Default)]
struct Rebuilt {
    nodes: Option<Container<NodeId>>,
    edges: Option<Container<EdgeId>>,
    incident: Option<FxHashMap<NodeId, Container<EdgeId>>>,
    adjacent: Option<FxHashMap<NodeId, Container<NodeId>>>,
}

impl GraphStore {
    /// Creates an empty store.
    pub fn open(options: GraphStoreOptions) -> Result<Self> {
        options.assignment.validate()?;
        let assignment = options.assignment;
        Ok(Self {
            inner: RwLock::new(GraphInner {
                assignment,
                nodes: Container::new(assignment.get(StorageRole::NodeList)),
                edges: Container::new(assignment.get(StorageRole::EdgeList)),
                endpoints: FxHashMap::default(),
                incident: FxHashMap::default(),
                adjacent: FxHashMap::default(),
                next_edge: 0,
            }),
            check_duplicates: AtomicBool::new(options.check_duplicates),
            suspension: Mutex::new(ChecksSuspension::default()),
            metrics: options.metrics,
            max_rebuild_elements: options.max_rebuild_elements,
        })
    }

    fn touch(&self, role: StorageRole, op: OperationKind) {
        self.metrics.record(role, op, 1);
    }

    /// Whether insertions currently scan for duplicates.
    pub fn checks_enabled(&self) -> bool {
        self.check_duplicates.load(Ordering::Acquire)
    }

    /// Adds `node`; returns `false` if it already exists.
    ///
    /// Fails with [`HotSwapError::SlotOutOfRange`] when the node list is a
    /// slot array and `node` is past its bound.
    pub fn add_node(&self, node: NodeId) -> Result<bool> {
        let check = self.checks_enabled();
        let mut g = self.inner.write();
        if !g.nodes.accepts(node) {
            return Err(HotSwapError::SlotOutOfRange {
                role: StorageRole::NodeList,
                id: node.0,
            });
        }
        if check {
            self.touch(StorageRole::NodeList, OperationKind::Contains);
        }
        if !g.nodes.insert(node, check) {
            return Ok(false);
        }
        self.touch(StorageRole::NodeList, OperationKind::Add);
        let incident = Container::new(g.assignment.get(StorageRole::IncidentEdges));
        let adjacent = Container::new(g.assignment.get(StorageRole::AdjacentNodes));
        g.incident.insert(node, incident);
        g.adjacent.insert(node, adjacent);
        self.touch(StorageRole::IncidentEdges, OperationKind::Initialize);
        self.touch(StorageRole::AdjacentNodes, OperationKind::Initialize);
        Ok(true)
    }

    /// Removes `node` and every edge touching it.
    pub fn remove_node(&self, node: NodeId) -> bool {
        let mut g = self.inner.write();
        self.touch(StorageRole::NodeList, OperationKind::Contains);
        if !g.nodes.contains(node) {
            return false;
        }
        let edges: Vec<EdgeId> = match g.incident.get(&node) {
            Some(list) => {
                self.touch(StorageRole::IncidentEdges, OperationKind::Iterate);
                list.iter().collect()
            }
            None => Vec::new(),
        };
        for edge in edges {
            self.remove_edge_locked(&mut g, edge);
        }
        g.incident.remove(&node);
        g.adjacent.remove(&node);
        g.nodes.remove(node);
        self.touch(StorageRole::NodeList, OperationKind::Remove);
        true
    }

    /// Connects `src` and `dst`. Returns `None` when they are already adjacent.
    pub fn add_edge(&self, src: NodeId, dst: NodeId) -> Result<Option<EdgeId>> {
        let mut g = self.inner.write();
        self.touch(StorageRole::NodeList, OperationKind::Contains);
        self.touch(StorageRole::NodeList, OperationKind::Contains);
        if !g.nodes.contains(src) || !g.nodes.contains(dst) {
            return Err(HotSwapError::NotFound("node"));
        }
        self.touch(StorageRole::AdjacentNodes, OperationKind::Contains);
        if g.adjacent.get(&src).is_some_and(|list| list.contains(dst)) {
            return Ok(None);
        }

        let edge = EdgeId(g.next_edge);
        if !g.edges.accepts(edge) {
            return Err(HotSwapError::SlotOutOfRange {
                role: StorageRole::EdgeList,
                id: edge.0,
            });
        }
        g.next_edge += 1;
        g.edges.insert(edge, false);
        g.endpoints.insert(edge, (src, dst));
        self.touch(StorageRole::EdgeList, OperationKind::Add);

        let ends: &[NodeId] = if src == dst { &[src] } else { &[src, dst] };
        for &end in ends {
            let other = if end == src { dst } else { src };
            if let Some(list) = g.incident.get_mut(&end) {
                list.insert(edge, false);
                self.touch(StorageRole::IncidentEdges, OperationKind::Add);
            }
            if let Some(list) = g.adjacent.get_mut(&end) {
                list.insert(other, false);
                self.touch(StorageRole::AdjacentNodes, OperationKind::Add);
            }
        }
        Ok(Some(edge))
    }

    /// Removes `edge`; returns `false` if it does not exist.
    pub fn remove_edge(&self, edge: EdgeId) -> bool {
        let mut g = self.inner.write();
        self.touch(StorageRole::EdgeList, OperationKind::Contains);
        if !g.edges.contains(edge) {
            return false;
        }
        self.remove_edge_locked(&mut g, edge)
    }

    fn remove_edge_locked(&self, g: &mut GraphInner, edge: EdgeId) -> bool {
        let Some((src, dst)) = g.endpoints.remove(&edge) else {
            return false;
        };
        g.edges.remove(edge);
        self.touch(StorageRole::EdgeList, OperationKind::Remove);
        let ends: &[NodeId] = if src == dst { &[src] } else { &[src, dst] };
        for &end in ends {
            let other = if end == src { dst } else { src };
            if let Some(list) = g.incident.get_mut(&end) {
                list.remove(edge);
                self.touch(StorageRole::IncidentEdges, OperationKind::Remove);
            }
            if let Some(list) = g.adjacent.get_mut(&end) {
                list.remove(other);
                self.touch(StorageRole::AdjacentNodes, OperationKind::Remove);
            }
        }
        true
    }

    /// Whether `node` exists.
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.touch(StorageRole::NodeList, OperationKind::Contains);
        self.inner.read().nodes.contains(node)
    }

    /// Whether `edge` exists.
    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.touch(StorageRole::EdgeList, OperationKind::Contains);
        self.inner.read().edges.contains(edge)
    }

    /// Endpoints of `edge` in insertion order.
    pub fn endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.touch(StorageRole::EdgeList, OperationKind::Get);
        let g = self.inner.read();
        if !g.edges.contains(edge) {
            return None;
        }
        g.endpoints.get(&edge).copied()
    }

    /// Nodes adjacent to `node`.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.touch(StorageRole::AdjacentNodes, OperationKind::Iterate);
        self.inner
            .read()
            .adjacent
            .get(&node)
            .map(|list| list.iter().collect())
            .unwrap_or_default()
    }

    /// Edges incident to `node`.
    pub fn incident_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.touch(StorageRole::IncidentEdges, OperationKind::Iterate);
        self.inner
            .read()
            .incident
            .get(&node)
            .map(|list| list.iter().collect())
            .unwrap_or_default()
    }

    /// Number of edges incident to `node`.
    pub fn degree(&self, node: NodeId) -> usize {
        self.touch(StorageRole::IncidentEdges, OperationKind::Size);
        self.inner
            .read()
            .incident
            .get(&node)
            .map_or(0, Container::len)
    }

    /// All node ids.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.touch(StorageRole::NodeList, OperationKind::Iterate);
        self.inner.read().nodes.iter().collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.touch(StorageRole::NodeList, OperationKind::Size);
        self.inner.read().nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.touch(StorageRole::EdgeList, OperationKind::Size);
        self.inner.read().edges.len()
    }
}

impl GraphInner {
    fn element_count(&self, role: StorageRole) -> u64 {
        match role {
            StorageRole::NodeList => self.nodes.len() as u64,
            StorageRole::EdgeList => self.edges.len() as u64,
            StorageRole::IncidentEdges => self.incident.values().map(|c| c.len() as u64).sum(),
            StorageRole::AdjacentNodes => self.adjacent.values().map(|c| c.len() as u64).sum(),
        }
    }

    fn container_count(&self, role: StorageRole) -> u64 {
        match role {
            StorageRole::NodeList | StorageRole::EdgeList => 1,
            StorageRole::IncidentEdges => self.incident.len() as u64,
            StorageRole::AdjacentNodes => self.adjacent.len() as u64,
        }
    }

    /// First role in `roles` whose elements cannot live in a slot array.
    fn slot_overflow(
        &self,
        target: &ContainerAssignment,
        roles: &[StorageRole],
    ) -> Option<StorageRole> {
        roles.iter().copied().find(|&role| {
            let kind = target.get(role);
            match role {
                StorageRole::NodeList => !self.nodes.fits_in(kind),
                StorageRole::EdgeList => !self.edges.fits_in(kind),
                StorageRole::IncidentEdges | StorageRole::AdjacentNodes => {
                    kind == ImplKind::SlotArray
                }
            }
        })
    }

    fn rebuild(&self, target: &ContainerAssignment, roles: &[StorageRole], check: bool) -> Rebuilt {
        let mut out = Rebuilt::default();
        for &role in roles {
            let kind = target.get(role);
            match role {
                StorageRole::NodeList => out.nodes = Some(self.nodes.rebuilt_as(kind, check)),
                StorageRole::EdgeList => out.edges = Some(self.edges.rebuilt_as(kind, check)),
                StorageRole::IncidentEdges => {
                    out.incident = Some(
                        self.incident
                            .iter()
                            .map(|(node, list)| (*node, list.rebuilt_as(kind, check)))
                            .collect(),
                    )
                }
                StorageRole::AdjacentNodes => {
                    out.adjacent = Some(
                        self.adjacent
                            .iter()
                            .map(|(node, list)| (*node, list.rebuilt_as(kind, check)))
                            .collect(),
                    )
                }
            }
        }
        out
    }

    fn install(&mut self, rebuilt: Rebuilt, target: ContainerAssignment) {
        if let Some(nodes) = rebuilt.nodes {
            self.nodes = nodes;
        }
        if let Some(edges) = rebuilt.edges {
            self.edges = edges;
        }
        if let Some(incident) = rebuilt.incident {
            self.incident = incident;
        }
        if let Some(adjacent) = rebuilt.adjacent {
            self.adjacent = adjacent;
        }
        self.assignment = target;
    }
}

impl SwapExecutor for GraphStore {
    fn current_assignment(&self) -> ContainerAssignment {
        self.inner.read().assignment
    }

    fn element_count(&self, role: StorageRole) -> u64 {
        self.inner.read().element_count(role)
    }

    fn container_count(&self, role: StorageRole) -> u64 {
        self.inner.read().container_count(role)
    }

    /// Builds replacement containers under an upgradable read lock, so
    /// readers keep seeing the old containers, then installs them in one
    /// write-locked step. Rebuild traffic is not reported to the metrics sink.
    fn apply_swap(&self, target: &ContainerAssignment) -> Result<()> {
        target.validate()?;
        let check = self.checks_enabled();
        let guard = self.inner.upgradable_read();
        let changed = target.changed_roles(&guard.assignment);
        if changed.is_empty() {
            return Ok(());
        }
        let elements: u64 = changed.iter().map(|role| guard.element_count(*role)).sum();
        if let Some(limit) = self.max_rebuild_elements {
            if elements > limit {
                return Err(HotSwapError::SwapFailed(format!(
                    "rebuilding {elements} elements exceeds the limit of {limit}"
                )));
            }
        }
        if let Some(role) = guard.slot_overflow(target, &changed) {
            return Err(HotSwapError::SwapFailed(format!(
                "{role} holds ids past the slot array bound of {MAX_SLOT_ID}"
            )));
        }
        let rebuilt = guard.rebuild(target, &changed, check);
        let mut inner = RwLockUpgradableReadGuard::upgrade(guard);
        inner.install(rebuilt, *target);
        debug!(
            roles = changed.len(),
            elements,
            checked = check,
            "graph_store.swap.installed"
        );
        Ok(())
    }

    fn suspend_insertion_checks(&self) {
        let mut suspension = self.suspension.lock();
        suspension.suspend(self.check_duplicates.swap(false, Ordering::AcqRel));
    }

    fn resume_insertion_checks(&self) {
        if let Some(previous) = self.suspension.lock().resume() {
            self.check_duplicates.store(previous, Ordering::Release);
        }
    }
}
