use std::sync::Arc;

use crate::types::ContainerAssignment;

use super::metrics::{default_metrics, AccessMetrics};

/// Configuration options supplied when creating a [`super::GraphStore`].
#[derive(Clone)]
pub struct GraphStoreOptions {
    /// Containers the store starts with.
    pub assignment: ContainerAssignment,
    /// Sink receiving every container access.
    pub metrics: Arc<dyn AccessMetrics>,
    /// Whether insertions scan for duplicates before adding.
    pub check_duplicates: bool,
    /// Upper bound on elements a single swap may rebuild; larger swaps fail.
    pub max_rebuild_elements: Option<u64>,
}

impl GraphStoreOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            assignment: ContainerAssignment::default(),
            metrics: default_metrics(),
            check_duplicates: true,
            max_rebuild_elements: None,
        }
    }

    /// Sets the initial container assignment.
    pub fn assignment(mut self, assignment: ContainerAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// Sets the access metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn AccessMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Enables or disables duplicate checks on insertion.
    pub fn check_duplicates(mut self, enabled: bool) -> Self {
        self.check_duplicates = enabled;
        self
    }

    /// Caps the number of elements one swap may rebuild.
    pub fn max_rebuild_elements(mut self, limit: u64) -> Self {
        self.max_rebuild_elements = Some(limit);
        self
    }
}

impl Default for GraphStoreOptions {
    fn default() -> Self {
        Self::new()
    }
}
