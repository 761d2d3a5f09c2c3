//! Swappable graph storage.
//!
//! Provides the container implementations a role can be backed by, the
//! in-memory [`GraphStore`] that reports its accesses and rebuilds its
//! containers on request, and a size-only stand-in used for trace replay.

mod container;
mod graph;
mod metrics;
mod options;
mod recorded;

/// Container implementations and the element contract they share.
pub use container::{Container, ElementKey, Iter, MAX_SLOT_ID};

/// Reference graph store.
pub use graph::GraphStore;

/// Access metrics sinks.
pub use metrics::{default_metrics, AccessMetrics, AccessRecorder, NoopMetrics};

/// Graph store configuration options.
pub use options::GraphStoreOptions;

/// Size-only storage used when replaying recorded traces.
pub use recorded::TraceStorage;
