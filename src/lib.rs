//! Profiling-driven hot swapping of graph storage containers.
//!
//! The graph store reports every container access; after each batch the
//! [`HotSwapEngine`] folds the counts into a short history, prices every
//! candidate [`ContainerAssignment`] with a calibrated [`cost::CostModel`],
//! and swaps the live containers when an alternative pays for its rebuild
//! within the amortization horizon.

#![warn(missing_docs)]

/// Engine configuration and its TOML form.
pub mod config;
pub mod cost;
/// The hot-swap engine driven once per batch.
pub mod engine;
/// Error type and result alias.
pub mod error;
pub mod logging;
pub mod profile;
pub mod recommend;
pub mod storage;
pub mod swap;
pub mod trace;
pub mod types;

pub use config::{HotSwapConfig, ManualSwap};
pub use engine::HotSwapEngine;
pub use error::{HotSwapError, Result};
pub use types::{ContainerAssignment, EdgeId, ImplKind, NodeId, OperationKind, StorageRole};
