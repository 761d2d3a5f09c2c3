use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ImplKind, StorageRole};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HotSwapError>;

/// Errors surfaced by the hot-swap engine and the reference graph store.
#[derive(Debug, Error)]
pub enum HotSwapError {
    /// I/O failure while reading or writing configuration, calibration or traces.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Invalid engine configuration; raised at setup and never ignored.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// An implementation was assigned to a role it cannot back.
    #[error("{kind} cannot back the {role} role")]
    UnsupportedImpl {
        /// Role that was requested.
        role: StorageRole,
        /// Implementation that cannot serve it.
        kind: ImplKind,
    },
    /// The storage layer could not complete a container rebuild.
    #[error("swap failed: {0}")]
    SwapFailed(String),
    /// An id is too large for the slot array backing `role`.
    #[error("id {id} is past the slot array bound of the {role} role")]
    SlotOutOfRange {
        /// Role backed by the slot array.
        role: StorageRole,
        /// Rejected id.
        id: u64,
    },
    /// A referenced graph element does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A TOML document could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Toml {
        /// File the document came from.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: toml::de::Error,
    },
    /// A TOML document could not be produced.
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// A JSON trace record was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HotSwapError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        HotSwapError::Config(msg.into())
    }
}
