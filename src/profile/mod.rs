//! Per-batch access profiles and the rolling history they are kept in.
//!
//! Live counting happens in [`crate::storage::AccessRecorder`]; at the end of
//! a batch its counters are frozen into a [`ProfileEntry`] and pushed into the
//! [`AccessProfiler`] ring, which the swap controller later sums over its
//! amortization horizon.

mod entry;
mod profiler;

pub use entry::{ProfileEntry, ProfileMap};
pub use profiler::{AccessProfiler, Accumulated, RoleSize, RoleSizes};
