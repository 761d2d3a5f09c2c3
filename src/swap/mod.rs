//! Stay-or-swap decisions and the storage contract that carries them out.

mod controller;
mod executor;

pub use controller::{
    amortization_horizon, budget_exhausted, warmup_batches, DecisionInputs, SkipReason,
    SwapController, SwapCosts, SwapOutcome, SwapPhase, SwapPolicy, SwapReason, SwapState,
};
pub use executor::{BatchClock, ChecksSuspension, InsertionChecksPaused, RunClock, SwapExecutor};
