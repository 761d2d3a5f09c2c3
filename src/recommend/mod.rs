//! Candidate scoring over a sliding window of recent batches.

mod candidates;
mod tracker;

pub use candidates::CandidateSpace;
pub use tracker::{RecommendationTracker, RecommendationWindow, RecommenderEntry};
