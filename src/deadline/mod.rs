//! Deadline engine
//!
//! Two layers, mirroring the reconcile module:
//! 1. Prepare - contributor weights from commit history (effectful, cached)
//! 2. Compute - `compute_deadline` (pure, deterministic)

mod engine;
mod strategy;
mod weights;

pub use engine::{
    BASE_DAYS, DAYS_PER_COMMIT, PrTiming, Schedule, base_duration, compute_deadline,
    effective_votes, start_date,
};
pub use strategy::{AdjustmentStrategy, LinearShare, WeightedVote, net_share, scale};
pub use weights::{ContributorWeights, WeightCache};
