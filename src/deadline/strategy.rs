//! Review-driven adjustment strategies
//!
//! The engine hands every effective vote to an [`AdjustmentStrategy`] and
//! clamps whatever it returns, so a strategy only decides the curve.

use crate::types::Verdict;
use chrono::TimeDelta;
use std::fmt;

/// A reviewer's current verdict together with their contribution share
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVote {
    /// Reviewer login (lowercased)
    pub reviewer: String,
    /// Latest verdict from this reviewer
    pub verdict: Verdict,
    /// Reviewer's share of the repository's commit history, in `[0, 1]`
    pub share: f64,
}

impl WeightedVote {
    /// Share signed by verdict: approvals positive, change requests negative
    pub fn signed_share(&self) -> f64 {
        match self.verdict {
            Verdict::Approve => self.share,
            Verdict::RequestChanges => -self.share,
            Verdict::Comment => 0.0,
        }
    }
}

/// Maps weighted votes to a deadline offset
///
/// Negative offsets bring the merge forward, positive ones delay it.
/// Implementations must be pure: the same inputs always give the same offset.
pub trait AdjustmentStrategy: Send + Sync + fmt::Debug {
    /// Offset to apply to `start_date + base`
    fn adjustment(&self, base: TimeDelta, votes: &[WeightedVote]) -> TimeDelta;
}

/// Offset proportional to the net signed share: `-(Σ signed share) × base`
///
/// If every historical committer approves, the merge is due at the start date.
/// If every committer requests changes, the wait doubles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearShare;

impl AdjustmentStrategy for LinearShare {
    fn adjustment(&self, base: TimeDelta, votes: &[WeightedVote]) -> TimeDelta {
        let net = net_share(votes);
        scale(base, -net)
    }
}

/// Sum of signed shares, in vote order
pub fn net_share(votes: &[WeightedVote]) -> f64 {
    votes.iter().map(WeightedVote::signed_share).sum()
}

/// Scale a duration by a factor, rounded to whole seconds
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn scale(duration: TimeDelta, factor: f64) -> TimeDelta {
    let seconds = (duration.num_seconds() as f64 * factor).round();
    TimeDelta::seconds(seconds as i64)
}
