//! Deadline computation - pure functions, no I/O
//!
//! Everything the engine needs is passed in, so repeated reconciliation of
//! the same remote state always lands on the same deadline.

use crate::deadline::strategy::{AdjustmentStrategy, WeightedVote, net_share};
use crate::deadline::weights::ContributorWeights;
use crate::types::{CommitRecord, ReviewRecord, Verdict};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;

/// Flat review window, in days
pub const BASE_DAYS: i64 = 5;

/// Additional review time per commit, in days
pub const DAYS_PER_COMMIT: i64 = 5;

/// Commit counts above this are treated as this value
const MAX_COUNTED_COMMITS: u64 = 100_000;

/// Timing facts about a pull request that are not derived from commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrTiming {
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Most recent observed push that replaced the head
    pub last_force_push_at: Option<DateTime<Utc>>,
}

/// Computed merge schedule for a pull request
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Latest of commit date, creation date and push date
    pub start_date: DateTime<Utc>,
    /// Number of commits on the PR
    pub commit_count: u64,
    /// Unadjusted review window
    pub base_duration: TimeDelta,
    /// Net signed contributor share of the effective votes
    pub coefficient: f64,
    /// Offset chosen by the adjustment strategy, before clamping
    pub adjustment: TimeDelta,
    /// When the PR becomes eligible for merge
    pub deadline: DateTime<Utc>,
    /// Votes that contributed to the adjustment, in reviewer order
    pub votes: Vec<WeightedVote>,
}

/// `5 days + 5 days × commit_count`
pub fn base_duration(commit_count: u64) -> TimeDelta {
    let counted = i64::try_from(commit_count.min(MAX_COUNTED_COMMITS)).unwrap_or(0);
    TimeDelta::days(BASE_DAYS + DAYS_PER_COMMIT * counted)
}

/// Latest of the most recent commit, the creation time and the last push
pub fn start_date(pr: &PrTiming, commits: &[CommitRecord]) -> DateTime<Utc> {
    commits
        .iter()
        .map(|c| c.authored_at)
        .chain(pr.last_force_push_at)
        .fold(pr.created_at, std::cmp::max)
}

/// Collapse reviews to each reviewer's latest approve/request-changes verdict
///
/// Comment-only reviews never override an earlier verdict. Reviewers are
/// returned in login order so folding their shares is order-independent of
/// the remote's listing order.
pub fn effective_votes(reviews: &[ReviewRecord], weights: &ContributorWeights) -> Vec<WeightedVote> {
    let mut latest: BTreeMap<String, &ReviewRecord> = BTreeMap::new();
    for review in reviews {
        if review.verdict == Verdict::Comment {
            continue;
        }
        let login = review.reviewer.to_lowercase();
        let newer = latest
            .get(&login)
            .is_none_or(|existing| existing.submitted_at <= review.submitted_at);
        if newer {
            latest.insert(login, review);
        }
    }

    latest
        .into_iter()
        .map(|(login, review)| WeightedVote {
            share: weights.share(&login),
            reviewer: login,
            verdict: review.verdict,
        })
        .collect()
}

/// Compute the merge schedule for a pull request (PURE)
///
/// `deadline = clamp(start + base + adjustment, start, start + 2 × base)`
pub fn compute_deadline(
    pr: &PrTiming,
    commits: &[CommitRecord],
    reviews: &[ReviewRecord],
    weights: &ContributorWeights,
    strategy: &dyn AdjustmentStrategy,
) -> Schedule {
    let start = start_date(pr, commits);
    let commit_count = commits.len() as u64;
    let base = base_duration(commit_count);
    let votes = effective_votes(reviews, weights);
    let adjustment = strategy.adjustment(base, &votes);

    // Saturating: a strategy may return any offset
    let earliest = start;
    let latest = start
        .checked_add_signed(base)
        .and_then(|t| t.checked_add_signed(base))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let unclamped = start
        .checked_add_signed(base)
        .and_then(|t| t.checked_add_signed(adjustment));
    let deadline = match unclamped {
        Some(t) => t.clamp(earliest, latest),
        None if adjustment < TimeDelta::zero() => earliest,
        None => latest,
    };

    Schedule {
        start_date: start,
        commit_count,
        base_duration: base,
        // normalizes -0.0
        coefficient: net_share(&votes) + 0.0,
        adjustment,
        deadline,
        votes,
    }
}
