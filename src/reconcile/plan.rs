//! Reconciliation planning - pure functions, no I/O
//!
//! Given the tracked record and a freshly computed schedule, decide which
//! remote writes (if any) are needed and whether the PR may be merged.
//! All data is passed in, so every branch is unit-testable.

use crate::deadline::Schedule;
use crate::reconcile::message::{Links, opening_comment, reset_comment, status_update};
use crate::tracking::{AppliedSchedule, TrackedPullRequest, Transition, TransitionKind};
use crate::types::{PrState, PullRequestInfo};
use chrono::{DateTime, Utc};
use std::fmt;

/// Plan the transition that brings the remote in line with `schedule` (PURE)
///
/// Returns `None` when the remote already shows this schedule. A pending
/// transition with the same target is resumed as-is, so a comment that was
/// already posted is never posted again.
pub fn plan_transition(
    record: &TrackedPullRequest,
    schedule: &Schedule,
    links: &Links,
    now: DateTime<Utc>,
) -> Option<Transition> {
    let target = AppliedSchedule {
        start_date: schedule.start_date,
        deadline: schedule.deadline,
    };

    if let Some(pending) = &record.pending
        && pending.target() == target
        && pending.head_sha == record.head_sha
    {
        return Some(pending.clone());
    }

    if record.pending.is_none() && record.applied == Some(target) {
        return None;
    }

    // What the PR's readers were last told, including a half-applied transition
    // whose comment went out
    let baseline = match &record.pending {
        Some(pending) if pending.comment_posted => Some(pending.target()),
        _ => record.applied,
    };

    let key = record.key();
    let remaining = schedule.deadline - now;
    let (kind, comment) = match baseline {
        // First seen through a push: readers are told the clock restarted
        None if record.last_force_push_at.is_some() => (
            TransitionKind::Reset,
            Some(reset_comment(links, &key, remaining)),
        ),
        None => (
            TransitionKind::Announce,
            Some(opening_comment(links, &key, remaining)),
        ),
        Some(previous) if previous.start_date < target.start_date => (
            TransitionKind::Reset,
            Some(reset_comment(links, &key, remaining)),
        ),
        Some(_) => (TransitionKind::Reschedule, None),
    };

    let last_id = record
        .pending
        .as_ref()
        .map_or(record.last_applied_transition_id, |p| {
            p.id.max(record.last_applied_transition_id)
        });

    Some(Transition {
        id: last_id + 1,
        kind,
        head_sha: record.head_sha.clone(),
        start_date: target.start_date,
        deadline: target.deadline,
        comment,
        comment_attempted: false,
        comment_posted: false,
        status: status_update(links, &key, schedule),
    })
}

/// Why a PR is not merged yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    /// Deadline still in the future
    DeadlineNotReached,
    /// PR is no longer open
    NotOpen,
    /// PR is a draft
    Draft,
    /// Remote reports conflicts
    Conflicts,
    /// Remote is still computing mergeability
    MergeabilityUnknown,
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineNotReached => write!(f, "deadline not reached"),
            Self::NotOpen => write!(f, "not open"),
            Self::Draft => write!(f, "is draft"),
            Self::Conflicts => write!(f, "has merge conflicts"),
            Self::MergeabilityUnknown => write!(f, "mergeability unknown"),
        }
    }
}

/// Merge decision for a swept PR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// Deadline passed and the remote reports the PR mergeable
    Merge,
    /// Keep waiting
    Wait(WaitReason),
}

/// Decide whether a PR is due for merge (PURE)
pub fn merge_decision(
    pr: &PullRequestInfo,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MergeDecision {
    if pr.state != PrState::Open {
        return MergeDecision::Wait(WaitReason::NotOpen);
    }
    if now < deadline {
        return MergeDecision::Wait(WaitReason::DeadlineNotReached);
    }
    if pr.is_draft {
        return MergeDecision::Wait(WaitReason::Draft);
    }
    match pr.mergeable {
        Some(true) => MergeDecision::Merge,
        Some(false) => MergeDecision::Wait(WaitReason::Conflicts),
        None => MergeDecision::Wait(WaitReason::MergeabilityUnknown),
    }
}
