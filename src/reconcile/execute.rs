//! Reconciliation execution - effectful operations
//!
//! Takes a `Transition` or merge decision produced by the pure planning
//! functions and carries it out against the gateway and the tracking store.

use crate::error::{Error, Result};
use crate::gateway::RepositoryGateway;
use crate::tracking::{TrackedPullRequest, TrackingStore, Transition};
use crate::types::MergeMethod;
use tracing::{debug, info, warn};

/// Apply a transition with at-most-once remote writes (EFFECTFUL)
///
/// The transition is persisted as pending before anything is sent. The
/// comment is posted at most once: the attempt is persisted first, and a
/// resumed attempt looks for the comment on the remote before posting again.
/// The status write is repeatable. On any error the pending transition stays persisted
/// and the next reconciliation resumes it.
pub async fn apply_transition(
    gateway: &dyn RepositoryGateway,
    store: &dyn TrackingStore,
    record: &mut TrackedPullRequest,
    mut transition: Transition,
) -> Result<()> {
    let key = record.key();
    let id = transition.id;
    let kind = transition.kind;
    let comment = transition
        .comment
        .clone()
        .filter(|_| !transition.comment_posted);
    let attempted = transition.comment_attempted;
    let status = transition.status.clone();
    let sha = transition.head_sha.clone();

    transition.comment_attempted |= comment.is_some();
    record.pending = Some(transition);
    store.put(record.clone()).await?;
    debug!(%key, id, %kind, "persisted pending transition");

    if let Some(body) = comment {
        // An earlier attempt may have failed after the remote created the comment
        if attempted && gateway.has_comment(&key.repo, key.number, &body).await? {
            debug!(%key, id, "schedule comment already present");
        } else {
            gateway.post_comment(&key.repo, key.number, &body).await?;
        }
        if let Some(pending) = record.pending.as_mut() {
            pending.comment_posted = true;
        }
        store.put(record.clone()).await?;
        debug!(%key, id, "posted schedule comment");
    }

    gateway.set_status(&key.repo, &sha, &status).await?;

    record.finish_transition();
    store.put(record.clone()).await?;
    info!(%key, id, %kind, description = %status.description, "applied transition");
    Ok(())
}

/// Result of a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAttempt {
    /// Merged; tracking removed
    Merged {
        /// Merge commit SHA, when the remote reports one
        sha: Option<String>,
    },
    /// Remote refused the merge; the PR stays tracked
    Blocked {
        /// Reason reported by the remote
        reason: String,
    },
}

/// Merge a due PR and stop tracking it (EFFECTFUL)
///
/// A refusal from the remote is not an error: the PR stays tracked and the
/// next sweep tries again.
pub async fn execute_merge(
    gateway: &dyn RepositoryGateway,
    store: &dyn TrackingStore,
    record: &mut TrackedPullRequest,
    method: MergeMethod,
) -> Result<MergeAttempt> {
    let key = record.key();
    info!(%key, %method, "merging pull request");

    match gateway.merge(&key.repo, key.number, method).await {
        Ok(result) if result.merged => {
            record.merged = true;
            if let Err(e) = store.remove(&key).await {
                // The next sweep sees the PR as merged remotely and untracks it
                warn!(%key, error = %e, "merged but failed to remove tracking");
            }
            info!(%key, sha = ?result.sha, "merged pull request");
            Ok(MergeAttempt::Merged { sha: result.sha })
        }
        Ok(result) => {
            let reason = result
                .message
                .unwrap_or_else(|| "merge not performed".to_string());
            warn!(%key, %reason, "merge refused");
            Ok(MergeAttempt::Blocked { reason })
        }
        Err(Error::MergeBlocked(reason)) => {
            warn!(%key, %reason, "merge blocked");
            Ok(MergeAttempt::Blocked { reason })
        }
        Err(e) => Err(e),
    }
}
