//! Pull request reconciliation
//!
//! Two phases, as everywhere in this crate:
//! 1. Plan - `plan_transition` and `merge_decision` (pure, no I/O)
//! 2. Execute - `apply_transition` and `execute_merge` (effectful)
//!
//! [`Reconciler::reconcile`] wires them together under a per-PR lock.

mod execute;
mod lock;
mod message;
mod plan;

pub use execute::{MergeAttempt, apply_transition, execute_merge};
pub use lock::PrLocks;
pub use message::{
    Links, format_timestamp, format_wait, opening_comment, reset_comment, status_description,
    status_update,
};
pub use plan::{MergeDecision, WaitReason, merge_decision, plan_transition};

use crate::clock::Clock;
use crate::deadline::{
    AdjustmentStrategy, LinearShare, PrTiming, Schedule, WeightCache, compute_deadline,
};
use crate::error::Result;
use crate::gateway::RepositoryGateway;
use crate::tracking::{TrackedPullRequest, TrackingStore, TransitionKind};
use crate::types::{MergeMethod, PrKey, PrState, RepoId};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default time-to-live for cached contributor weights
const DEFAULT_WEIGHT_TTL_MINUTES: i64 = 60;

/// What caused a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// PR opened
    Opened,
    /// PR reopened after being closed
    Reopened,
    /// Head branch pushed
    Synchronize,
    /// Title or body edited
    Edited,
    /// PR closed or merged outside the bot
    Closed,
    /// A review was submitted
    ReviewSubmitted,
    /// Periodic sweep
    Sweep,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opened => "opened",
            Self::Reopened => "reopened",
            Self::Synchronize => "synchronize",
            Self::Edited => "edited",
            Self::Closed => "closed",
            Self::ReviewSubmitted => "review_submitted",
            Self::Sweep => "sweep",
        };
        f.write_str(name)
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do for this trigger or repository
    Ignored,
    /// PR is no longer tracked
    Untracked,
    /// PR is tracked and waiting for its deadline
    Scheduled {
        /// Current deadline
        deadline: DateTime<Utc>,
        /// Transition applied during this reconciliation, if any
        transition: Option<TransitionKind>,
    },
    /// PR was merged and is no longer tracked
    Merged {
        /// Merge commit SHA
        sha: Option<String>,
    },
    /// Deadline passed but the PR cannot be merged yet
    Blocked {
        /// Current deadline
        deadline: DateTime<Utc>,
        /// Why the merge did not happen
        reason: String,
    },
}

/// Keeps tracked PRs, their comments and statuses, and merges in sync
pub struct Reconciler {
    gateway: Arc<dyn RepositoryGateway>,
    store: Arc<dyn TrackingStore>,
    clock: Arc<dyn Clock>,
    strategy: Arc<dyn AdjustmentStrategy>,
    weights: WeightCache,
    locks: PrLocks,
    links: Links,
    merge_method: MergeMethod,
}

impl Reconciler {
    /// Create a reconciler with the linear adjustment strategy
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        store: Arc<dyn TrackingStore>,
        clock: Arc<dyn Clock>,
        links: Links,
    ) -> Self {
        Self {
            gateway,
            store,
            clock,
            strategy: Arc::new(LinearShare),
            weights: WeightCache::new(TimeDelta::minutes(DEFAULT_WEIGHT_TTL_MINUTES)),
            locks: PrLocks::new(),
            links,
            merge_method: MergeMethod::default(),
        }
    }

    /// Use a different adjustment strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn AdjustmentStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use a different merge method
    #[must_use]
    pub const fn with_merge_method(mut self, method: MergeMethod) -> Self {
        self.merge_method = method;
        self
    }

    /// Refresh contributor weights after `ttl`
    #[must_use]
    pub fn with_weight_ttl(mut self, ttl: TimeDelta) -> Self {
        self.weights = WeightCache::new(ttl);
        self
    }

    /// Tracking store used by this reconciler
    pub fn store(&self) -> &dyn TrackingStore {
        self.store.as_ref()
    }

    /// Bring one PR in line with its remote state
    ///
    /// Runs under the PR's exclusive lock. Errors leave the tracked state
    /// resumable by the next trigger.
    pub async fn reconcile(&self, key: &PrKey, trigger: Trigger) -> Result<ReconcileOutcome> {
        if !self.store.is_configured(&key.repo) {
            info!(%key, %trigger, "repository not configured, ignoring");
            return Ok(ReconcileOutcome::Ignored);
        }

        if trigger == Trigger::Edited {
            info!(%key, "pull request edited, schedule unchanged");
            return Ok(ReconcileOutcome::Ignored);
        }

        let _guard = self.locks.acquire(key).await;
        debug!(%key, %trigger, "reconciling");

        if trigger == Trigger::Closed {
            if self.store.remove(key).await?.is_some() {
                info!(%key, "pull request closed, stopped tracking");
            }
            return Ok(ReconcileOutcome::Untracked);
        }

        self.synchronize(key, trigger).await
    }

    /// Tracked PRs of `repo` plus every open PR the remote reports
    ///
    /// If listing open PRs fails, the tracked set alone is returned.
    pub async fn sweep_candidates(&self, repo: &RepoId) -> Result<Vec<PrKey>> {
        let mut keys: BTreeSet<PrKey> = self
            .store
            .list(repo)
            .await?
            .iter()
            .map(TrackedPullRequest::key)
            .collect();

        match self.gateway.list_open_pull_requests(repo).await {
            Ok(open) => keys.extend(open.iter().map(|pr| PrKey::new(repo.clone(), pr.number))),
            Err(e) => {
                warn!(%repo, error = %e, "failed to list open pull requests, sweeping tracked only");
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Compute the current schedule without writing anything
    pub async fn preview(&self, key: &PrKey) -> Result<Schedule> {
        let now = self.clock.now();
        let pr = self.gateway.get_pull_request(&key.repo, key.number).await?;
        let tracked = self.store.get(key).await?;
        let timing = PrTiming {
            created_at: pr.created_at,
            last_force_push_at: tracked.and_then(|t| t.last_force_push_at),
        };
        let (schedule, _) = self.compute(key, &timing, now).await?;
        Ok(schedule)
    }

    /// Fetch commits, reviews and weights, then compute the schedule
    ///
    /// Also returns the latest commit timestamp for the tracked record.
    async fn compute(
        &self,
        key: &PrKey,
        timing: &PrTiming,
        now: DateTime<Utc>,
    ) -> Result<(Schedule, Option<DateTime<Utc>>)> {
        let commits = self.gateway.get_commits(&key.repo, key.number).await?;
        let reviews = self.gateway.get_reviews(&key.repo, key.number).await?;
        let weights = self.weights.get(self.gateway.as_ref(), &key.repo, now).await?;
        let schedule = compute_deadline(
            timing,
            &commits,
            &reviews,
            &weights,
            self.strategy.as_ref(),
        );
        let latest_commit_at = commits.iter().map(|c| c.authored_at).max();
        Ok((schedule, latest_commit_at))
    }

    async fn synchronize(&self, key: &PrKey, trigger: Trigger) -> Result<ReconcileOutcome> {
        let now = self.clock.now();
        let pr = self.gateway.get_pull_request(&key.repo, key.number).await?;
        let existing = self.store.get(key).await?;

        if pr.state != PrState::Open {
            if existing.is_some() {
                self.store.remove(key).await?;
                info!(%key, state = %pr.state, "pull request no longer open, stopped tracking");
            }
            return Ok(ReconcileOutcome::Untracked);
        }

        let mut record = match &existing {
            Some(record) => {
                let mut record = record.clone();
                if record.head_sha != pr.head_sha {
                    info!(%key, old = %record.head_sha, new = %pr.head_sha, "head moved, resetting start date");
                    record.head_sha.clone_from(&pr.head_sha);
                    record.last_force_push_at = Some(now);
                }
                record
            }
            None => {
                info!(%key, %trigger, "tracking pull request");
                let mut record = TrackedPullRequest::new(key, pr.created_at, &pr.head_sha);
                if trigger == Trigger::Synchronize {
                    record.last_force_push_at = Some(now);
                }
                record
            }
        };

        let timing = PrTiming {
            created_at: record.created_at,
            last_force_push_at: record.last_force_push_at,
        };
        let (schedule, latest_commit_at) = self.compute(key, &timing, now).await?;

        record.commit_count = schedule.commit_count;
        record.latest_commit_at = latest_commit_at;
        record.current_deadline = Some(schedule.deadline);
        record.coefficient = schedule.coefficient;

        let applied = match plan_transition(&record, &schedule, &self.links, now) {
            Some(transition) => {
                let kind = transition.kind;
                apply_transition(
                    self.gateway.as_ref(),
                    self.store.as_ref(),
                    &mut record,
                    transition,
                )
                .await?;
                Some(kind)
            }
            None => {
                if existing.as_ref() != Some(&record) {
                    self.store.put(record.clone()).await?;
                }
                debug!(%key, deadline = %format_timestamp(schedule.deadline), "schedule unchanged");
                None
            }
        };

        if trigger != Trigger::Sweep {
            return Ok(ReconcileOutcome::Scheduled {
                deadline: schedule.deadline,
                transition: applied,
            });
        }

        match merge_decision(&pr, schedule.deadline, now) {
            MergeDecision::Merge => {
                match execute_merge(
                    self.gateway.as_ref(),
                    self.store.as_ref(),
                    &mut record,
                    self.merge_method,
                )
                .await?
                {
                    MergeAttempt::Merged { sha } => Ok(ReconcileOutcome::Merged { sha }),
                    MergeAttempt::Blocked { reason } => Ok(ReconcileOutcome::Blocked {
                        deadline: schedule.deadline,
                        reason,
                    }),
                }
            }
            MergeDecision::Wait(reason @ (WaitReason::Conflicts | WaitReason::Draft)) => {
                warn!(%key, %reason, "deadline passed but pull request cannot be merged");
                Ok(ReconcileOutcome::Blocked {
                    deadline: schedule.deadline,
                    reason: reason.to_string(),
                })
            }
            MergeDecision::Wait(reason) => {
                debug!(%key, %reason, "not merging yet");
                Ok(ReconcileOutcome::Scheduled {
                    deadline: schedule.deadline,
                    transition: applied,
                })
            }
        }
    }
}
