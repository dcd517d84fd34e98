//! Tracked pull request state
//!
//! A [`TrackedPullRequest`] is created the first time a configured PR is
//! seen and removed when it closes or merges. The reconciler is its only
//! writer.

mod storage;

pub use storage::{FileTrackingStore, default_state_path, load_tracking, save_tracking};

use crate::error::Result;
use crate::types::{PrKey, RepoId, StatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current tracking file format version
pub const TRACKING_VERSION: u32 = 1;

/// What a transition announces on the pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// First schedule for the PR: opening comment plus status
    Announce,
    /// Start date moved forward after a push: reset comment plus status
    Reset,
    /// Deadline moved for any other reason: status only
    Reschedule,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Announce => write!(f, "announce"),
            Self::Reset => write!(f, "reset"),
            Self::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// Start date and deadline the remote has been told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSchedule {
    /// Start date of the announced schedule
    pub start_date: DateTime<Utc>,
    /// Announced merge deadline
    pub deadline: DateTime<Utc>,
}

/// A planned set of remote writes, persisted before any of them is issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Monotonic id, strictly greater than every earlier transition of the PR
    pub id: u64,
    /// Kind of announcement
    pub kind: TransitionKind,
    /// Head commit the status is written to
    pub head_sha: String,
    /// Start date being announced
    pub start_date: DateTime<Utc>,
    /// Deadline being announced
    pub deadline: DateTime<Utc>,
    /// Comment body, for announce and reset transitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Set before the first attempt to post the comment
    #[serde(default)]
    pub comment_attempted: bool,
    /// Set once the comment has been posted
    #[serde(default)]
    pub comment_posted: bool,
    /// Commit status to write
    pub status: StatusUpdate,
}

impl Transition {
    /// The schedule this transition announces
    pub const fn target(&self) -> AppliedSchedule {
        AppliedSchedule {
            start_date: self.start_date,
            deadline: self.deadline,
        }
    }
}

/// Persisted state of a pull request under automatic merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPullRequest {
    /// Repository the PR belongs to
    pub repo: RepoId,
    /// PR number
    pub number: u64,
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Head commit last observed
    pub head_sha: String,
    /// Number of commits last observed
    #[serde(default)]
    pub commit_count: u64,
    /// Most recent commit timestamp last observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_commit_at: Option<DateTime<Utc>>,
    /// When a head change was last observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_force_push_at: Option<DateTime<Utc>>,
    /// Deadline from the most recent computation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_deadline: Option<DateTime<Utc>>,
    /// Net vote coefficient from the most recent computation
    #[serde(default)]
    pub coefficient: f64,
    /// Id of the last fully applied transition
    #[serde(default)]
    pub last_applied_transition_id: u64,
    /// Set once the PR has been merged
    #[serde(default)]
    pub merged: bool,
    /// Set once the PR has been closed
    #[serde(default)]
    pub closed: bool,
    /// Schedule of the last fully applied transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<AppliedSchedule>,
    /// Transition persisted but not yet fully applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<Transition>,
}

impl TrackedPullRequest {
    /// Start tracking a PR first seen at `head_sha`
    pub fn new(key: &PrKey, created_at: DateTime<Utc>, head_sha: impl Into<String>) -> Self {
        Self {
            repo: key.repo.clone(),
            number: key.number,
            created_at,
            head_sha: head_sha.into(),
            commit_count: 0,
            latest_commit_at: None,
            last_force_push_at: None,
            current_deadline: None,
            coefficient: 0.0,
            last_applied_transition_id: 0,
            merged: false,
            closed: false,
            applied: None,
            pending: None,
        }
    }

    /// Identity of this record
    pub fn key(&self) -> PrKey {
        PrKey::new(self.repo.clone(), self.number)
    }

    /// Mark a pending transition as fully applied
    pub fn finish_transition(&mut self) {
        if let Some(transition) = self.pending.take() {
            self.applied = Some(transition.target());
            self.last_applied_transition_id = transition.id;
        }
    }
}

/// All tracked pull requests, as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    /// File format version
    pub version: u32,
    /// Tracked pull requests, sorted by repository then number
    #[serde(default)]
    pub pull_requests: Vec<TrackedPullRequest>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingState {
    /// Create empty tracking state
    pub const fn new() -> Self {
        Self {
            version: TRACKING_VERSION,
            pull_requests: Vec::new(),
        }
    }

    /// Look up a tracked PR
    pub fn get(&self, key: &PrKey) -> Option<&TrackedPullRequest> {
        self.pull_requests
            .iter()
            .find(|pr| pr.repo == key.repo && pr.number == key.number)
    }

    /// Insert or replace a tracked PR
    pub fn track(&mut self, record: TrackedPullRequest) {
        let key = record.key();
        match self
            .pull_requests
            .binary_search_by(|pr| (&pr.repo, pr.number).cmp(&(&key.repo, key.number)))
        {
            Ok(idx) => self.pull_requests[idx] = record,
            Err(idx) => self.pull_requests.insert(idx, record),
        }
    }

    /// Stop tracking a PR, returning its last record
    pub fn untrack(&mut self, key: &PrKey) -> Option<TrackedPullRequest> {
        let idx = self
            .pull_requests
            .iter()
            .position(|pr| pr.repo == key.repo && pr.number == key.number)?;
        Some(self.pull_requests.remove(idx))
    }

    /// Tracked PRs of one repository
    pub fn for_repo<'a>(&'a self, repo: &'a RepoId) -> impl Iterator<Item = &'a TrackedPullRequest> {
        self.pull_requests.iter().filter(move |pr| &pr.repo == repo)
    }
}

/// Keyed persistence for tracked pull requests
///
/// Every mutation is durable when it returns `Ok`; on `Err` the stored state
/// is unchanged.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Fetch a tracked PR
    async fn get(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>>;

    /// Insert or replace a tracked PR
    async fn put(&self, record: TrackedPullRequest) -> Result<()>;

    /// Stop tracking a PR
    async fn remove(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>>;

    /// Tracked PRs of one repository
    async fn list(&self, repo: &RepoId) -> Result<Vec<TrackedPullRequest>>;

    /// Repositories the bot operates on
    fn configured_repositories(&self) -> Vec<RepoId>;

    /// Whether the bot operates on `repo`
    fn is_configured(&self, repo: &RepoId) -> bool {
        self.configured_repositories().contains(repo)
    }
}
