//! Mock repository gateway for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use mergeclock::error::{Error, Result};
use mergeclock::gateway::RepositoryGateway;
use mergeclock::types::{
    CommitRecord, MergeMethod, MergeResult, PrKey, PrState, PullRequestInfo, RepoId, ReviewRecord,
    StatusUpdate,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Call record for `post_comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub key: PrKey,
    pub body: String,
}

/// Call record for `set_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCall {
    pub repo: RepoId,
    pub sha: String,
    pub status: StatusUpdate,
}

/// Call record for `merge`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub key: PrKey,
    pub method: MergeMethod,
}

/// Simple mock gateway for testing
///
/// Features:
/// - In-memory pull requests, commits, reviews and contributor statistics
/// - Call tracking for every write
/// - Error injection for failure path testing
/// - Optional latency to force overlapping reconciliations
#[derive(Default)]
pub struct MockGateway {
    prs: Mutex<HashMap<PrKey, PullRequestInfo>>,
    commits: Mutex<HashMap<PrKey, Vec<CommitRecord>>>,
    reviews: Mutex<HashMap<PrKey, Vec<ReviewRecord>>>,
    contributors: Mutex<HashMap<RepoId, HashMap<String, u64>>>,
    merge_responses: Mutex<HashMap<PrKey, MergeResult>>,
    latency: Mutex<Option<Duration>>,
    // Call tracking
    get_pr_calls: Mutex<Vec<PrKey>>,
    comment_calls: Mutex<Vec<CommentCall>>,
    status_calls: Mutex<Vec<StatusCall>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    // Error injection
    error_on_get_pr: Mutex<Option<String>>,
    error_on_comment: Mutex<Option<String>>,
    error_after_comment: Mutex<Option<String>>,
    error_on_status: Mutex<Option<String>>,
    merge_blocked: Mutex<Option<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // === Remote state ===

    /// Add (or replace) an open pull request
    pub fn add_pr(&self, key: &PrKey, pr: PullRequestInfo) {
        self.prs.lock().unwrap().insert(key.clone(), pr);
    }

    /// Set the commits of a pull request
    pub fn set_commits(&self, key: &PrKey, commits: Vec<CommitRecord>) {
        self.commits.lock().unwrap().insert(key.clone(), commits);
    }

    /// Push a new head: append a commit and move the head sha
    pub fn push_commit(&self, key: &PrKey, commit: CommitRecord) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(key) {
            pr.head_sha.clone_from(&commit.sha);
        }
        self.commits
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push(commit);
    }

    /// Move the head sha without adding commits (force push)
    pub fn set_head(&self, key: &PrKey, sha: &str) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(key) {
            pr.head_sha = sha.to_string();
        }
    }

    /// Add a submitted review
    pub fn add_review(&self, key: &PrKey, review: ReviewRecord) {
        self.reviews
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push(review);
    }

    /// Set per-author commit counts of a repository
    pub fn set_contributors(&self, repo: &RepoId, counts: &[(&str, u64)]) {
        let counts = counts
            .iter()
            .map(|(login, n)| ((*login).to_string(), *n))
            .collect();
        self.contributors.lock().unwrap().insert(repo.clone(), counts);
    }

    /// Set what the remote reports for mergeability
    pub fn set_mergeable(&self, key: &PrKey, mergeable: Option<bool>) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(key) {
            pr.mergeable = mergeable;
        }
    }

    /// Mark a pull request closed remotely
    pub fn close_pr(&self, key: &PrKey) {
        if let Some(pr) = self.prs.lock().unwrap().get_mut(key) {
            pr.state = PrState::Closed;
        }
    }

    /// Set the response for `merge`
    pub fn set_merge_response(&self, key: &PrKey, result: MergeResult) {
        self.merge_responses
            .lock()
            .unwrap()
            .insert(key.clone(), result);
    }

    /// Delay every `get_pull_request` call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    // === Error injection methods ===

    /// Make `get_pull_request` return a retryable error
    pub fn fail_get_pr(&self, msg: &str) {
        *self.error_on_get_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `post_comment` return a retryable error
    pub fn fail_comment(&self, msg: &str) {
        *self.error_on_comment.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `post_comment` create the comment and then return a retryable error
    pub fn fail_comment_after_post(&self, msg: &str) {
        *self.error_after_comment.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `set_status` return a retryable error
    pub fn fail_status(&self, msg: &str) {
        *self.error_on_status.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge` refuse with `MergeBlocked`
    pub fn block_merge(&self, msg: &str) {
        *self.merge_blocked.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear all injected errors
    pub fn clear_errors(&self) {
        *self.error_on_get_pr.lock().unwrap() = None;
        *self.error_on_comment.lock().unwrap() = None;
        *self.error_after_comment.lock().unwrap() = None;
        *self.error_on_status.lock().unwrap() = None;
        *self.merge_blocked.lock().unwrap() = None;
    }

    // === Call inspection ===

    pub fn get_pr_calls(&self) -> Vec<PrKey> {
        self.get_pr_calls.lock().unwrap().clone()
    }

    pub fn comment_calls(&self) -> Vec<CommentCall> {
        self.comment_calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<StatusCall> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    /// Total number of remote writes of any kind
    pub fn write_count(&self) -> usize {
        self.comment_calls.lock().unwrap().len()
            + self.status_calls.lock().unwrap().len()
            + self.merge_calls.lock().unwrap().len()
    }

    fn not_found(operation: &str, key: &PrKey) -> Error {
        Error::remote_fatal(operation, format!("404: {key} not found"))
    }
}

#[async_trait]
impl RepositoryGateway for MockGateway {
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequestInfo> {
        let key = PrKey::new(repo.clone(), number);
        self.get_pr_calls.lock().unwrap().push(key.clone());

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(msg) = self.error_on_get_pr.lock().unwrap().clone() {
            return Err(Error::remote("get_pull_request", msg));
        }
        self.prs
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Self::not_found("get_pull_request", &key))
    }

    async fn list_open_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequestInfo>> {
        let prs = self.prs.lock().unwrap();
        let mut open: Vec<PullRequestInfo> = prs
            .iter()
            .filter(|(key, pr)| &key.repo == repo && pr.state == PrState::Open)
            .map(|(_, pr)| pr.clone())
            .collect();
        open.sort_by_key(|pr| pr.number);
        Ok(open)
    }

    async fn get_commits(&self, repo: &RepoId, number: u64) -> Result<Vec<CommitRecord>> {
        let key = PrKey::new(repo.clone(), number);
        Ok(self
            .commits
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewRecord>> {
        let key = PrKey::new(repo.clone(), number);
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_contributor_commit_counts(
        &self,
        repo: &RepoId,
    ) -> Result<Option<HashMap<String, u64>>> {
        Ok(Some(
            self.contributors
                .lock()
                .unwrap()
                .get(repo)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn post_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<()> {
        if let Some(msg) = self.error_on_comment.lock().unwrap().clone() {
            return Err(Error::remote("post_comment", msg));
        }
        self.comment_calls.lock().unwrap().push(CommentCall {
            key: PrKey::new(repo.clone(), number),
            body: body.to_string(),
        });
        if let Some(msg) = self.error_after_comment.lock().unwrap().clone() {
            return Err(Error::remote("post_comment", msg));
        }
        Ok(())
    }

    async fn has_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<bool> {
        let key = PrKey::new(repo.clone(), number);
        Ok(self
            .comment_calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.key == key && c.body.trim() == body.trim()))
    }

    async fn set_status(&self, repo: &RepoId, sha: &str, status: &StatusUpdate) -> Result<()> {
        if let Some(msg) = self.error_on_status.lock().unwrap().clone() {
            return Err(Error::remote("set_status", msg));
        }
        self.status_calls.lock().unwrap().push(StatusCall {
            repo: repo.clone(),
            sha: sha.to_string(),
            status: status.clone(),
        });
        Ok(())
    }

    async fn merge(&self, repo: &RepoId, number: u64, method: MergeMethod) -> Result<MergeResult> {
        let key = PrKey::new(repo.clone(), number);
        self.merge_calls.lock().unwrap().push(MergeCall {
            key: key.clone(),
            method,
        });

        if let Some(msg) = self.merge_blocked.lock().unwrap().clone() {
            return Err(Error::MergeBlocked(msg));
        }

        let result = self
            .merge_responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(MergeResult {
                merged: true,
                sha: Some(format!("merge-{number}")),
                message: None,
            });
        if result.merged
            && let Some(pr) = self.prs.lock().unwrap().get_mut(&key)
        {
            pr.state = PrState::Merged;
        }
        Ok(result)
    }
}
