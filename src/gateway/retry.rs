//! Timeouts and bounded retries around gateway calls

use crate::error::{Error, Result};
use crate::gateway::RepositoryGateway;
use crate::types::{
    CommitRecord, MergeMethod, MergeResult, PullRequestInfo, RepoId, ReviewRecord, StatusUpdate,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how long a gateway call may be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Timeout for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Backoff before retry number `attempt` (1-based)
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent).min(MAX_BACKOFF)
}

/// Run `call` under `policy`, retrying timeouts and retryable errors
///
/// Non-retryable errors are returned immediately. After the last attempt the
/// final error is returned and the caller defers to the next trigger.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => Error::remote(
                operation,
                format!("timed out after {}s", policy.timeout.as_secs_f64()),
            ),
        };

        if !err.is_retryable() || attempt >= max_attempts {
            return Err(err);
        }

        let delay = retry_delay(policy.base_delay, attempt);
        warn!(operation, attempt, max_attempts, ?delay, error = %err, "retrying gateway call");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Gateway decorator applying a [`RetryPolicy`] to gateway calls
///
/// `post_comment` gets the timeout but a single attempt: a comment whose
/// response was lost may already exist, and the caller checks for it with
/// `has_comment` before posting again.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: RepositoryGateway> RetryingGateway<G> {
    /// Wrap a gateway
    pub const fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped gateway
    pub const fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: RepositoryGateway> RepositoryGateway for RetryingGateway<G> {
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequestInfo> {
        with_retry(&self.policy, "get_pull_request", || {
            self.inner.get_pull_request(repo, number)
        })
        .await
    }

    async fn list_open_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequestInfo>> {
        with_retry(&self.policy, "list_open_pull_requests", || {
            self.inner.list_open_pull_requests(repo)
        })
        .await
    }

    async fn get_commits(&self, repo: &RepoId, number: u64) -> Result<Vec<CommitRecord>> {
        with_retry(&self.policy, "get_commits", || {
            self.inner.get_commits(repo, number)
        })
        .await
    }

    async fn get_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewRecord>> {
        with_retry(&self.policy, "get_reviews", || {
            self.inner.get_reviews(repo, number)
        })
        .await
    }

    async fn get_contributor_commit_counts(
        &self,
        repo: &RepoId,
    ) -> Result<Option<HashMap<String, u64>>> {
        with_retry(&self.policy, "get_contributor_commit_counts", || {
            self.inner.get_contributor_commit_counts(repo)
        })
        .await
    }

    async fn has_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<bool> {
        with_retry(&self.policy, "has_comment", || {
            self.inner.has_comment(repo, number, body)
        })
        .await
    }

    async fn post_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<()> {
        let once = RetryPolicy {
            max_attempts: 1,
            ..self.policy
        };
        with_retry(&once, "post_comment", || {
            self.inner.post_comment(repo, number, body)
        })
        .await
    }

    async fn set_status(&self, repo: &RepoId, sha: &str, status: &StatusUpdate) -> Result<()> {
        with_retry(&self.policy, "set_status", || {
            self.inner.set_status(repo, sha, status)
        })
        .await
    }

    async fn merge(&self, repo: &RepoId, number: u64, method: MergeMethod) -> Result<MergeResult> {
        with_retry(&self.policy, "merge", || {
            self.inner.merge(repo, number, method)
        })
        .await
    }
}
