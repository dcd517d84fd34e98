//! Remote repository gateway
//!
//! The reconciler only ever talks to the remote through [`RepositoryGateway`],
//! so the GitHub implementation, the retrying decorator and test doubles are
//! interchangeable.

mod github;
mod retry;

pub use github::GitHubGateway;
pub use retry::{RetryPolicy, RetryingGateway, retry_delay, with_retry};

use crate::error::Result;
use crate::types::{
    CommitRecord, MergeMethod, MergeResult, PullRequestInfo, RepoId, ReviewRecord, StatusUpdate,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Operations the reconciler needs from the remote repository host
///
/// Every call is fallible. Reads and status writes may be retried; comment
/// posting may not, see [`RepositoryGateway::post_comment`].
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Fetch pull request metadata
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequestInfo>;

    /// List currently open pull requests of a repository
    async fn list_open_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequestInfo>>;

    /// List the commits of a pull request
    async fn get_commits(&self, repo: &RepoId, number: u64) -> Result<Vec<CommitRecord>>;

    /// List submitted reviews of a pull request
    ///
    /// Pending and dismissed reviews are not returned.
    async fn get_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewRecord>>;

    /// Per-author commit counts over the repository's history
    ///
    /// Returns `None` while the remote is still computing the statistics.
    async fn get_contributor_commit_counts(
        &self,
        repo: &RepoId,
    ) -> Result<Option<HashMap<String, u64>>>;

    /// Whether a comment with exactly this body exists on a pull request
    ///
    /// Surrounding whitespace is ignored.
    async fn has_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<bool>;

    /// Post a comment on a pull request
    ///
    /// Not idempotent: a failed call may still have created the comment.
    async fn post_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<()>;

    /// Set a commit status on a commit
    async fn set_status(&self, repo: &RepoId, sha: &str, status: &StatusUpdate) -> Result<()>;

    /// Merge a pull request
    ///
    /// Returns `Error::MergeBlocked` when the remote refuses the merge.
    async fn merge(&self, repo: &RepoId, number: u64, method: MergeMethod) -> Result<MergeResult>;
}
