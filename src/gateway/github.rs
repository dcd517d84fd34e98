//! GitHub gateway implementation

use crate::error::{Error, Result, is_retryable_status};
use crate::gateway::RepositoryGateway;
use crate::types::{
    CommitRecord, MergeMethod, MergeResult, PrState, PullRequestInfo, RepoId, ReviewRecord,
    StatusUpdate, Verdict,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Page size for list endpoints
const PER_PAGE: usize = 100;

/// GitHub truncates status descriptions longer than this
const MAX_STATUS_DESCRIPTION: usize = 140;

// Raw REST response types for endpoints we call without octocrab

#[derive(Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    author: Option<RawSignature>,
    committer: Option<RawSignature>,
}

#[derive(Deserialize)]
struct RawSignature {
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawContributorStats {
    author: Option<RawAuthor>,
    total: u64,
}

#[derive(Deserialize)]
struct RawAuthor {
    login: String,
}

#[derive(Deserialize)]
struct RawComment {
    body: Option<String>,
}

#[derive(Serialize)]
struct CreateStatusRequest<'a> {
    state: &'a str,
    target_url: &'a str,
    description: &'a str,
    context: &'a str,
}

/// GitHub gateway using octocrab
///
/// PR, review, comment and merge calls go through octocrab; commits, commit
/// statuses and contributor statistics use raw HTTP requests.
pub struct GitHubGateway {
    client: Octocrab,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// API base URL for raw requests, without trailing slash
    api_base: String,
}

impl GitHubGateway {
    /// Create a gateway for github.com or a GitHub Enterprise host
    pub fn new(token: &str, host: Option<&str>) -> Result<Self> {
        let api_base = host.map_or_else(
            || "https://api.github.com".to_string(),
            |h| format!("https://{h}/api/v3"),
        );
        Self::with_api_base(token, &api_base)
    }

    /// Create a gateway against an explicit API base URL
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_base.as_str())
            .map_err(|e| Error::Config(format!("invalid GitHub API base '{api_base}': {e}")))?
            .build()
            .map_err(|e| Error::Config(format!("failed to build GitHub client: {e}")))?;

        let http_client = Client::builder()
            .user_agent(concat!("mergeclock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.to_string(),
            http_client,
            api_base,
        })
    }

    fn repo_url(&self, repo: &RepoId, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name(),
            path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Turn a non-success response into a remote error
    async fn check(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::RemoteApi {
            operation: operation.to_string(),
            message: format!("{status}: {}", body.trim()),
            retryable: is_retryable_status(status.as_u16()),
        })
    }
}

/// Helper to convert an octocrab PR to our `PullRequestInfo` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequestInfo {
    // IssueState is non-exhaustive, so use wildcard for Closed and any future variants
    let state = match pr.state {
        Some(octocrab::models::IssueState::Open) => PrState::Open,
        Some(_) | None if pr.merged_at.is_some() => PrState::Merged,
        Some(_) | None => PrState::Closed,
    };

    PullRequestInfo {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        state,
        is_draft: pr.draft.unwrap_or(false),
        mergeable: pr.mergeable,
        created_at: pr.created_at.unwrap_or_default(),
        head_sha: pr.head.sha.clone(),
        author: pr.user.as_ref().map(|u| u.login.clone()),
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

fn verdict_from_octocrab(state: &octocrab::models::pulls::ReviewState) -> Option<Verdict> {
    use octocrab::models::pulls::ReviewState;
    match state {
        ReviewState::Approved => Some(Verdict::Approve),
        ReviewState::ChangesRequested => Some(Verdict::RequestChanges),
        ReviewState::Commented => Some(Verdict::Comment),
        // Pending and dismissed reviews carry no verdict
        _ => None,
    }
}

fn truncate_description(description: &str) -> &str {
    match description.char_indices().nth(MAX_STATUS_DESCRIPTION) {
        Some((idx, _)) => &description[..idx],
        None => description,
    }
}

#[async_trait]
impl RepositoryGateway for GitHubGateway {
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequestInfo> {
        debug!(%repo, number, "getting PR");
        let pr = self
            .client
            .pulls(repo.owner(), repo.name())
            .get(number)
            .await?;

        let info = pr_from_octocrab(&pr);
        debug!(%repo, number, state = %info.state, mergeable = ?info.mergeable, "got PR");
        Ok(info)
    }

    async fn list_open_pull_requests(&self, repo: &RepoId) -> Result<Vec<PullRequestInfo>> {
        debug!(%repo, "listing open PRs");
        let page = self
            .client
            .pulls(repo.owner(), repo.name())
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;
        let prs = self.client.all_pages(page).await?;

        let result: Vec<PullRequestInfo> = prs.iter().map(pr_from_octocrab).collect();
        debug!(%repo, count = result.len(), "listed open PRs");
        Ok(result)
    }

    async fn get_commits(&self, repo: &RepoId, number: u64) -> Result<Vec<CommitRecord>> {
        debug!(%repo, number, "listing PR commits");
        let url = self.repo_url(repo, &format!("pulls/{number}/commits"));
        let mut commits = Vec::new();

        for page in 1.. {
            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<RawCommit> = Self::check("get_commits", response).await?.json().await?;
            let fetched = batch.len();

            commits.extend(batch.into_iter().filter_map(|c| {
                let date = c
                    .commit
                    .author
                    .and_then(|a| a.date)
                    .or_else(|| c.commit.committer.and_then(|a| a.date))?;
                Some(CommitRecord {
                    sha: c.sha,
                    authored_at: date,
                })
            }));

            if fetched < PER_PAGE {
                break;
            }
        }

        debug!(%repo, number, count = commits.len(), "listed PR commits");
        Ok(commits)
    }

    async fn get_reviews(&self, repo: &RepoId, number: u64) -> Result<Vec<ReviewRecord>> {
        debug!(%repo, number, "listing PR reviews");
        let page = self
            .client
            .pulls(repo.owner(), repo.name())
            .list_reviews(number)
            .send()
            .await?;
        let reviews = self.client.all_pages(page).await?;

        let result: Vec<ReviewRecord> = reviews
            .into_iter()
            .filter_map(|r| {
                let verdict = verdict_from_octocrab(r.state.as_ref()?)?;
                Some(ReviewRecord {
                    reviewer: r.user?.login,
                    verdict,
                    submitted_at: r.submitted_at?,
                })
            })
            .collect();
        debug!(%repo, number, count = result.len(), "listed PR reviews");
        Ok(result)
    }

    async fn get_contributor_commit_counts(
        &self,
        repo: &RepoId,
    ) -> Result<Option<HashMap<String, u64>>> {
        debug!(%repo, "fetching contributor statistics");
        let url = self.repo_url(repo, "stats/contributors");
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        match response.status() {
            // GitHub computes statistics in the background and answers 202 meanwhile
            StatusCode::ACCEPTED => {
                debug!(%repo, "contributor statistics still computing");
                return Ok(None);
            }
            StatusCode::NO_CONTENT => return Ok(Some(HashMap::new())),
            _ => {}
        }

        let stats: Vec<RawContributorStats> = Self::check("get_contributor_commit_counts", response)
            .await?
            .json()
            .await?;

        let counts: HashMap<String, u64> = stats
            .into_iter()
            .filter_map(|s| Some((s.author?.login, s.total)))
            .collect();
        debug!(%repo, contributors = counts.len(), "fetched contributor statistics");
        Ok(Some(counts))
    }

    async fn has_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<bool> {
        debug!(%repo, number, "searching PR comments");
        let url = self.repo_url(repo, &format!("issues/{number}/comments"));
        let wanted = body.trim();

        for page in 1.. {
            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<RawComment> = Self::check("has_comment", response).await?.json().await?;

            if batch
                .iter()
                .any(|c| c.body.as_deref().map(str::trim) == Some(wanted))
            {
                debug!(%repo, number, page, "found matching PR comment");
                return Ok(true);
            }
            if batch.len() < PER_PAGE {
                break;
            }
        }

        Ok(false)
    }

    async fn post_comment(&self, repo: &RepoId, number: u64, body: &str) -> Result<()> {
        debug!(%repo, number, "creating PR comment");
        self.client
            .issues(repo.owner(), repo.name())
            .create_comment(number, body)
            .await?;
        debug!(%repo, number, "created PR comment");
        Ok(())
    }

    async fn set_status(&self, repo: &RepoId, sha: &str, status: &StatusUpdate) -> Result<()> {
        debug!(%repo, sha, state = %status.state, "setting commit status");
        let url = self.repo_url(repo, &format!("statuses/{sha}"));
        let body = CreateStatusRequest {
            state: status.state.as_str(),
            target_url: &status.target_url,
            description: truncate_description(&status.description),
            context: &status.context,
        };

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        Self::check("set_status", response).await?;
        debug!(%repo, sha, "set commit status");
        Ok(())
    }

    async fn merge(&self, repo: &RepoId, number: u64, method: MergeMethod) -> Result<MergeResult> {
        debug!(%repo, number, %method, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let result = self
            .client
            .pulls(repo.owner(), repo.name())
            .merge(number)
            .method(octocrab_method)
            .send()
            .await
            .map_err(|e| match &e {
                // 405: not mergeable, 409: head moved underneath us
                octocrab::Error::GitHub { source, .. }
                    if matches!(source.status_code.as_u16(), 405 | 409) =>
                {
                    Error::MergeBlocked(source.message.clone())
                }
                _ => Error::from(e),
            })?;

        let merge_result = MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        };

        debug!(
            %repo,
            number,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }
}
