//! HTTP surface: webhook endpoint, repository and pull request status, health check

use crate::error::Error;
use crate::ingest::Ingestor;
use crate::reconcile::Reconciler;
use crate::tracking::TrackedPullRequest;
use crate::types::{PrKey, RepoId};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Header carrying the webhook event name
const EVENT_HEADER: &str = "x-github-event";

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    reconciler: Arc<Reconciler>,
    ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Build handler state around a reconciler
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&reconciler)));
        Self {
            reconciler,
            ingestor,
        }
    }
}

/// Error type for HTTP responses
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RemoteApi { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Schedule of a tracked pull request, as served to the dashboard
#[derive(Debug, Serialize)]
pub struct PullRequestStatus {
    /// Repository full name
    pub repository: String,
    /// PR number
    pub number: u64,
    /// Head commit last observed
    pub head_sha: String,
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Most recent commit timestamp
    pub latest_commit_at: Option<DateTime<Utc>>,
    /// Last observed push
    pub last_force_push_at: Option<DateTime<Utc>>,
    /// Number of commits
    pub commit_count: u64,
    /// Net vote coefficient
    pub coefficient: f64,
    /// Current merge deadline
    pub deadline: Option<DateTime<Utc>>,
    /// Id of the last applied transition
    pub last_applied_transition_id: u64,
    /// Whether a transition is waiting to be resumed
    pub pending: bool,
}

impl From<TrackedPullRequest> for PullRequestStatus {
    fn from(pr: TrackedPullRequest) -> Self {
        Self {
            repository: pr.repo.full_name(),
            number: pr.number,
            head_sha: pr.head_sha,
            created_at: pr.created_at,
            latest_commit_at: pr.latest_commit_at,
            last_force_push_at: pr.last_force_push_at,
            commit_count: pr.commit_count,
            coefficient: pr.coefficient,
            deadline: pr.current_deadline,
            last_applied_transition_id: pr.last_applied_transition_id,
            pending: pr.pending.is_some(),
        }
    }
}

/// Tracked pull requests of one repository
#[derive(Debug, Serialize)]
pub struct RepositoryStatus {
    /// Repository full name
    pub repository: String,
    /// Whether the bot acts on this repository
    pub configured: bool,
    /// Tracked pull requests, by number
    pub pull_requests: Vec<PullRequestStatus>,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/github", post(github_webhook))
        .route("/github/", post(github_webhook))
        .route("/v1/{owner}/{repo}", get(repository_status))
        .route("/v1/{owner}/{repo}/", get(repository_status))
        .route("/v1/{owner}/{repo}/pull/{number}", get(pull_request_status))
        .route("/v1/{owner}/{repo}/pull/{number}/", get(pull_request_status))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` turns true
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening for webhooks");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            // A dropped sender also means shut down
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let event = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    state.ingestor.ingest(event, &body).await?;
    Ok(Json(json!({ "info": "All fine, thanks" })))
}

async fn repository_status(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepositoryStatus>, AppError> {
    let repo = RepoId::new(owner, repo);
    let store = state.reconciler.store();
    let mut tracked = store.list(&repo).await?;
    tracked.sort_by_key(|pr| pr.number);
    Ok(Json(RepositoryStatus {
        repository: repo.full_name(),
        configured: store.is_configured(&repo),
        pull_requests: tracked.into_iter().map(PullRequestStatus::from).collect(),
    }))
}

async fn pull_request_status(
    State(state): State<AppState>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> Result<Response, AppError> {
    let key = PrKey::new(RepoId::new(owner, repo), number);
    match state.reconciler.store().get(&key).await? {
        Some(tracked) => Ok(Json(PullRequestStatus::from(tracked)).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{key} is not tracked") })),
        )
            .into_response()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}
