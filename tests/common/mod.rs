//! Shared test utilities

#![allow(dead_code)]

mod memory_store;
mod mock_gateway;

pub use memory_store::MemoryStore;
pub use mock_gateway::{CommentCall, MergeCall, MockGateway, StatusCall};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mergeclock::clock::Clock;
use mergeclock::reconcile::{Links, Reconciler};
use mergeclock::types::{
    CommitRecord, PrKey, PrState, PullRequestInfo, RepoId, ReviewRecord, Verdict,
};
use std::sync::{Arc, Mutex};

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Fixed reference instant used across tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn repo() -> RepoId {
    RepoId::new("acme", "widgets")
}

pub fn key(number: u64) -> PrKey {
    PrKey::new(repo(), number)
}

/// Open, mergeable, non-draft pull request
pub fn open_pr(number: u64, created_at: DateTime<Utc>, head_sha: &str) -> PullRequestInfo {
    PullRequestInfo {
        number,
        title: format!("PR {number}"),
        state: PrState::Open,
        is_draft: false,
        mergeable: Some(true),
        created_at,
        head_sha: head_sha.to_string(),
        author: Some("alice".to_string()),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
    }
}

pub fn commit(sha: &str, authored_at: DateTime<Utc>) -> CommitRecord {
    CommitRecord {
        sha: sha.to_string(),
        authored_at,
    }
}

pub fn review(reviewer: &str, verdict: Verdict, submitted_at: DateTime<Utc>) -> ReviewRecord {
    ReviewRecord {
        reviewer: reviewer.to_string(),
        verdict,
        submitted_at,
    }
}

pub fn links() -> Links {
    Links {
        base_url: "https://merge.example.org".to_string(),
        display_name: "mergeclock".to_string(),
        status_context: "mergeclock".to_string(),
    }
}

/// Reconciler wired to in-memory doubles
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    /// Harness with `acme/widgets` configured and the clock at `t0()`
    pub fn new() -> Self {
        Self::with_repositories(vec![repo()])
    }

    pub fn with_repositories(repositories: Vec<RepoId>) -> Self {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new(repositories));
        let clock = Arc::new(ManualClock::new(t0()));
        let reconciler = Arc::new(Reconciler::new(
            gateway.clone(),
            store.clone(),
            clock.clone(),
            links(),
        ));
        Self {
            gateway,
            store,
            clock,
            reconciler,
        }
    }

    /// Open PR `number` at `t0()` with a single commit authored at `t0()`
    pub fn open_single_commit_pr(&self, number: u64) -> PrKey {
        let key = key(number);
        let sha = format!("head-{number}");
        self.gateway.add_pr(&key, open_pr(number, t0(), &sha));
        self.gateway.set_commits(&key, vec![commit(&sha, t0())]);
        key
    }
}
