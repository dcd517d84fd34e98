//! In-memory tracking store for testing

#![allow(dead_code)]

use async_trait::async_trait;
use mergeclock::error::{Error, Result};
use mergeclock::tracking::{TrackedPullRequest, TrackingState, TrackingStore};
use mergeclock::types::{PrKey, RepoId};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Tracking store that keeps state in memory
///
/// Supports write failure injection to exercise the write-ahead path.
pub struct MemoryStore {
    state: Mutex<TrackingState>,
    repositories: Vec<RepoId>,
    fail_writes: AtomicBool,
    put_count: AtomicUsize,
}

impl MemoryStore {
    pub fn new(repositories: Vec<RepoId>) -> Self {
        Self {
            state: Mutex::new(TrackingState::new()),
            repositories,
            fail_writes: AtomicBool::new(false),
            put_count: AtomicUsize::new(0),
        }
    }

    /// Make every `put` and `remove` fail until cleared
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `put` calls
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every tracked record
    pub fn snapshot(&self) -> TrackingState {
        self.state.lock().unwrap().clone()
    }

    /// Synchronous lookup for assertions
    pub fn record(&self, key: &PrKey) -> Option<TrackedPullRequest> {
        self.state.lock().unwrap().get(key).cloned()
    }

    /// Seed a record without counting it as a write
    pub fn seed(&self, record: TrackedPullRequest) {
        self.state.lock().unwrap().track(record);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn get(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>> {
        Ok(self.state.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, record: TrackedPullRequest) -> Result<()> {
        self.check_writable()?;
        self.state.lock().unwrap().track(record);
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>> {
        self.check_writable()?;
        Ok(self.state.lock().unwrap().untrack(key))
    }

    async fn list(&self, repo: &RepoId) -> Result<Vec<TrackedPullRequest>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .for_repo(repo)
            .cloned()
            .collect())
    }

    fn configured_repositories(&self) -> Vec<RepoId> {
        self.repositories.clone()
    }
}
