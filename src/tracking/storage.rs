//! Persistence for tracking state in a TOML file.

use super::{TRACKING_VERSION, TrackedPullRequest, TrackingState, TrackingStore};
use crate::error::{Error, Result};
use crate::types::{PrKey, RepoId};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Directory name for mergeclock data.
const DATA_DIR: &str = "mergeclock";

/// Filename for tracking state.
const TRACKING_FILE: &str = "tracked.toml";

/// Default location of the tracking file under the user's data directory.
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR)
        .join(TRACKING_FILE)
}

/// Load tracking state from disk.
///
/// Returns an empty `TrackingState` if the file doesn't exist.
pub fn load_tracking(path: &Path) -> Result<TrackingState> {
    if !path.exists() {
        return Ok(TrackingState::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Persistence(format!("failed to read {}: {e}", path.display())))?;

    let state: TrackingState = toml::from_str(&content)
        .map_err(|e| Error::Persistence(format!("failed to parse {}: {e}", path.display())))?;

    if state.version > TRACKING_VERSION {
        return Err(Error::Persistence(format!(
            "{} has version {}, newer than supported version {TRACKING_VERSION}",
            path.display(),
            state.version
        )));
    }

    Ok(state)
}

/// Save tracking state to disk.
///
/// Creates the parent directory if needed. The file is written to a sibling
/// temporary file and renamed into place, so readers never see a partial write.
pub fn save_tracking(path: &Path, state: &TrackingState) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Persistence(format!("failed to create {}: {e}", dir.display())))?;
    }

    // Serialize with version
    let mut state_to_save = state.clone();
    state_to_save.version = TRACKING_VERSION;

    let content = toml::to_string_pretty(&state_to_save)
        .map_err(|e| Error::Persistence(format!("failed to serialize tracking state: {e}")))?;

    // Add header comment
    let content_with_header = format!(
        "# mergeclock tracking state\n# Auto-generated - manual edits may be overwritten\n\n{content}"
    );

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content_with_header)
        .map_err(|e| Error::Persistence(format!("failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| Error::Persistence(format!("failed to replace {}: {e}", path.display())))?;

    Ok(())
}

/// Tracking store backed by a single TOML file
///
/// The file is read once on open and kept in memory; every mutation rewrites
/// the file before the in-memory copy changes.
pub struct FileTrackingStore {
    path: PathBuf,
    repositories: BTreeSet<RepoId>,
    state: Mutex<TrackingState>,
}

impl FileTrackingStore {
    /// Open (or create on first write) the tracking file at `path`
    pub fn open(path: impl Into<PathBuf>, repositories: impl IntoIterator<Item = RepoId>) -> Result<Self> {
        let path = path.into();
        let state = load_tracking(&path)?;
        debug!(path = %path.display(), tracked = state.pull_requests.len(), "loaded tracking state");
        Ok(Self {
            path,
            repositories: repositories.into_iter().collect(),
            state: Mutex::new(state),
        })
    }

    /// Location of the tracking file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the state, write it, then commit it in memory
    ///
    /// The lock is held across the write so mutations reach the file in order.
    /// File I/O runs on the blocking pool.
    async fn mutate<T>(&self, f: impl FnOnce(&mut TrackingState) -> T) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next);

        let path = self.path.clone();
        let next = tokio::task::spawn_blocking(move || save_tracking(&path, &next).map(|()| next))
            .await
            .map_err(|e| Error::Internal(format!("tracking write task failed: {e}")))??;

        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl TrackingStore for FileTrackingStore {
    async fn get(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>> {
        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn put(&self, record: TrackedPullRequest) -> Result<()> {
        self.mutate(|state| state.track(record)).await
    }

    async fn remove(&self, key: &PrKey) -> Result<Option<TrackedPullRequest>> {
        {
            let state = self.state.lock().await;
            if state.get(key).is_none() {
                return Ok(None);
            }
        }
        self.mutate(|state| state.untrack(key)).await
    }

    async fn list(&self, repo: &RepoId) -> Result<Vec<TrackedPullRequest>> {
        Ok(self.state.lock().await.for_repo(repo).cloned().collect())
    }

    fn configured_repositories(&self) -> Vec<RepoId> {
        self.repositories.iter().cloned().collect()
    }

    fn is_configured(&self, repo: &RepoId) -> bool {
        self.repositories.contains(repo)
    }
}
