//! Contributor weights derived from commit history

use crate::error::Result;
use crate::gateway::RepositoryGateway;
use crate::types::RepoId;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reviewer login → share of the repository's commits
///
/// Shares sum to 1 across all historical committers (or the map is empty).
/// Logins are compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributorWeights {
    shares: BTreeMap<String, f64>,
}

impl ContributorWeights {
    /// Normalize per-author commit counts into shares
    #[allow(clippy::cast_precision_loss)]
    pub fn from_commit_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut merged: BTreeMap<String, u64> = BTreeMap::new();
        for (login, commits) in counts {
            if commits > 0 {
                *merged.entry(login.to_lowercase()).or_default() += commits;
            }
        }

        let total: u64 = merged.values().sum();
        if total == 0 {
            return Self::default();
        }

        let shares = merged
            .into_iter()
            .map(|(login, commits)| (login, commits as f64 / total as f64))
            .collect();
        Self { shares }
    }

    /// Share for a login, zero for unknown reviewers
    pub fn share(&self, login: &str) -> f64 {
        self.shares
            .get(&login.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of contributors with a non-zero share
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether no contributor has any weight
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Iterate contributors in login order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.shares.iter().map(|(login, share)| (login.as_str(), *share))
    }
}

struct CachedWeights {
    fetched_at: DateTime<Utc>,
    weights: ContributorWeights,
}

/// Per-repository weight cache refreshed after a fixed time-to-live
///
/// Contributor statistics are expensive for the remote to compute, so weights
/// are recomputed periodically rather than on every reconciliation.
pub struct WeightCache {
    ttl: TimeDelta,
    entries: Mutex<HashMap<RepoId, CachedWeights>>,
}

impl WeightCache {
    /// Create an empty cache
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Weights for a repository, refreshing them when stale
    ///
    /// When the remote has no statistics yet, or a refresh fails while a
    /// stale entry exists, the stale (or empty) weights are returned without
    /// being cached as fresh.
    pub async fn get(
        &self,
        gateway: &dyn RepositoryGateway,
        repo: &RepoId,
        now: DateTime<Utc>,
    ) -> Result<ContributorWeights> {
        let stale = {
            let entries = self.entries.lock().await;
            match entries.get(repo) {
                Some(cached) if now - cached.fetched_at < self.ttl => {
                    return Ok(cached.weights.clone());
                }
                Some(cached) => Some(cached.weights.clone()),
                None => None,
            }
        };

        match gateway.get_contributor_commit_counts(repo).await {
            Ok(Some(counts)) => {
                let weights = ContributorWeights::from_commit_counts(counts);
                debug!(%repo, contributors = weights.len(), "refreshed contributor weights");
                self.entries.lock().await.insert(
                    repo.clone(),
                    CachedWeights {
                        fetched_at: now,
                        weights: weights.clone(),
                    },
                );
                Ok(weights)
            }
            Ok(None) => {
                debug!(%repo, "contributor statistics not ready yet");
                Ok(stale.unwrap_or_default())
            }
            Err(e) => match stale {
                Some(weights) => {
                    warn!(%repo, error = %e, "weight refresh failed, using stale weights");
                    Ok(weights)
                }
                None => Err(e),
            },
        }
    }

    /// Drop the cached entry for a repository
    pub async fn invalidate(&self, repo: &RepoId) {
        self.entries.lock().await.remove(repo);
    }
}
