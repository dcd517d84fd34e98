//! Periodic sweep over tracked and open pull requests
//!
//! Catches everything the event path missed: late reviews, lost webhook
//! deliveries, pushes, and deadlines that passed while nothing happened.

use crate::reconcile::{ReconcileOutcome, Reconciler, Trigger};
use crate::types::PrKey;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default time between sweep passes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(51 * 60);

/// Default number of pull requests reconciled at once
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pull requests reconciled without error
    pub reconciled: usize,
    /// Pull requests merged
    pub merged: usize,
    /// Pull requests past their deadline that could not be merged
    pub blocked: usize,
    /// Pull requests that stopped being tracked
    pub untracked: usize,
    /// Reconciliations (or repository listings) that failed
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        self.reconciled += 1;
        match outcome {
            ReconcileOutcome::Merged { .. } => self.merged += 1,
            ReconcileOutcome::Blocked { .. } => self.blocked += 1,
            ReconcileOutcome::Untracked => self.untracked += 1,
            ReconcileOutcome::Ignored | ReconcileOutcome::Scheduled { .. } => {}
        }
    }
}

/// Drives the reconciler's sweep path on a fixed interval
pub struct SweepScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    concurrency: usize,
}

impl SweepScheduler {
    /// Create a scheduler with the default interval and concurrency
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            interval: DEFAULT_SWEEP_INTERVAL,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    /// Set the time between passes
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how many pull requests are reconciled at once
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run a single pass over every configured repository
    ///
    /// Failures are counted and logged; they never abort the pass.
    pub async fn run_once(&self) -> SweepReport {
        let report = Mutex::new(SweepReport::default());
        let mut keys: Vec<PrKey> = Vec::new();

        for repo in self.reconciler.store().configured_repositories() {
            match self.reconciler.sweep_candidates(&repo).await {
                Ok(found) => keys.extend(found),
                Err(e) => {
                    warn!(%repo, error = %e, "failed to collect pull requests for sweep");
                    report.lock().unwrap_or_else(PoisonError::into_inner).failed += 1;
                }
            }
        }
        debug!(candidates = keys.len(), "sweeping pull requests");

        stream::iter(keys)
            .for_each_concurrent(self.concurrency, |key| {
                let report = &report;
                async move {
                    let result = self.reconciler.reconcile(&key, Trigger::Sweep).await;
                    let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
                    match result {
                        Ok(outcome) => report.record(&outcome),
                        Err(e) => {
                            warn!(%key, error = %e, "sweep reconciliation failed");
                            report.failed += 1;
                        }
                    }
                }
            })
            .await;

        report.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sweep immediately, then every interval, until `shutdown` turns true
    ///
    /// A pass in flight always runs to completion before shutdown is honoured.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), concurrency = self.concurrency, "sweep scheduler started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_once().await;
                    info!(
                        reconciled = report.reconciled,
                        merged = report.merged,
                        blocked = report.blocked,
                        untracked = report.untracked,
                        failed = report.failed,
                        "sweep pass complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("sweep scheduler stopped");
    }
}
