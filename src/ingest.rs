//! Inbound webhook events
//!
//! Payloads are parsed into [`InboundEvent`] at the boundary; only
//! well-formed events reach the reconciler.

use crate::error::{Error, Result};
use crate::reconcile::{Reconciler, Trigger};
use crate::types::{PrKey, RepoId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A validated inbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A lifecycle change the reconciler acts on
    Lifecycle {
        /// Pull request concerned
        key: PrKey,
        /// Reconciliation trigger
        trigger: Trigger,
    },
    /// Title or body edited; logged only
    Edited {
        /// Pull request concerned, when the payload names one
        key: Option<PrKey>,
    },
    /// Handled action whose payload names no pull request; acknowledged only
    Unidentified {
        /// Payload action
        action: String,
    },
    /// Event or action the bot does not act on
    Unhandled {
        /// `X-GitHub-Event` value
        event: String,
        /// Payload action, if any
        action: Option<String>,
    },
}

#[derive(Deserialize)]
struct Payload {
    action: Option<String>,
    repository: Option<RepositoryPayload>,
    pull_request: Option<PullRequestPayload>,
    number: Option<u64>,
}

#[derive(Deserialize)]
struct RepositoryPayload {
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: Option<u64>,
}

impl Payload {
    fn key(&self) -> Option<PrKey> {
        let repo: RepoId = self.repository.as_ref()?.full_name.as_deref()?.parse().ok()?;
        let number = self
            .pull_request
            .as_ref()
            .and_then(|pr| pr.number)
            .or(self.number)?;
        Some(PrKey::new(repo, number))
    }

    fn require_key(&self) -> Result<PrKey> {
        self.key().ok_or_else(|| {
            Error::Validation("payload has no repository full_name or pull request number".into())
        })
    }
}

/// Parse an `X-GitHub-Event` header and JSON body into an event
///
/// Fails with `Error::Validation` for missing headers, malformed JSON and
/// handled events that lack an action or pull request identity. `closed` and
/// `edited` without identity are acknowledged, since there is nothing to do.
pub fn parse_event(event: Option<&str>, body: &[u8]) -> Result<InboundEvent> {
    let event = event
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::Validation("missing X-GitHub-Event header".into()))?;

    let payload: Payload = serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("malformed JSON payload: {e}")))?;

    let handled = matches!(event, "pull_request" | "pull_request_review");
    if !handled {
        return Ok(InboundEvent::Unhandled {
            event: event.to_string(),
            action: payload.action,
        });
    }

    let action = payload
        .action
        .as_deref()
        .ok_or_else(|| Error::Validation(format!("{event} payload has no action")))?;

    let trigger = match (event, action) {
        ("pull_request", "opened") => Trigger::Opened,
        ("pull_request", "reopened") => Trigger::Reopened,
        ("pull_request", "synchronize") => Trigger::Synchronize,
        ("pull_request", "closed") => Trigger::Closed,
        ("pull_request", "edited") => return Ok(InboundEvent::Edited { key: payload.key() }),
        ("pull_request_review", "submitted") => Trigger::ReviewSubmitted,
        _ => {
            return Ok(InboundEvent::Unhandled {
                event: event.to_string(),
                action: Some(action.to_string()),
            });
        }
    };

    // Nothing to untrack without an identity
    if trigger == Trigger::Closed && payload.key().is_none() {
        return Ok(InboundEvent::Unidentified {
            action: action.to_string(),
        });
    }

    Ok(InboundEvent::Lifecycle {
        key: payload.require_key()?,
        trigger,
    })
}

/// Hands validated events to the reconciler
pub struct Ingestor {
    reconciler: Arc<Reconciler>,
}

impl Ingestor {
    /// Create an ingestor driving `reconciler`
    pub const fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Validate and dispatch one notification
    ///
    /// Only validation failures are returned. Once an event reaches the
    /// reconciler it is acknowledged; reconciliation errors are logged and
    /// left to the next sweep.
    pub async fn ingest(&self, event: Option<&str>, body: &[u8]) -> Result<InboundEvent> {
        let parsed = parse_event(event, body)?;

        match &parsed {
            InboundEvent::Lifecycle { key, trigger } => {
                info!(%key, %trigger, "received pull request event");
                match self.reconciler.reconcile(key, *trigger).await {
                    Ok(outcome) => debug!(%key, ?outcome, "event reconciled"),
                    Err(e) => warn!(%key, %trigger, error = %e, "event reconciliation failed"),
                }
            }
            InboundEvent::Edited { key: Some(key) } => {
                if let Err(e) = self.reconciler.reconcile(key, Trigger::Edited).await {
                    warn!(%key, error = %e, "edited event failed");
                }
            }
            InboundEvent::Edited { key: None } => {
                info!("pull request edited");
            }
            InboundEvent::Unidentified { action } => {
                info!(action, "pull request event without identity, nothing to do");
            }
            InboundEvent::Unhandled { event, action } => {
                debug!(event, ?action, "ignoring event");
            }
        }

        Ok(parsed)
    }
}
