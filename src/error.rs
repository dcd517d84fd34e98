//! Error types for mergeclock

use thiserror::Error;

/// Errors produced by the reconciliation engine and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Remote repository API failure (network, rate limit, server error)
    #[error("{operation} failed: {message}")]
    RemoteApi {
        /// Gateway operation that failed (e.g. `get_reviews`)
        operation: String,
        /// Error detail from the remote or the transport
        message: String,
        /// Whether retrying the same call may succeed
        retryable: bool,
    },

    /// Malformed inbound event, rejected before it reaches the reconciler
    #[error("invalid event: {0}")]
    Validation(String),

    /// Merge refused by the remote (conflicts, failing required checks)
    #[error("merge blocked: {0}")]
    MergeBlocked(String),

    /// Tracking store failure
    #[error("tracking store error: {0}")]
    Persistence(String),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable credentials for the remote
    #[error("authentication error: {0}")]
    Auth(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a retryable remote error
    pub fn remote(operation: &str, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            operation: operation.to_string(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Build a remote error that retrying will not fix (404, 422, ...)
    pub fn remote_fatal(operation: &str, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            operation: operation.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether the failed operation is worth retrying within the same cycle
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteApi { retryable: true, .. })
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                let message = source.message.clone();
                Self::RemoteApi {
                    operation: "github".to_string(),
                    message: format!("{status}: {message}"),
                    retryable: is_retryable_status(status),
                }
            }
            _ => Self::remote("github", err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout()
            || err.is_connect()
            || err.status().is_none_or(|s| is_retryable_status(s.as_u16()));
        Self::RemoteApi {
            operation: "http".to_string(),
            message: err.to_string(),
            retryable,
        }
    }
}

/// Status codes that indicate a transient remote condition
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 403 | 408 | 429 | 500 | 502 | 503 | 504)
}

/// Result type alias using mergeclock's Error
pub type Result<T> = std::result::Result<T, Error>;
