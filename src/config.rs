//! Service configuration
//!
//! Read from `~/.config/mergeclock/config.toml` (or `--config`). Every
//! section is optional and falls back to defaults; `PORT` and
//! `MERGECLOCK_DISABLE_SWEEP` override the file.

use crate::error::{Error, Result};
use crate::gateway::RetryPolicy;
use crate::reconcile::Links;
use crate::tracking::default_state_path;
use crate::types::{MergeMethod, RepoId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "PORT";

/// Environment variable disabling the periodic sweep
pub const DISABLE_SWEEP_ENV: &str = "MERGECLOCK_DISABLE_SWEEP";

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Repositories the bot operates on
    pub repositories: Vec<RepoId>,
    /// How due pull requests are merged
    pub merge_method: MergeMethod,
    /// HTTP listener
    pub server: ServerConfig,
    /// GitHub connection
    pub github: GitHubConfig,
    /// Periodic sweep
    pub sweep: SweepConfig,
    /// Gateway retries
    pub retry: RetryConfig,
    /// Links and names used in comments and statuses
    pub links: LinksConfig,
    /// Tracking state
    pub state: StateConfig,
    /// Contributor weights
    pub weights: WeightsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

/// GitHub connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// GitHub Enterprise host; github.com when unset
    pub host: Option<String>,
}

/// Sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Whether the periodic sweep runs
    pub enabled: bool,
    /// Minutes between passes
    pub interval_minutes: u64,
    /// Pull requests reconciled at once
    pub concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 51,
            concurrency: 4,
        }
    }
}

/// Gateway retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Per-attempt timeout, in seconds
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Link and naming settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// Public base URL of the dashboard
    pub base_url: String,
    /// Name shown in comments
    pub display_name: String,
    /// Commit status context
    pub status_context: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        let links = Links::default();
        Self {
            base_url: links.base_url,
            display_name: links.display_name,
            status_context: links.status_context,
        }
    }
}

/// Tracking state settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// Tracking file; defaults to the user data directory
    pub path: Option<PathBuf>,
}

/// Contributor weight settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightsConfig {
    /// Minutes before contributor statistics are fetched again
    pub refresh_minutes: u64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: 60,
        }
    }
}

impl Config {
    /// Default config path (`~/.config/mergeclock/config.toml`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mergeclock")
            .join("config.toml")
    }

    /// Load from `path`, or from the default path when `None`
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error. Environment overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    debug!(path = %default.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading configuration");
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Apply environment overrides read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var(PORT_ENV) {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{PORT_ENV} is not a valid port: '{port}'")))?;
            let mut addr = self.bind_addr()?;
            addr.set_port(port);
            self.server.bind = addr.to_string();
        }

        if let Some(flag) = var(DISABLE_SWEEP_ENV)
            && matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        {
            self.sweep.enabled = false;
        }

        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        let url = Url::parse(&self.links.base_url).map_err(|e| {
            Error::Config(format!("links.base_url '{}' is invalid: {e}", self.links.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "links.base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.links.status_context.trim().is_empty() {
            return Err(Error::Config("links.status_context must not be empty".into()));
        }
        if self.sweep.interval_minutes == 0 {
            return Err(Error::Config("sweep.interval_minutes must be positive".into()));
        }
        if self.sweep.concurrency == 0 {
            return Err(Error::Config("sweep.concurrency must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be positive".into()));
        }
        Ok(())
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            Error::Config(format!("server.bind '{}' is invalid: {e}", self.server.bind))
        })
    }

    /// Retry policy for the gateway
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            timeout: Duration::from_secs(self.retry.timeout_secs),
        }
    }

    /// Links used in comments and statuses
    pub fn links(&self) -> Links {
        Links {
            base_url: self.links.base_url.trim_end_matches('/').to_string(),
            display_name: self.links.display_name.clone(),
            status_context: self.links.status_context.clone(),
        }
    }

    /// Time between sweep passes
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_minutes.saturating_mul(60))
    }

    /// Contributor weight refresh interval
    pub fn weight_ttl(&self) -> chrono::TimeDelta {
        i64::try_from(self.weights.refresh_minutes)
            .ok()
            .and_then(chrono::TimeDelta::try_minutes)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    /// Tracking file location
    pub fn state_path(&self) -> PathBuf {
        self.state.path.clone().unwrap_or_else(default_state_path)
    }
}
