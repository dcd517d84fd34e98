//! Shared command context for CLI commands
//!
//! Extracts common setup code shared by serve, sweep, and deadline commands.

use mergeclock::auth::get_github_auth;
use mergeclock::clock::SystemClock;
use mergeclock::config::Config;
use mergeclock::error::Result;
use mergeclock::gateway::{GitHubGateway, RetryingGateway};
use mergeclock::reconcile::Reconciler;
use mergeclock::tracking::FileTrackingStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared context for CLI commands that talk to GitHub
///
/// This struct encapsulates the common setup:
/// - Loading configuration
/// - Resolving GitHub credentials
/// - Opening the tracking store
/// - Wiring the reconciler
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Reconciler wired to GitHub and the tracking file
    pub reconciler: Arc<Reconciler>,
}

impl CommandContext {
    /// Create a new command context
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path)?;
        Self::from_config(config).await
    }

    /// Create a context from an already loaded configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        let host = config.github.host.as_deref();
        let auth = get_github_auth(host).await?;
        info!(source = ?auth.source, host = host.unwrap_or("github.com"), "authenticated");

        let github = GitHubGateway::new(&auth.token, host)?;
        let gateway = Arc::new(RetryingGateway::new(github, config.retry_policy()));

        let store = Arc::new(FileTrackingStore::open(
            config.state_path(),
            config.repositories.iter().cloned(),
        )?);

        let reconciler = Reconciler::new(gateway, store, Arc::new(SystemClock), config.links())
            .with_merge_method(config.merge_method)
            .with_weight_ttl(config.weight_ttl());

        Ok(Self {
            config,
            reconciler: Arc::new(reconciler),
        })
    }
}
