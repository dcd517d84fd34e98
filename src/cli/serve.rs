//! Serve command - webhook server plus periodic sweep

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, arrow, check};
use anstream::println;
use mergeclock::config::Config;
use mergeclock::error::{Error, Result};
use mergeclock::server::{AppState, serve};
use mergeclock::sweep::SweepScheduler;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Options for the serve command
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// Listen address overriding the config file
    pub bind: Option<String>,
    /// Disable the periodic sweep
    pub no_sweep: bool,
}

/// Run the serve command until Ctrl-C or SIGTERM
pub async fn run_serve(config_path: Option<&Path>, options: ServeOptions) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(bind) = options.bind {
        config.server.bind = bind;
    }
    if options.no_sweep {
        config.sweep.enabled = false;
    }
    let addr = config.bind_addr()?;

    if config.repositories.is_empty() {
        warn!("no repositories configured, every event will be ignored");
    }

    let ctx = CommandContext::from_config(config).await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind {addr}: {e}")))?;

    println!("{} Listening on {}", check(), addr.to_string().emphasis());
    for repo in &ctx.config.repositories {
        println!("  {} {}", arrow(), repo.to_string().accent());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep = if ctx.config.sweep.enabled {
        let scheduler = SweepScheduler::new(Arc::clone(&ctx.reconciler))
            .with_interval(ctx.config.sweep_interval())
            .with_concurrency(ctx.config.sweep.concurrency);
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move { scheduler.run(rx).await }))
    } else {
        println!("{}", "Periodic sweep disabled".muted());
        None
    };

    let state = AppState::new(Arc::clone(&ctx.reconciler));
    let server = tokio::spawn(serve(listener, state, shutdown_rx));

    wait_for_signal().await;
    info!("shutdown requested");
    // Receivers may already be gone if a task exited early
    let _ = shutdown_tx.send(true);

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "server stopped with error"),
        Err(e) => warn!(error = %e, "server task failed"),
    }
    if let Some(sweep) = sweep
        && let Err(e) = sweep.await
    {
        warn!(error = %e, "sweep task failed");
    }

    println!("{}", "Stopped".muted());
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
