//! Sweep command - one reconciliation pass over every configured repository

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use mergeclock::error::Result;
use mergeclock::sweep::SweepScheduler;
use std::path::Path;
use std::sync::Arc;

/// Run the sweep command
pub async fn run_sweep(config_path: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::new(config_path).await?;

    if ctx.config.repositories.is_empty() {
        println!("{}", "No repositories configured".muted());
        return Ok(());
    }

    let scheduler = SweepScheduler::new(Arc::clone(&ctx.reconciler))
        .with_concurrency(ctx.config.sweep.concurrency);
    let report = scheduler.run_once().await;

    println!(
        "{} Swept {} pull request(s)",
        check(),
        report.reconciled.emphasis()
    );
    if report.merged > 0 {
        println!("  merged:  {}", report.merged.accent());
    }
    if report.blocked > 0 {
        println!("  blocked: {}", report.blocked.warning());
    }
    if report.untracked > 0 {
        println!("  untracked: {}", report.untracked.muted());
    }
    if report.failed > 0 {
        println!("  failed:  {}", report.failed.warning());
    }

    Ok(())
}
