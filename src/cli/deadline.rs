//! Deadline command - read-only schedule preview

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, arrow};
use anstream::println;
use chrono::Utc;
use mergeclock::error::Result;
use mergeclock::reconcile::{format_timestamp, format_wait};
use mergeclock::types::{PrKey, RepoId, Verdict};
use std::path::Path;

/// Run the deadline command
pub async fn run_deadline(config_path: Option<&Path>, repo: RepoId, number: u64) -> Result<()> {
    let ctx = CommandContext::new(config_path).await?;
    let key = PrKey::new(repo, number);

    let schedule = ctx.reconciler.preview(&key).await?;
    let remaining = schedule.deadline - Utc::now();

    println!("{}", key.to_string().emphasis());
    println!(
        "  start:       {}",
        format_timestamp(schedule.start_date).accent()
    );
    println!(
        "  commits:     {} {} {} day(s)",
        schedule.commit_count,
        arrow(),
        schedule.base_duration.num_days()
    );
    println!("  coefficient: {:.2}", schedule.coefficient);
    println!(
        "  deadline:    {} ({})",
        format_timestamp(schedule.deadline).accent(),
        format_wait(remaining)
    );

    if schedule.votes.is_empty() {
        println!("  {}", "no approving or rejecting reviews".muted());
    }
    for vote in &schedule.votes {
        let verdict = match vote.verdict {
            Verdict::Approve => "approve".accent(),
            Verdict::RequestChanges => "request changes".warning(),
            Verdict::Comment => "comment".muted(),
        };
        println!(
            "  {} {} {verdict} (share {:.3})",
            arrow(),
            vote.reviewer,
            vote.share
        );
    }

    if !ctx.config.repositories.contains(&key.repo) {
        println!(
            "{}",
            "Repository is not configured; the bot will not act on it".warning()
        );
    }

    Ok(())
}
