//! Comment and commit status text

use crate::deadline::Schedule;
use crate::types::{PrKey, StatusState, StatusUpdate};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Where the bot points people, and what it calls itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    /// Public base URL of the dashboard, without trailing slash
    pub base_url: String,
    /// Name shown in comments
    pub display_name: String,
    /// Commit status context
    pub status_context: String,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            display_name: "mergeclock".to_string(),
            status_context: "mergeclock".to_string(),
        }
    }
}

impl Links {
    /// Dashboard page for a pull request
    pub fn dashboard(&self, key: &PrKey) -> String {
        format!(
            "{}/{}/{}/pull/{}",
            self.base_url.trim_end_matches('/'),
            key.repo.owner(),
            key.repo.name(),
            key.number
        )
    }

    fn image(&self, name: &str) -> String {
        format!(
            "{}/static/images/{name}.png",
            self.base_url.trim_end_matches('/')
        )
    }

    fn home(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Whole days and hours left, e.g. `9 day(s) and 23 hour(s)`
pub fn format_wait(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    format!("{days} day(s) and {hours} hour(s)")
}

/// RFC 3339 timestamp with second precision
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Comment posted when a pull request is first scheduled
pub fn opening_comment(links: &Links, key: &PrKey, remaining: TimeDelta) -> String {
    format!(
        "This pull request will be automatically merged by [{name}]({home}) in {wait}.\n\
         The start date is based on the latest Commit date / Pull Request created date / (force) Push date.\n\
         The time to merge is 5 days plus 5 days for each commit.\n\
         Check the `{context}` status check or the [dashboard]({dashboard}) for actual stats.\n\
         \n\
         To speed up or delay the merge review the pull request:\n\
         1. ![Files changed]({files_changed})\n\
         1. ![Review changes]({review_changes})\n\
         \n\
         - Speed up: ![Approve]({approve})\n\
         - Delay or stop: ![Request changes]({request_changes})\n",
        name = links.display_name,
        home = links.home(),
        wait = format_wait(remaining),
        context = links.status_context,
        dashboard = links.dashboard(key),
        files_changed = links.image("github-files-changed"),
        review_changes = links.image("github-review-changes"),
        approve = links.image("github-approve"),
        request_changes = links.image("github-request-changes"),
    )
}

/// Comment posted when a push resets the timer
pub fn reset_comment(links: &Links, key: &PrKey, remaining: TimeDelta) -> String {
    format!(
        "The branch of this pull request was updated so the auto-merge time has been reset.\n\
         \n\
         It will be automatically merged by [{name}]({home}) in {wait}.\n\
         Check the `{context}` status check or the [dashboard]({dashboard}) for actual stats.\n",
        name = links.display_name,
        home = links.home(),
        wait = format_wait(remaining),
        context = links.status_context,
        dashboard = links.dashboard(key),
    )
}

/// `0.25 Merge at 2026-03-11T12:00:00Z`
pub fn status_description(coefficient: f64, deadline: DateTime<Utc>) -> String {
    format!("{coefficient:.2} Merge at {}", format_timestamp(deadline))
}

/// Pending commit status announcing a schedule
pub fn status_update(links: &Links, key: &PrKey, schedule: &Schedule) -> StatusUpdate {
    StatusUpdate {
        state: StatusState::Pending,
        target_url: links.dashboard(key),
        description: status_description(schedule.coefficient, schedule.deadline),
        context: links.status_context.clone(),
    }
}
