use chrono::{DateTime, Utc};

use crate::db::Repository;
use crate::error::Result;
use crate::models::SourceSchedule;

/// A never-checked source is always due; otherwise the owner's interval must
/// have fully elapsed.
pub fn is_due(last_checked: Option<DateTime<Utc>>, interval_minutes: u32, now: DateTime<Utc>) -> bool {
    match last_checked {
        None => true,
        Some(last) => (now - last).num_seconds() >= i64::from(interval_minutes) * 60,
    }
}

/// Re-evaluated every tick so interval changes take effect immediately.
pub async fn select_due_sources(repo: &Repository, now: DateTime<Utc>) -> Result<Vec<SourceSchedule>> {
    let due = repo.sources_due_for_check(now).await?;
    tracing::info!(due = due.len(), "Selected due sources");
    Ok(due)
}
