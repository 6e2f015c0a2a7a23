use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub subscriber_id: i64,
    pub url: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A source joined with its owner's check interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchedule {
    pub source: Source,
    pub check_interval_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub source_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
