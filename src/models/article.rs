use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// One candidate pulled off a listing page, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl ScrapedItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}
