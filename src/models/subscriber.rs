use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 5;
pub const DEFAULT_MAX_NEWS_COUNT: u32 = 20;

pub const CHECK_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=60;
pub const MAX_NEWS_COUNT_RANGE: std::ops::RangeInclusive<u32> = 5..=50;

/// An end user, keyed by the transport's chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub check_interval_minutes: u32,
    pub max_news_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberSettings {
    pub check_interval_minutes: u32,
    pub max_news_count: u32,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            max_news_count: DEFAULT_MAX_NEWS_COUNT,
        }
    }
}

impl From<&Subscriber> for SubscriberSettings {
    fn from(subscriber: &Subscriber) -> Self {
        Self {
            check_interval_minutes: subscriber.check_interval_minutes,
            max_news_count: subscriber.max_news_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub subscribers: i64,
    pub sources: i64,
    pub articles: i64,
    pub unsent_articles: i64,
}
