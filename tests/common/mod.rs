#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use news_aggregator::db::Repository;
use news_aggregator::error::{AppError, Result};
use news_aggregator::scrape::{ContentExtractor, SourceScraper};
use news_aggregator::services::{FetchedPage, HttpFetch, Notifier};

/// Serves canned pages; anything else is a 404.
#[derive(Default)]
pub struct StubFetcher {
    pages: Mutex<HashMap<String, String>>,
}

impl StubFetcher {
    pub fn page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }
}

#[async_trait]
impl HttpFetch for StubFetcher {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
        let body = self.pages.lock().unwrap().get(url).cloned();
        match body {
            Some(body) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body,
            }),
            None => Err(AppError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Records every message. Messages containing `fail_marker`, or addressed to
/// `fail_subscriber`, are rejected.
#[derive(Default)]
pub struct StubNotifier {
    pub sent: Mutex<Vec<(i64, String)>>,
    fail_marker: Option<String>,
    fail_subscriber: Option<i64>,
}

impl StubNotifier {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_for(subscriber_id: i64) -> Self {
        Self {
            fail_subscriber: Some(subscriber_id),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn send(&self, subscriber_id: i64, text: &str) -> Result<()> {
        if self.fail_subscriber == Some(subscriber_id) {
            return Err(AppError::Transport("bot was blocked by the user".to_string()));
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(AppError::Transport("chat unavailable".to_string()));
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscriber_id, text.to_string()));
        Ok(())
    }
}

pub async fn repository() -> (Repository, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("news.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (repo, dir)
}

pub fn scraper(fetcher: Arc<dyn HttpFetch>) -> Arc<SourceScraper> {
    let extractor = ContentExtractor::new(fetcher.clone(), Duration::from_secs(1), Duration::ZERO);
    Arc::new(SourceScraper::new(fetcher, extractor, Duration::from_secs(1)))
}

pub fn article_page(text: &str) -> String {
    format!("<html><body><article><p>{text}</p></article></body></html>")
}
