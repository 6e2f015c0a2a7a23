use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::watch;

use crate::db::Repository;
use crate::error::Result;
use crate::models::SourceSchedule;
use crate::scrape::SourceScraper;
use crate::services::Notifier;

use super::delivery::{deliver_unsent, DeliveryReport};
use super::due::select_due_sources;
use super::filter::{filter_by_keywords, has_min_content};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sources_checked: usize,
    pub sources_failed: usize,
    pub items_scraped: usize,
    pub articles_stored: usize,
    pub delivery: DeliveryReport,
}

#[derive(Debug, Default)]
struct SourceOutcome {
    failed: bool,
    scraped: usize,
    stored: usize,
}

impl SourceOutcome {
    fn failed() -> Self {
        Self {
            failed: true,
            ..Default::default()
        }
    }
}

/// Drives discovery and delivery on one global tick.
pub struct Scheduler {
    repo: Repository,
    scraper: Arc<SourceScraper>,
    notifier: Arc<dyn Notifier>,
    tick: Duration,
    max_concurrent: usize,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        repo: Repository,
        scraper: Arc<SourceScraper>,
        notifier: Arc<dyn Notifier>,
        tick: Duration,
        max_concurrent: usize,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            repo,
            scraper,
            notifier,
            tick,
            max_concurrent: max_concurrent.max(1),
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Sweeps, sleeps, repeats. A failed or panicking sweep is logged and the
    /// loop carries on; only process shutdown ends it.
    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick.as_secs(), "Scheduler started");
        loop {
            self.state.send_replace(SchedulerState::Running);
            match AssertUnwindSafe(self.sweep()).catch_unwind().await {
                Ok(Ok(report)) => tracing::info!(
                    checked = report.sources_checked,
                    failed = report.sources_failed,
                    stored = report.articles_stored,
                    sent = report.delivery.sent,
                    "Sweep finished"
                ),
                Ok(Err(e)) => tracing::error!("Sweep failed: {}", e),
                Err(_) => tracing::error!("Sweep panicked"),
            }
            self.state.send_replace(SchedulerState::Idle);
            tokio::time::sleep(self.tick).await;
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// One full pass: scrape every due source concurrently, then deliver.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = select_due_sources(&self.repo, now).await?;

        let outcomes: Vec<SourceOutcome> = stream::iter(due)
            .map(|schedule| self.check_source(schedule, now))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = SweepReport {
            sources_checked: outcomes.len(),
            ..Default::default()
        };
        for outcome in &outcomes {
            report.sources_failed += usize::from(outcome.failed);
            report.items_scraped += outcome.scraped;
            report.articles_stored += outcome.stored;
        }

        report.delivery = deliver_unsent(&self.repo, self.notifier.as_ref()).await?;
        Ok(report)
    }

    async fn check_source(&self, schedule: SourceSchedule, now: DateTime<Utc>) -> SourceOutcome {
        let source = schedule.source;
        let checked = AssertUnwindSafe(self.scrape_and_store(source.id, &source.url))
            .catch_unwind()
            .await;
        let outcome = match checked {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(source_id = source.id, url = %source.url, "Source check failed: {}", e);
                SourceOutcome::failed()
            }
            Err(_) => {
                tracing::error!(source_id = source.id, url = %source.url, "Source check panicked");
                SourceOutcome::failed()
            }
        };

        if let Err(e) = self.repo.touch_last_checked_at(source.id, now).await {
            tracing::error!(source_id = source.id, "Failed to update last_checked: {}", e);
        }

        outcome
    }

    async fn scrape_and_store(&self, source_id: i64, url: &str) -> Result<SourceOutcome> {
        let items = self.scraper.scrape(url).await?;
        let scraped = items.len();

        let keywords: Vec<String> = self
            .repo
            .keywords_for_source(source_id)
            .await?
            .into_iter()
            .map(|k| k.text)
            .collect();

        let kept: Vec<_> = filter_by_keywords(items, &keywords)
            .into_iter()
            .filter(has_min_content)
            .collect();
        let stored = self.repo.insert_all_if_new(source_id, &kept).await?;

        tracing::debug!(source_id, scraped, kept = kept.len(), stored, "Checked source");
        Ok(SourceOutcome {
            failed: false,
            scraped,
            stored,
        })
    }
}
