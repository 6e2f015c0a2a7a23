use std::sync::Arc;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::subscriber::{CHECK_INTERVAL_RANGE, MAX_NEWS_COUNT_RANGE};
use crate::models::{Keyword, ScrapedItem, Source, StoreStats, SubscriberSettings};
use crate::scheduler::{deliver_articles, DeliveryReport};
use crate::scrape::SourceScraper;
use crate::services::Notifier;
use crate::session::Session;

/// Inbound requests from the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    AddSource { url: String },
    RemoveSource { source_id: i64 },
    AddKeyword { source_id: i64, keyword: String },
    RemoveKeyword { source_id: i64, keyword_id: i64 },
    SetCheckInterval(u32),
    SetMaxNewsCount(u32),
    ListSources,
    ListKeywords,
    ShowSettings,
    FetchNow,
    PurgeAll,
}

/// What a command did, with the counts a front-end needs to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Registered(SubscriberSettings),
    SourceAdded { source_id: i64 },
    SourceRemoved(bool),
    KeywordAdded { keyword_id: i64 },
    KeywordRemoved(bool),
    Settings(SubscriberSettings),
    Sources(Vec<Source>),
    Keywords(Vec<(Keyword, String)>),
    Fetched(FetchReport),
    Purged { sources_removed: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Zero means the subscriber has no sources configured.
    pub sources: usize,
    pub stored: usize,
    pub delivery: DeliveryReport,
}

pub struct App {
    repository: Repository,
    scraper: Arc<SourceScraper>,
    notifier: Arc<dyn Notifier>,
    max_concurrent: usize,
}

impl App {
    pub fn new(
        repository: Repository,
        scraper: Arc<SourceScraper>,
        notifier: Arc<dyn Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            repository,
            scraper,
            notifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn handle_command(&self, subscriber_id: i64, command: Command) -> Result<CommandOutcome> {
        self.repository.ensure_subscriber(subscriber_id).await?;

        let outcome = match command {
            Command::Start => {
                tracing::info!(subscriber_id, "Subscriber started a session");
                CommandOutcome::Registered(self.repository.subscriber_settings(subscriber_id).await?)
            }

            Command::ShowSettings => {
                CommandOutcome::Settings(self.repository.subscriber_settings(subscriber_id).await?)
            }

            Command::AddSource { url } => {
                let url = validate_source_url(&url)?;
                let source_id = self.repository.add_source(subscriber_id, &url).await?;
                tracing::info!(subscriber_id, source_id, %url, "Source added");
                CommandOutcome::SourceAdded { source_id }
            }

            Command::RemoveSource { source_id } => {
                let removed = self.repository.delete_source(subscriber_id, source_id).await?;
                CommandOutcome::SourceRemoved(removed)
            }

            Command::AddKeyword { source_id, keyword } => {
                self.owned_source(subscriber_id, source_id).await?;
                let keyword = keyword.trim();
                if keyword.is_empty() {
                    return Err(AppError::invalid_input("keyword", "must not be empty"));
                }
                let keyword_id = self.repository.add_keyword(source_id, keyword).await?;
                CommandOutcome::KeywordAdded { keyword_id }
            }

            Command::RemoveKeyword {
                source_id,
                keyword_id,
            } => {
                self.owned_source(subscriber_id, source_id).await?;
                let removed = self.repository.delete_keyword(source_id, keyword_id).await?;
                CommandOutcome::KeywordRemoved(removed)
            }

            Command::SetCheckInterval(minutes) => {
                if !CHECK_INTERVAL_RANGE.contains(&minutes) {
                    return Err(AppError::invalid_input(
                        "check_interval_minutes",
                        &format!(
                            "must be between {} and {}",
                            CHECK_INTERVAL_RANGE.start(),
                            CHECK_INTERVAL_RANGE.end()
                        ),
                    ));
                }
                self.repository
                    .update_check_interval(subscriber_id, minutes)
                    .await?;
                CommandOutcome::Settings(self.repository.subscriber_settings(subscriber_id).await?)
            }

            Command::SetMaxNewsCount(count) => {
                if !MAX_NEWS_COUNT_RANGE.contains(&count) {
                    return Err(AppError::invalid_input(
                        "max_news_count",
                        &format!(
                            "must be between {} and {}",
                            MAX_NEWS_COUNT_RANGE.start(),
                            MAX_NEWS_COUNT_RANGE.end()
                        ),
                    ));
                }
                self.repository
                    .update_max_news_count(subscriber_id, count)
                    .await?;
                CommandOutcome::Settings(self.repository.subscriber_settings(subscriber_id).await?)
            }

            Command::ListSources => {
                CommandOutcome::Sources(self.repository.sources_for_subscriber(subscriber_id).await?)
            }

            Command::ListKeywords => {
                CommandOutcome::Keywords(self.repository.keywords_for_subscriber(subscriber_id).await?)
            }

            Command::FetchNow => CommandOutcome::Fetched(self.fetch_now(subscriber_id).await?),

            Command::PurgeAll => {
                let sources_removed = self.repository.purge_subscriber_data(subscriber_id).await?;
                tracing::info!(subscriber_id, sources_removed, "Subscriber data purged");
                CommandOutcome::Purged { sources_removed }
            }
        };

        Ok(outcome)
    }

    /// Resolves a free-text reply against the session. Rejected values keep
    /// the session waiting for another try.
    pub async fn handle_text(
        &self,
        session: &mut Session,
        subscriber_id: i64,
        text: &str,
    ) -> Result<Option<CommandOutcome>> {
        let pending = session.pending();
        let Some(command) = session.resolve(text)? else {
            return Ok(None);
        };

        match self.handle_command(subscriber_id, command).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e @ AppError::InvalidInput { .. }) => {
                if let Some(pending) = pending {
                    session.wait_for(pending);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Scrapes every source of the subscriber, then sends up to
    /// `max_news_count` of their unsent articles with full bodies.
    pub async fn fetch_now(&self, subscriber_id: i64) -> Result<FetchReport> {
        let sources = self.repository.sources_for_subscriber(subscriber_id).await?;
        if sources.is_empty() {
            return Ok(FetchReport::default());
        }

        let stored: usize = stream::iter(&sources)
            .map(|source| async move {
                let result = match self.scraper.scrape(&source.url).await {
                    Ok(items) => self.repository.insert_all_if_new(source.id, &items).await,
                    Err(e) => Err(e),
                };
                result.unwrap_or_else(|e| {
                    tracing::warn!(source_id = source.id, url = %source.url, "Fetch failed: {}", e);
                    0
                })
            })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .sum();

        let settings = self.repository.subscriber_settings(subscriber_id).await?;
        let mut unsent = self.repository.unsent_for_subscriber(subscriber_id).await?;
        unsent.truncate(settings.max_news_count as usize);

        let delivery =
            deliver_articles(&self.repository, self.notifier.as_ref(), subscriber_id, &unsent, None)
                .await;

        tracing::info!(
            subscriber_id,
            sources = sources.len(),
            stored,
            sent = delivery.sent,
            failed = delivery.failed,
            "Manual fetch finished"
        );

        Ok(FetchReport {
            sources: sources.len(),
            stored,
            delivery,
        })
    }

    /// Operator check of a listing page; nothing is stored.
    pub async fn test_parse(&self, url: &str) -> Result<Vec<ScrapedItem>> {
        let url = validate_source_url(url)?;
        self.scraper.scrape(&url).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.repository.stats().await
    }

    /// Operator announcement to every registered subscriber. One failed
    /// recipient does not stop the rest.
    pub async fn broadcast(&self, text: &str) -> Result<DeliveryReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::invalid_input("text", "must not be empty"));
        }

        let mut report = DeliveryReport::default();
        for subscriber_id in self.repository.all_subscriber_ids().await? {
            match self.notifier.send(subscriber_id, text).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(subscriber_id, "Broadcast delivery failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(sent = report.sent, failed = report.failed, "Broadcast finished");
        Ok(report)
    }

    async fn owned_source(&self, subscriber_id: i64, source_id: i64) -> Result<Source> {
        match self.repository.get_source(source_id).await? {
            Some(source) if source.subscriber_id == subscriber_id => Ok(source),
            _ => Err(AppError::NotFound(format!("Source {}", source_id))),
        }
    }
}

fn validate_source_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    let lower = url.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(AppError::invalid_input(
            "url",
            "must start with http:// or https://",
        ));
    }
    Url::parse(url).map_err(|e| AppError::invalid_input("url", &e.to_string()))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_urls_need_an_http_scheme() {
        assert!(validate_source_url("example.com").is_err());
        assert!(validate_source_url("ftp://example.com").is_err());
        assert!(validate_source_url("https://").is_err());
        assert_eq!(
            validate_source_url("  https://habr.com/ru/news/ ").unwrap(),
            "https://habr.com/ru/news/"
        );
    }
}
