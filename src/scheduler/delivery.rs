use std::ops::AddAssign;

use crate::db::Repository;
use crate::error::Result;
use crate::models::Article;
use crate::services::Notifier;

use super::render::{render_article, SCHEDULED_BODY_LIMIT};

/// Unsent articles delivered per source per sweep.
pub const MAX_PER_SOURCE: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Scheduled fan-out: every source's newest unsent articles go to the
/// source's owner. A failing source or article never stops the batch.
pub async fn deliver_unsent(repo: &Repository, notifier: &dyn Notifier) -> Result<DeliveryReport> {
    let sources = repo.all_sources().await?;
    let mut report = DeliveryReport::default();

    for source in sources {
        let articles = match repo.unsent_for_source(source.id, MAX_PER_SOURCE).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!(source_id = source.id, "Failed to load unsent articles: {}", e);
                continue;
            }
        };
        if articles.is_empty() {
            continue;
        }

        report += deliver_articles(
            repo,
            notifier,
            source.subscriber_id,
            &articles,
            Some(SCHEDULED_BODY_LIMIT),
        )
        .await;
    }

    if report.sent > 0 || report.failed > 0 {
        tracing::info!(sent = report.sent, failed = report.failed, "Delivery finished");
    }
    Ok(report)
}

/// Sends each article in order and marks it sent right after a successful
/// send. Failed articles stay unsent for the next attempt.
pub async fn deliver_articles(
    repo: &Repository,
    notifier: &dyn Notifier,
    subscriber_id: i64,
    articles: &[Article],
    body_limit: Option<usize>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for article in articles {
        let text = render_article(article, body_limit);
        if let Err(e) = notifier.send(subscriber_id, &text).await {
            tracing::warn!(
                subscriber_id,
                article_id = article.id,
                "Failed to deliver article: {}",
                e
            );
            report.failed += 1;
            continue;
        }

        match repo.mark_sent(article.id).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                // Delivered but still unsent in the store; it will be sent again.
                tracing::error!(article_id = article.id, "Failed to mark article sent: {}", e);
                report.sent += 1;
            }
        }
    }

    report
}
