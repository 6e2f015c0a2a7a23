use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Article, Keyword, ScrapedItem, Source, SourceSchedule, StoreStats, Subscriber,
    SubscriberSettings,
};
use crate::scheduler::due::is_due;

use super::schema::SCHEMA;

/// Full nanosecond precision, so a stored check time is never earlier than
/// the real one.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";
/// SQLite `datetime('now')` defaults carry whole seconds only.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SOURCE_COLUMNS: &str = "s.id, s.subscriber_id, s.url, s.last_checked, s.created_at";
const ARTICLE_COLUMNS: &str =
    "a.id, a.source_id, a.title, a.url, a.content, a.published_at, a.is_sent, a.sent_at";

/// The persistent store for subscribers, sources, keywords and articles.
///
/// Every method is a single statement or a single transaction on one
/// connection, so each mutation is atomic. Global article-url uniqueness is
/// enforced by the `UNIQUE` constraint on `articles.url`.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Subscriber operations

    /// Registers a subscriber with default settings; existing rows keep
    /// their configured values.
    pub async fn ensure_subscriber(&self, subscriber_id: i64) -> Result<()> {
        let defaults = SubscriberSettings::default();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO subscribers (id, check_interval_minutes, max_news_count)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(id) DO NOTHING"#,
                    params![
                        subscriber_id,
                        defaults.check_interval_minutes,
                        defaults.max_news_count
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_subscriber(&self, subscriber_id: i64) -> Result<Option<Subscriber>> {
        let subscriber = self
            .conn
            .call(move |conn| {
                let subscriber = conn
                    .query_row(
                        "SELECT id, check_interval_minutes, max_news_count, created_at FROM subscribers WHERE id = ?1",
                        params![subscriber_id],
                        subscriber_from_row,
                    )
                    .optional()?;
                Ok(subscriber)
            })
            .await?;
        Ok(subscriber)
    }

    pub async fn all_subscriber_ids(&self) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM subscribers ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Settings for a subscriber, or the defaults when the id is unknown.
    pub async fn subscriber_settings(&self, subscriber_id: i64) -> Result<SubscriberSettings> {
        Ok(self
            .get_subscriber(subscriber_id)
            .await?
            .map(|s| SubscriberSettings::from(&s))
            .unwrap_or_default())
    }

    pub async fn update_check_interval(&self, subscriber_id: i64, minutes: u32) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscribers SET check_interval_minutes = ?1 WHERE id = ?2",
                    params![minutes, subscriber_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_max_news_count(&self, subscriber_id: i64, count: u32) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscribers SET max_news_count = ?1 WHERE id = ?2",
                    params![count, subscriber_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes every source of the subscriber; keywords and articles go with
    /// them through the cascade. The subscriber row itself stays.
    pub async fn purge_subscriber_data(&self, subscriber_id: i64) -> Result<usize> {
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM articles WHERE source_id IN (SELECT id FROM sources WHERE subscriber_id = ?1)",
                    params![subscriber_id],
                )?;
                tx.execute(
                    "DELETE FROM keywords WHERE source_id IN (SELECT id FROM sources WHERE subscriber_id = ?1)",
                    params![subscriber_id],
                )?;
                let removed = tx.execute(
                    "DELETE FROM sources WHERE subscriber_id = ?1",
                    params![subscriber_id],
                )?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    // Source operations

    /// New sources start with `last_checked = NULL`, so the next sweep
    /// picks them up.
    pub async fn add_source(&self, subscriber_id: i64, url: &str) -> Result<i64> {
        let url = url.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sources (subscriber_id, url) VALUES (?1, ?2)",
                    params![subscriber_id, url],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>> {
        let source = self
            .conn
            .call(move |conn| {
                let source = conn
                    .query_row(
                        &format!("SELECT {SOURCE_COLUMNS} FROM sources s WHERE s.id = ?1"),
                        params![source_id],
                        source_from_row,
                    )
                    .optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    pub async fn sources_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SOURCE_COLUMNS} FROM sources s WHERE s.subscriber_id = ?1 ORDER BY s.id"
                ))?;
                let sources = stmt
                    .query_map(params![subscriber_id], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn all_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SOURCE_COLUMNS} FROM sources s ORDER BY s.id"))?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    /// Deletes a source only when it belongs to `subscriber_id`.
    pub async fn delete_source(&self, subscriber_id: i64, source_id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM sources WHERE id = ?1 AND subscriber_id = ?2",
                    params![source_id, subscriber_id],
                )?;
                Ok(removed > 0)
            })
            .await?;
        Ok(removed)
    }

    pub async fn source_schedules(&self) -> Result<Vec<SourceSchedule>> {
        let schedules = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {SOURCE_COLUMNS}, u.check_interval_minutes
                       FROM sources s
                       JOIN subscribers u ON s.subscriber_id = u.id
                       ORDER BY s.id"#
                ))?;
                let schedules = stmt
                    .query_map([], |row| {
                        Ok(SourceSchedule {
                            source: source_from_row(row)?,
                            check_interval_minutes: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(schedules)
            })
            .await?;
        Ok(schedules)
    }

    /// Sources whose owner's interval has elapsed since the last check, plus
    /// every source that was never checked.
    pub async fn sources_due_for_check(&self, now: DateTime<Utc>) -> Result<Vec<SourceSchedule>> {
        let schedules = self.source_schedules().await?;
        Ok(schedules
            .into_iter()
            .filter(|s| {
                let due = is_due(s.source.last_checked, s.check_interval_minutes, now);
                tracing::debug!(
                    source_id = s.source.id,
                    elapsed_secs = ?s.source.last_checked.map(|t| (now - t).num_seconds()),
                    required_secs = u64::from(s.check_interval_minutes) * 60,
                    due,
                    "Evaluated source schedule"
                );
                due
            })
            .collect())
    }

    pub async fn touch_last_checked(&self, source_id: i64) -> Result<()> {
        self.touch_last_checked_at(source_id, Utc::now()).await
    }

    /// Never moves `last_checked` backwards.
    pub async fn touch_last_checked_at(&self, source_id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = format_timestamp(at);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE sources SET last_checked = ?2
                       WHERE id = ?1 AND (last_checked IS NULL OR last_checked <= ?2)"#,
                    params![source_id, at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Keyword operations

    pub async fn add_keyword(&self, source_id: i64, text: &str) -> Result<i64> {
        let text = text.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO keywords (source_id, text) VALUES (?1, ?2)",
                    params![source_id, text],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn keywords_for_source(&self, source_id: i64) -> Result<Vec<Keyword>> {
        let keywords = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source_id, text, created_at FROM keywords WHERE source_id = ?1 ORDER BY id",
                )?;
                let keywords = stmt
                    .query_map(params![source_id], keyword_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keywords)
            })
            .await?;
        Ok(keywords)
    }

    /// Every keyword of the subscriber, paired with its source url.
    pub async fn keywords_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<(Keyword, String)>> {
        let keywords = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT k.id, k.source_id, k.text, k.created_at, s.url
                       FROM keywords k
                       JOIN sources s ON k.source_id = s.id
                       WHERE s.subscriber_id = ?1
                       ORDER BY k.id"#,
                )?;
                let keywords = stmt
                    .query_map(params![subscriber_id], |row| {
                        Ok((keyword_from_row(row)?, row.get::<_, String>(4)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keywords)
            })
            .await?;
        Ok(keywords)
    }

    pub async fn delete_keyword(&self, source_id: i64, keyword_id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM keywords WHERE id = ?1 AND source_id = ?2",
                    params![keyword_id, source_id],
                )?;
                Ok(removed > 0)
            })
            .await?;
        Ok(removed)
    }

    // Article operations

    /// Inserts the article unless its url is already stored anywhere.
    /// Returns `true` only when a new row was created.
    pub async fn insert_if_new(
        &self,
        source_id: i64,
        title: &str,
        url: &str,
        content: &str,
    ) -> Result<bool> {
        let title = title.to_string();
        let url = url.to_string();
        let content = content.to_string();
        let published_at = format_timestamp(Utc::now());

        let inserted = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    r#"INSERT INTO articles (source_id, title, url, content, published_at, is_sent)
                       VALUES (?1, ?2, ?3, ?4, ?5, 0)"#,
                    params![source_id, title, url, content, published_at],
                );
                match result {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                    {
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        if inserted {
            tracing::debug!(source_id, "Stored new article");
        } else {
            tracing::debug!(source_id, "Article already known");
        }
        Ok(inserted)
    }

    /// Stores each item through [`Repository::insert_if_new`] and returns
    /// how many rows were created.
    pub async fn insert_all_if_new(&self, source_id: i64, items: &[ScrapedItem]) -> Result<usize> {
        let mut stored = 0;
        for item in items {
            if self
                .insert_if_new(source_id, &item.title, &item.url, &item.content)
                .await?
            {
                stored += 1;
            }
        }
        Ok(stored)
    }

    pub async fn get_article(&self, article_id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = ?1"),
                        params![article_id],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let url = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.url = ?1"),
                        params![url],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Unsent articles across all of a subscriber's sources, newest first.
    pub async fn unsent_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {ARTICLE_COLUMNS}
                       FROM articles a
                       JOIN sources s ON a.source_id = s.id
                       WHERE s.subscriber_id = ?1 AND a.is_sent = 0
                       ORDER BY a.id DESC"#
                ))?;
                let articles = stmt
                    .query_map(params![subscriber_id], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Up to `limit` unsent articles of one source, newest first.
    pub async fn unsent_for_source(&self, source_id: i64, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {ARTICLE_COLUMNS}
                       FROM articles a
                       WHERE a.source_id = ?1 AND a.is_sent = 0
                       ORDER BY a.id DESC
                       LIMIT ?2"#
                ))?;
                let articles = stmt
                    .query_map(params![source_id, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn mark_sent(&self, article_id: i64) -> Result<bool> {
        self.mark_sent_at(article_id, Utc::now()).await
    }

    /// Flips an article from unsent to sent. Already-sent rows are left
    /// untouched, including `sent_at`; the return value says whether this
    /// call made the transition.
    pub async fn mark_sent_at(&self, article_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let at = format_timestamp(at);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET is_sent = 1, sent_at = ?2 WHERE id = ?1 AND is_sent = 0",
                    params![article_id, at],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(changed)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let stats = self
            .conn
            .call(|conn| {
                let stats = conn.query_row(
                    r#"SELECT
                           (SELECT COUNT(*) FROM subscribers),
                           (SELECT COUNT(*) FROM sources),
                           (SELECT COUNT(*) FROM articles),
                           (SELECT COUNT(*) FROM articles WHERE is_sent = 0)"#,
                    [],
                    |row| {
                        Ok(StoreStats {
                            subscribers: row.get(0)?,
                            sources: row.get(1)?,
                            articles: row.get(2)?,
                            unsent_articles: row.get(3)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    [TIMESTAMP_FORMAT, SQLITE_TIMESTAMP_FORMAT]
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

fn required_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row
        .get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now))
}

fn optional_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn subscriber_from_row(row: &Row) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        check_interval_minutes: row.get(1)?,
        max_news_count: row.get(2)?,
        created_at: required_datetime(row, 3)?,
    })
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        subscriber_id: row.get(1)?,
        url: row.get(2)?,
        last_checked: optional_datetime(row, 3)?,
        created_at: required_datetime(row, 4)?,
    })
}

fn keyword_from_row(row: &Row) -> rusqlite::Result<Keyword> {
    Ok(Keyword {
        id: row.get(0)?,
        source_id: row.get(1)?,
        text: row.get(2)?,
        created_at: required_datetime(row, 3)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        content: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        published_at: required_datetime(row, 5)?,
        is_sent: row.get::<_, i64>(6)? != 0,
        sent_at: optional_datetime(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    async fn repo_with_source() -> (Repository, TempDir, i64) {
        let (repo, dir) = repo().await;
        repo.ensure_subscriber(42).await.unwrap();
        let source_id = repo.add_source(42, "https://example.com/news").await.unwrap();
        (repo, dir, source_id)
    }

    #[tokio::test]
    async fn insert_if_new_is_idempotent() {
        let (repo, _dir, source_id) = repo_with_source().await;

        let url = "https://example.com/news/1";
        assert!(repo.insert_if_new(source_id, "First", url, "body").await.unwrap());
        assert!(!repo
            .insert_if_new(source_id, "Other title", url, "other body")
            .await
            .unwrap());

        let stored = repo.get_article_by_url(url).await.unwrap().unwrap();
        assert_eq!(stored.title, "First");
        assert_eq!(repo.stats().await.unwrap().articles, 1);
    }

    #[tokio::test]
    async fn url_uniqueness_spans_sources() {
        let (repo, _dir, first) = repo_with_source().await;
        repo.ensure_subscriber(7).await.unwrap();
        let second = repo.add_source(7, "https://other.org/").await.unwrap();

        let url = "https://example.com/news/shared";
        assert!(repo.insert_if_new(first, "A", url, "").await.unwrap());
        assert!(!repo.insert_if_new(second, "B", url, "").await.unwrap());

        let stored = repo.get_article_by_url(url).await.unwrap().unwrap();
        assert_eq!(stored.source_id, first);
        assert_eq!(repo.stats().await.unwrap().articles, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_url_create_one_row() {
        let (repo, _dir, source_id) = repo_with_source().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.insert_if_new(source_id, &format!("t{i}"), "https://example.com/x/1", "")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(repo.stats().await.unwrap().articles, 1);
    }

    #[tokio::test]
    async fn foreign_key_failure_is_not_treated_as_duplicate() {
        let (repo, _dir) = repo().await;
        let result = repo.insert_if_new(999, "t", "https://example.com/a", "").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mark_sent_transitions_once() {
        let (repo, _dir, source_id) = repo_with_source().await;
        repo.insert_if_new(source_id, "t", "https://example.com/a/1", "c")
            .await
            .unwrap();
        let article = repo
            .get_article_by_url("https://example.com/a/1")
            .await
            .unwrap()
            .unwrap();
        assert!(!article.is_sent);
        assert!(article.sent_at.is_none());

        let first = Utc::now() - Duration::hours(1);
        assert!(repo.mark_sent_at(article.id, first).await.unwrap());
        let sent_at = repo.get_article(article.id).await.unwrap().unwrap().sent_at;

        assert!(!repo.mark_sent_at(article.id, Utc::now()).await.unwrap());
        let again = repo.get_article(article.id).await.unwrap().unwrap();
        assert!(again.is_sent);
        assert_eq!(again.sent_at, sent_at);
    }

    #[tokio::test]
    async fn unsent_queries_are_newest_first() {
        let (repo, _dir, source_id) = repo_with_source().await;
        for i in 1..=3 {
            repo.insert_if_new(source_id, &format!("t{i}"), &format!("https://example.com/n/{i}"), "")
                .await
                .unwrap();
        }
        let first = repo
            .get_article_by_url("https://example.com/n/1")
            .await
            .unwrap()
            .unwrap();
        repo.mark_sent(first.id).await.unwrap();

        let unsent = repo.unsent_for_subscriber(42).await.unwrap();
        let titles: Vec<_> = unsent.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["t3", "t2"]);

        let limited = repo.unsent_for_source(source_id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title, "t3");
    }

    #[tokio::test]
    async fn touch_last_checked_never_goes_backwards() {
        let (repo, _dir, source_id) = repo_with_source().await;
        assert!(repo.get_source(source_id).await.unwrap().unwrap().last_checked.is_none());

        let later = Utc::now();
        let earlier = later - Duration::minutes(10);
        repo.touch_last_checked_at(source_id, later).await.unwrap();
        repo.touch_last_checked_at(source_id, earlier).await.unwrap();

        let checked = repo.get_source(source_id).await.unwrap().unwrap().last_checked.unwrap();
        assert_eq!(checked.timestamp(), later.timestamp());
    }

    #[tokio::test]
    async fn sub_second_check_times_are_kept() {
        let (repo, _dir, source_id) = repo_with_source().await;

        let base = chrono::DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let checked_at = base + Duration::milliseconds(700);
        repo.touch_last_checked_at(source_id, checked_at).await.unwrap();

        let stored = repo.get_source(source_id).await.unwrap().unwrap().last_checked;
        assert_eq!(stored, Some(checked_at));

        // 299.5s after the check is still inside a 5 minute interval.
        let almost = checked_at + Duration::milliseconds(299_500);
        assert!(repo.sources_due_for_check(almost).await.unwrap().is_empty());
        let due = repo
            .sources_due_for_check(checked_at + Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn due_sources_follow_each_owners_interval() {
        let (repo, _dir, never_checked) = repo_with_source().await;
        repo.ensure_subscriber(7).await.unwrap();
        repo.update_check_interval(7, 30).await.unwrap();
        let slow = repo.add_source(7, "https://slow.example/").await.unwrap();
        let fast = repo.add_source(42, "https://fast.example/").await.unwrap();

        let now = Utc::now();
        repo.touch_last_checked_at(slow, now - Duration::minutes(10)).await.unwrap();
        repo.touch_last_checked_at(fast, now - Duration::minutes(10)).await.unwrap();

        let due: Vec<i64> = repo
            .sources_due_for_check(now)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source.id)
            .collect();
        assert_eq!(due, vec![never_checked, fast]);
    }

    #[tokio::test]
    async fn subscriber_defaults_and_updates() {
        let (repo, _dir) = repo().await;
        assert_eq!(
            repo.subscriber_settings(1).await.unwrap(),
            SubscriberSettings::default()
        );

        repo.ensure_subscriber(1).await.unwrap();
        repo.update_check_interval(1, 15).await.unwrap();
        repo.update_max_news_count(1, 40).await.unwrap();
        repo.ensure_subscriber(1).await.unwrap();

        let settings = repo.subscriber_settings(1).await.unwrap();
        assert_eq!(settings.check_interval_minutes, 15);
        assert_eq!(settings.max_news_count, 40);
        assert_eq!(repo.all_subscriber_ids().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn delete_source_is_scoped_to_owner_and_cascades() {
        let (repo, _dir, source_id) = repo_with_source().await;
        repo.add_keyword(source_id, "election").await.unwrap();
        repo.insert_if_new(source_id, "t", "https://example.com/a/9", "")
            .await
            .unwrap();

        assert!(!repo.delete_source(7, source_id).await.unwrap());
        assert!(repo.delete_source(42, source_id).await.unwrap());

        assert!(repo.keywords_for_source(source_id).await.unwrap().is_empty());
        assert!(repo
            .get_article_by_url("https://example.com/a/9")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn purge_keeps_the_subscriber_row() {
        let (repo, _dir, source_id) = repo_with_source().await;
        repo.add_source(42, "https://example.com/second").await.unwrap();
        repo.add_keyword(source_id, "vote").await.unwrap();
        repo.insert_if_new(source_id, "t", "https://example.com/a/2", "")
            .await
            .unwrap();

        assert_eq!(repo.purge_subscriber_data(42).await.unwrap(), 2);

        assert!(repo.get_subscriber(42).await.unwrap().is_some());
        assert!(repo.sources_for_subscriber(42).await.unwrap().is_empty());
        assert!(repo.keywords_for_subscriber(42).await.unwrap().is_empty());
        assert_eq!(repo.stats().await.unwrap().articles, 0);
    }

    #[tokio::test]
    async fn keyword_management() {
        let (repo, _dir, source_id) = repo_with_source().await;
        let id = repo.add_keyword(source_id, "Election").await.unwrap();
        repo.add_keyword(source_id, "budget").await.unwrap();

        let listed = repo.keywords_for_subscriber(42).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1, "https://example.com/news");

        assert!(!repo.delete_keyword(source_id + 1, id).await.unwrap());
        assert!(repo.delete_keyword(source_id, id).await.unwrap());

        let remaining: Vec<_> = repo
            .keywords_for_source(source_id)
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.text)
            .collect();
        assert_eq!(remaining, vec!["budget"]);
    }

    #[tokio::test]
    async fn touched_source_is_no_longer_due() {
        let (repo, _dir, source_id) = repo_with_source().await;
        assert_eq!(repo.sources_due_for_check(Utc::now()).await.unwrap().len(), 1);

        repo.touch_last_checked(source_id).await.unwrap();
        let source = repo.get_source(source_id).await.unwrap().unwrap();
        assert!(source.last_checked.is_some());
        assert!(repo.sources_due_for_check(Utc::now()).await.unwrap().is_empty());
    }
}
