use std::sync::{Arc, LazyLock};
use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use super::profiles::ProfileRegistry;
use super::text::{char_len, collapse_whitespace, truncate_chars};
use crate::services::HttpFetch;

pub const MAX_CONTENT_CHARS: usize = 500;
const MIN_PROFILE_CHARS: usize = 30;
const MIN_DESCRIPTION_CHARS: usize = 10;
const FALLBACK_TITLE_CHARS: usize = 200;

static META_DESCRIPTION: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).ok());

/// Pulls a short readable body out of an article page.
pub struct ContentExtractor {
    fetcher: Arc<dyn HttpFetch>,
    registry: ProfileRegistry,
    timeout: Duration,
    delay: Duration,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn HttpFetch>, timeout: Duration, delay: Duration) -> Self {
        Self {
            fetcher,
            registry: ProfileRegistry::default(),
            timeout,
            delay,
        }
    }

    pub fn with_registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Never fails: fetch or parse problems fall back to `fallback_title`.
    /// The result is whitespace-collapsed and at most 500 characters.
    pub async fn extract(&self, article_url: &str, fallback_title: &str) -> String {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let page = match self.fetcher.get(article_url, self.timeout).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(url = article_url, "Failed to fetch article: {}", e);
                return finalize(&truncate_chars(fallback_title, FALLBACK_TITLE_CHARS));
            }
        };

        let host = Url::parse(article_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();

        self.extract_from_html(&page.body, &host, fallback_title)
    }

    /// Synchronous so the non-`Send` parsed document never spans an await.
    pub fn extract_from_html(&self, html: &str, host: &str, fallback_title: &str) -> String {
        let document = Html::parse_document(html);
        let profile = self.registry.for_host(host);

        let mut content = profile.extract(&document);

        if char_len(content.trim()) < MIN_PROFILE_CHARS {
            if let Some(description) = meta_description(&document) {
                content = description;
            }
        }

        if char_len(content.trim()) < MIN_DESCRIPTION_CHARS {
            tracing::debug!(host, profile = profile.name(), "No usable body, using title");
            content = truncate_chars(fallback_title, FALLBACK_TITLE_CHARS);
        }

        finalize(&content)
    }
}

fn meta_description(document: &Html) -> Option<String> {
    let selector = META_DESCRIPTION.as_ref()?;
    document
        .select(selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
}

fn finalize(content: &str) -> String {
    truncate_chars(&collapse_whitespace(content), MAX_CONTENT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::services::FetchedPage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticPages(HashMap<String, String>);

    #[async_trait]
    impl HttpFetch for StaticPages {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
            match self.0.get(url) {
                Some(body) => Ok(FetchedPage {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                }),
                None => Err(AppError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn extractor(pages: &[(&str, &str)]) -> ContentExtractor {
        let pages = pages
            .iter()
            .map(|(u, b)| (u.to_string(), b.to_string()))
            .collect();
        ContentExtractor::new(
            Arc::new(StaticPages(pages)),
            Duration::from_secs(1),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_title() {
        let extractor = extractor(&[]);
        let body = extractor
            .extract("https://example.com/news/1", "  Storm   hits coast ")
            .await;
        assert_eq!(body, "Storm hits coast");
    }

    #[tokio::test]
    async fn profile_text_is_collapsed_and_capped() {
        let long = "word ".repeat(200);
        let html = format!("<html><body><article>{long}</article></body></html>");
        let extractor = extractor(&[("https://example.com/news/2", html.as_str())]);

        let body = extractor.extract("https://example.com/news/2", "title").await;
        assert_eq!(char_len(&body), MAX_CONTENT_CHARS);
        assert!(body.starts_with("word word"));
        assert!(!body.contains("  "));
    }

    #[test]
    fn short_body_uses_meta_description() {
        let extractor = extractor(&[]);
        let html = r#"<html><head><meta name="description" content="A summary of the story."></head>
                      <body><p>short</p></body></html>"#;
        let body = extractor.extract_from_html(html, "example.com", "title");
        assert_eq!(body, "A summary of the story.");
    }

    #[test]
    fn empty_page_without_description_uses_title() {
        let extractor = extractor(&[]);
        let title = "t".repeat(300);
        let body = extractor.extract_from_html("<html></html>", "example.com", &title);
        assert_eq!(char_len(&body), FALLBACK_TITLE_CHARS);
    }

    #[test]
    fn habr_pages_use_the_habr_profile() {
        let extractor = extractor(&[]);
        let text = "Подробный разбор нового релиза компилятора и всех изменений в нём. ".repeat(3);
        let html = format!("<div class='tm-page'><div class='article-formatted-body'>{text}</div></div>");
        let body = extractor.extract_from_html(&html, "habr.com", "title");
        assert!(body.starts_with("Подробный разбор"));
    }

    #[test]
    fn custom_registry_profiles_are_used() {
        use crate::scrape::SelectorProfile;

        let mut registry = ProfileRegistry::new(Box::new(SelectorProfile::generic()));
        registry.register(Box::new(SelectorProfile::new(
            "lenta",
            &["lenta.ru"],
            &[".topic-body__content"],
            20,
            400,
        )));
        let extractor = extractor(&[]).with_registry(registry);

        let html = "<p>navigation text that is long enough to be picked up by generic</p>\
                    <div class='topic-body__content'>Текст новости с подробностями события.</div>";
        let body = extractor.extract_from_html(html, "lenta.ru", "title");
        assert_eq!(body, "Текст новости с подробностями события.");
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_before_each_fetch() {
        let extractor = ContentExtractor::new(
            Arc::new(StaticPages(HashMap::new())),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );

        let started = tokio::time::Instant::now();
        extractor.extract("https://example.com/news/1", "first").await;
        extractor.extract("https://example.com/news/2", "second").await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }
}
