use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use scraper::{Html, Selector};

use super::classifier;
use super::extractor::ContentExtractor;
use super::profiles::element_text;
use super::text::{char_len, collapse_whitespace, truncate_chars};
use crate::error::Result;
use crate::models::ScrapedItem;
use crate::services::HttpFetch;

pub const MAX_ITEMS_PER_PAGE: usize = 15;
const MAX_ANCHORS_SCANNED: usize = 100;
const MIN_ANCHOR_TEXT_CHARS: usize = 5;
const MIN_CONTENT_CHARS: usize = 10;
const ANCHOR_CONTENT_CHARS: usize = 200;

static ANCHOR: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a[href]").ok());

/// A classified link waiting for its body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    url: String,
    title: String,
}

/// Turns one listing page into up to [`MAX_ITEMS_PER_PAGE`] candidate
/// articles. Nothing is persisted here.
pub struct SourceScraper {
    fetcher: Arc<dyn HttpFetch>,
    extractor: ContentExtractor,
    listing_timeout: Duration,
}

impl SourceScraper {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        extractor: ContentExtractor,
        listing_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            listing_timeout,
        }
    }

    /// Fails only when the listing page itself cannot be fetched.
    pub async fn scrape(&self, listing_url: &str) -> Result<Vec<ScrapedItem>> {
        let page = self.fetcher.get(listing_url, self.listing_timeout).await?;
        // Links resolve against where the listing actually ended up.
        let candidates = collect_candidates(&page.body, &page.url);

        tracing::debug!(
            url = listing_url,
            candidates = candidates.len(),
            "Classified listing links"
        );

        let mut items = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut content = self.extractor.extract(&candidate.url, &candidate.title).await;
            if char_len(&content) < MIN_CONTENT_CHARS {
                content = truncate_chars(&candidate.title, ANCHOR_CONTENT_CHARS);
            }
            items.push(ScrapedItem::new(candidate.title, candidate.url, content));
        }

        Ok(items)
    }
}

/// Anchors in document order, first occurrence of each normalized url wins.
fn collect_candidates(html: &str, listing_url: &str) -> Vec<Candidate> {
    let Some(anchor) = ANCHOR.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(anchor).take(MAX_ANCHORS_SCANNED) {
        let title = collapse_whitespace(&element_text(element));
        if char_len(&title) < MIN_ANCHOR_TEXT_CHARS {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = classifier::classify(href, listing_url) else {
            continue;
        };

        if !seen.insert(url.to_string()) {
            continue;
        }

        candidates.push(Candidate {
            url: url.to_string(),
            title,
        });
        if candidates.len() >= MAX_ITEMS_PER_PAGE {
            break;
        }
    }

    candidates
}
