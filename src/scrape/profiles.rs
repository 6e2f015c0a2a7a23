//! Per-publisher extraction rules for article bodies.
//!
//! A profile owns an ordered list of CSS selectors. Matching blocks longer
//! than the profile's minimum are concatenated until the accumulated text
//! passes the profile's cap. Publishers are added by registering another
//! [`SelectorProfile`], not by editing the extractor.

use scraper::{ElementRef, Html, Selector};

use super::text::{char_len, collapse_whitespace};

pub trait ExtractionProfile: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, host: &str) -> bool;

    /// Returns the raw accumulated body text, possibly empty.
    fn extract(&self, document: &Html) -> String;
}

pub struct SelectorProfile {
    name: String,
    hosts: Vec<String>,
    selectors: Vec<Selector>,
    min_block_chars: usize,
    max_chars: usize,
}

impl SelectorProfile {
    /// Selectors that fail to parse are logged and dropped.
    pub fn new(
        name: &str,
        hosts: &[&str],
        selectors: &[&str],
        min_block_chars: usize,
        max_chars: usize,
    ) -> Self {
        let selectors = selectors
            .iter()
            .filter_map(|css| match Selector::parse(css) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!(profile = name, selector = css, "Invalid selector: {:?}", e);
                    None
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            hosts: hosts.iter().map(|h| h.to_lowercase()).collect(),
            selectors,
            min_block_chars,
            max_chars,
        }
    }

    pub fn habr() -> Self {
        Self::new(
            "habr",
            &["habr.com"],
            &[
                ".article-formatted-body",
                ".post__text",
                ".article-formatted-body--full",
                ".post__text-html",
                ".article__text",
                ".post-content",
            ],
            100,
            500,
        )
    }

    pub fn tass() -> Self {
        Self::new(
            "tass",
            &["tass.ru"],
            &[
                ".article__text",
                ".text",
                ".article-body",
                ".news-text",
                ".article__content",
                ".text-block",
                ".article__body",
            ],
            50,
            400,
        )
    }

    /// Matches every host.
    pub fn generic() -> Self {
        Self::new(
            "generic",
            &[],
            &[
                "article",
                ".article",
                ".content",
                ".text",
                ".body",
                ".post-content",
                ".entry-content",
                ".news-content",
                ".story",
                ".story-body",
                ".article-body",
                ".post-body",
                "div[class*=\"content\"]",
                "div[class*=\"text\"]",
                "div[class*=\"body\"]",
                "p",
                ".lead",
                ".summary",
                ".description",
            ],
            50,
            300,
        )
    }
}

impl ExtractionProfile for SelectorProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, host: &str) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        let host = host.to_lowercase();
        self.hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }

    fn extract(&self, document: &Html) -> String {
        let mut content = String::new();

        'selectors: for selector in &self.selectors {
            for element in document.select(selector) {
                let text = element_text(element);
                if char_len(&text) > self.min_block_chars {
                    content.push(' ');
                    content.push_str(&text);
                    if char_len(&content) > self.max_chars {
                        break 'selectors;
                    }
                }
            }
        }

        content
    }
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

/// Ordered profiles with a catch-all fallback.
pub struct ProfileRegistry {
    profiles: Vec<Box<dyn ExtractionProfile>>,
    fallback: Box<dyn ExtractionProfile>,
}

impl ProfileRegistry {
    pub fn new(fallback: Box<dyn ExtractionProfile>) -> Self {
        Self {
            profiles: Vec::new(),
            fallback,
        }
    }

    pub fn register(&mut self, profile: Box<dyn ExtractionProfile>) {
        self.profiles.push(profile);
    }

    /// First registered profile that claims the host, else the fallback.
    pub fn for_host(&self, host: &str) -> &dyn ExtractionProfile {
        self.profiles
            .iter()
            .find(|p| p.matches(host))
            .map(|p| p.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut registry = Self::new(Box::new(SelectorProfile::generic()));
        registry.register(Box::new(SelectorProfile::habr()));
        registry.register(Box::new(SelectorProfile::tass()));
        registry
    }
}
