//! Decides whether an anchor on a listing page points at a news article.
//!
//! Pure: no I/O, the same `(href, base)` always yields the same answer.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

const SKIPPED_PREFIXES: [&str; 5] = ["javascript:", "mailto:", "tel:", "data:", "#"];

const EXCLUDED_PATH_PARTS: [&str; 45] = [
    "/press",
    "/category",
    "/tag",
    "/tags",
    "/archive",
    "/page",
    "/author",
    "/authors",
    "/search",
    "/rss",
    "/feed",
    "/sitemap",
    "/contact",
    "/about",
    "/privacy",
    "/terms",
    "/policy",
    "/login",
    "/register",
    "/signup",
    "/admin",
    "/wp-admin",
    "/dashboard",
    "/profile",
    "/settings",
    "/account",
    "/press-center",
    "/press-service",
    "/press-releases",
    "/proisshestviya",
    "/politics",
    "/economy",
    "/sport",
    "/culture",
    "/world",
    "/russia",
    "/regions",
    "/society",
    "/business",
    "/science",
    "/technology",
    "/auto",
    "/realty",
    "/health",
    "/subscribe",
];

/// Publishers that may be linked from any listing page.
const ALLOWED_FOREIGN_HOSTS: [&str; 5] = [
    "tass.ru",
    "ria.ru",
    "interfax.ru",
    "kommersant.ru",
    "vedomosti.ru",
];

static DATE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4}/\d{1,2}/\d{1,2}/").unwrap());
static NUMERIC_ID_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4,}(?:/|$)").unwrap());
static ANY_NUMERIC_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d+/").unwrap());
static TRAILING_NUMERIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d+$").unwrap());
static ANY_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());

const GENERIC_ARTICLE_MARKERS: [&str; 3] = ["/news/", "/article/", "/story/"];

/// Rule set for a publisher family whose urls follow a known shape.
struct PublisherRule {
    host: &'static str,
    sections: &'static [&'static str],
    numeric_id: &'static LazyLock<Regex>,
}

static PUBLISHER_RULES: [PublisherRule; 2] = [
    PublisherRule {
        host: "habr.com",
        sections: &["/news/", "/articles/", "/companies/"],
        numeric_id: &ANY_NUMERIC_SEGMENT,
    },
    PublisherRule {
        host: "tass.ru",
        sections: &["/news/", "/mejdunarodnaya-panorama/", "/politika/", "/obschestvo/"],
        numeric_id: &TRAILING_NUMERIC_ID,
    },
];

impl PublisherRule {
    fn accepts(&self, path: &str) -> bool {
        self.sections.iter().any(|s| path.contains(s)) || self.numeric_id.is_match(path)
    }
}

/// Returns the absolute article url when `raw_href` looks like a news link
/// relative to the listing page at `base_url`.
pub fn classify(raw_href: &str, base_url: &str) -> Option<Url> {
    let base = Url::parse(base_url).ok()?;
    let link = normalize_href(raw_href, &base)?;
    if is_news_link(&link, &base) {
        Some(link)
    } else {
        None
    }
}

/// Resolves an href to an absolute http(s) url without fragment.
pub fn normalize_href(raw_href: &str, base: &Url) -> Option<Url> {
    let href = raw_href.trim();
    if href.is_empty() {
        return None;
    }

    let lower = href.to_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let mut resolved = if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(href).ok()?
    } else if href.starts_with('/') {
        base.join(href).ok()?
    } else {
        // Relative links resolve against the page treated as a directory.
        let dir = format!("{}/", base.as_str().trim_end_matches('/'));
        let dir = Url::parse(&dir).ok()?;
        dir.join(href.trim_start_matches(['.', '/'])).ok()?
    };

    if !matches!(resolved.scheme(), "http" | "https") || resolved.host_str().is_none() {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn same_origin_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn is_news_link(link: &Url, base: &Url) -> bool {
    let path = link.path().to_lowercase();

    if EXCLUDED_PATH_PARTS.iter().any(|p| path.contains(p)) {
        return false;
    }

    let host = link.host_str().unwrap_or_default().to_lowercase();

    if let Some(rule) = PUBLISHER_RULES.iter().find(|r| host_matches(&host, r.host)) {
        return rule.accepts(&path);
    }

    if !same_origin_host(link, base) {
        return ALLOWED_FOREIGN_HOSTS
            .iter()
            .any(|allowed| host_matches(&host, allowed));
    }

    if DATE_PATH.is_match(&path)
        || NUMERIC_ID_SEGMENT.is_match(&path)
        || GENERIC_ARTICLE_MARKERS.iter().any(|m| path.contains(m))
    {
        return true;
    }

    // Last resort: long paths carrying a digit are usually article slugs.
    path.chars().count() > 20 && ANY_DIGIT.is_match(&path)
}
