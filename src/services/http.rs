use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_STRING: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_STRING: &str = "ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3";

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final url after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Outbound GET capability. Non-2xx responses are errors.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher that presents itself as a desktop browser.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_STRING));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_STRING));
        headers.insert("dnt", HeaderValue::from_static("1"));
        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, %status, "Non-success response");
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Wraps a fetcher with one process-wide request quota, shared by every
/// concurrent source scrape.
pub struct RateLimitedFetcher<F: HttpFetch> {
    inner: F,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<F: HttpFetch> RateLimitedFetcher<F> {
    pub fn new(inner: F, requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        Self { inner, limiter }
    }
}

#[async_trait]
impl<F: HttpFetch> HttpFetch for RateLimitedFetcher<F> {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.get(url, timeout).await
    }
}
