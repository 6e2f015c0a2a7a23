mod http;
mod telegram;

pub use http::{FetchedPage, HttpFetch, RateLimitedFetcher, ReqwestFetcher};
pub use telegram::{Notifier, TelegramNotifier};
