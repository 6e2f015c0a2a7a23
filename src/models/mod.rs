mod article;
mod source;
pub mod subscriber;

pub use article::{Article, ScrapedItem};
pub use source::{Keyword, Source, SourceSchedule};
pub use subscriber::{StoreStats, Subscriber, SubscriberSettings};
