pub mod classifier;
mod extractor;
mod profiles;
mod source_scraper;
pub mod text;

pub use extractor::{ContentExtractor, MAX_CONTENT_CHARS};
pub use profiles::{ExtractionProfile, ProfileRegistry, SelectorProfile};
pub use source_scraper::{SourceScraper, MAX_ITEMS_PER_PAGE};
