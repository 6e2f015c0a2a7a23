use crate::models::ScrapedItem;
use crate::scrape::text::char_len;

/// Items shorter than this (trimmed) are never persisted by the sweep.
pub const MIN_STORED_CONTENT_CHARS: usize = 30;

/// Keeps items whose `title + " " + content` contains any keyword,
/// case-insensitively. No keywords means no filtering.
pub fn filter_by_keywords(items: Vec<ScrapedItem>, keywords: &[String]) -> Vec<ScrapedItem> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if needles.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let haystack = format!("{} {}", item.title, item.content).to_lowercase();
            needles.iter().any(|n| haystack.contains(n.as_str()))
        })
        .collect()
}

pub fn has_min_content(item: &ScrapedItem) -> bool {
    char_len(item.content.trim()) >= MIN_STORED_CONTENT_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, content: &str) -> ScrapedItem {
        ScrapedItem::new(title, format!("https://example.com/{}", title.len()), content)
    }

    #[test]
    fn matches_title_or_content_case_insensitively() {
        let items = vec![
            item("City council vote", "The Election results are in"),
            item("Weather today", "Sunny with light wind"),
        ];
        let kept = filter_by_keywords(items, &["election".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "City council vote");
    }

    #[test]
    fn cyrillic_keywords_ignore_case() {
        let items = vec![item("ВЫБОРЫ в городе", ""), item("Погода", "")];
        let kept = filter_by_keywords(items, &["выборы".to_string()]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn no_keywords_keeps_everything() {
        let items = vec![item("a", "b"), item("cc", "d")];
        assert_eq!(filter_by_keywords(items.clone(), &[]), items);
        assert_eq!(filter_by_keywords(items.clone(), &["  ".to_string()]), items);
    }

    #[test]
    fn content_gate_counts_trimmed_characters() {
        assert!(!has_min_content(&item("t", &format!("  {}  ", "x".repeat(29)))));
        assert!(has_min_content(&item("t", &"я".repeat(30))));
    }
}
