//! Whitespace and length helpers shared by the scraper and the renderer.
//!
//! All lengths are counted in characters, not bytes: listing pages are
//! frequently Cyrillic and byte slicing would split code points.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapses every whitespace run to one space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s, " ").trim().to_string()
}

/// Keeps at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncates to `max` characters and appends `...` when anything was cut.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if char_len(s) > max {
        format!("{}...", truncate_chars(s, max))
    } else {
        s.to_string()
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_mixed_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c  "), "a b c");
        assert_eq!(collapse_whitespace("\n\n"), "");
    }

    #[test]
    fn truncation_counts_characters() {
        let cyrillic = "Новости дня";
        assert_eq!(truncate_chars(cyrillic, 7), "Новости");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
    }
}
