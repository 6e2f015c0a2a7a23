use url::Url;

use crate::models::Article;
use crate::scrape::text::truncate_with_ellipsis;

pub const TITLE_LIMIT: usize = 100;
/// Body cap for scheduled delivery. Manual fetches send the stored body as is.
pub const SCHEDULED_BODY_LIMIT: usize = 250;

const SEPARATOR_WIDTH: usize = 30;
const VIDEO_TITLE_MARKERS: [&str; 2] = ["video", "видео"];
const VIDEO_CONTENT_MARKERS: [&str; 2] = ["🎥", "🎬"];

/// Builds one HTML-mode notification for an article.
pub fn render_article(article: &Article, body_limit: Option<usize>) -> String {
    let icon = if is_video(article) { "🎬" } else { "📰" };
    let title = truncate_with_ellipsis(&article.title, TITLE_LIMIT);
    let body = match body_limit {
        Some(limit) => truncate_with_ellipsis(&article.content, limit),
        None => article.content.clone(),
    };

    let mut message = format!("{} <b>{}</b>\n", icon, escape_html_text(&title));
    message.push_str(&format!("📍 {}\n", escape_html_text(&source_domain(&article.url))));
    if !body.trim().is_empty() {
        message.push_str(&format!("\n📝 {}\n", escape_html_text(&body)));
    }
    message.push_str(&format!(
        "\n🔗 <a href=\"{}\">Read more</a>\n{}",
        escape_html_attr(&article.url),
        "─".repeat(SEPARATOR_WIDTH)
    ));
    message
}

fn is_video(article: &Article) -> bool {
    let title = article.title.to_lowercase();
    VIDEO_TITLE_MARKERS.iter().any(|m| title.contains(m))
        || VIDEO_CONTENT_MARKERS.iter().any(|m| article.content.contains(m))
}

/// Host of the article url without a leading `www.`.
pub fn source_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

fn escape_html_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_html_attr(text: &str) -> String {
    escape_html_text(text).replace('"', "&quot;")
}
