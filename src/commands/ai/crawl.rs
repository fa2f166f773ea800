//! Link metadata handed to the assistant alongside a prompt.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

const MAX_PARAGRAPHS: usize = 10;
const MAX_PARAGRAPH_CHARS: usize = 1500;
const IMAGE_TYPES: [&str; 4] = ["png", "jpeg", "webp", "gif"];

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<?(https?://\S+?)>?(?:\s|$)").expect("valid link pattern"));
static META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta pattern"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute pattern")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("valid title pattern"));
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("valid paragraph pattern"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// What an HTML page is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub description: String,
    pub paragraphs: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlResult {
    Html(PageSummary),
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Html,
    Image,
}

/// Every http(s) link in `text`, without surrounding `<>`.
pub fn extract_links(text: &str) -> Vec<String> {
    LINK.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Pages and image formats the assistant accepts; everything else is skipped.
pub fn classify(content_type: &str) -> Option<LinkKind> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if content_type.starts_with("text/html") {
        return Some(LinkKind::Html);
    }
    let subtype = content_type.strip_prefix("image/")?;
    let subtype = subtype.split(';').next().unwrap_or_default().trim();
    IMAGE_TYPES.contains(&subtype).then_some(LinkKind::Image)
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn strip_tags(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    decode_entities(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Attributes of every `<meta>` tag, keyed by lower-cased name.
fn meta_tags(html: &str) -> Vec<HashMap<String, String>> {
    META.find_iter(html)
        .map(|tag| {
            ATTRIBUTE
                .captures_iter(tag.as_str())
                .filter_map(|caps| {
                    let name = caps.get(1)?.as_str().to_ascii_lowercase();
                    let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
                    Some((name, decode_entities(value)))
                })
                .collect()
        })
        .collect()
}

fn meta_content(tags: &[HashMap<String, String>], attribute: &str, value: &str) -> Option<String> {
    tags.iter()
        .find(|tag| {
            tag.get(attribute)
                .is_some_and(|v| v.eq_ignore_ascii_case(value))
        })
        .and_then(|tag| tag.get("content").cloned())
        .filter(|content| !content.is_empty())
}

/// Title, description and opening paragraphs of a page.
///
/// The Open Graph title wins over `<title>`; the plain description wins over
/// the Open Graph one, which sites tend to shorten.
pub fn summarize_html(url: &str, html: &str) -> PageSummary {
    let tags = meta_tags(html);

    let title = meta_content(&tags, "property", "og:title")
        .or_else(|| {
            TITLE
                .captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| strip_tags(m.as_str()))
        })
        .unwrap_or_default();
    let description = meta_content(&tags, "name", "description")
        .or_else(|| meta_content(&tags, "property", "og:description"))
        .unwrap_or_default();

    let paragraphs = PARAGRAPH
        .captures_iter(html)
        .take(MAX_PARAGRAPHS)
        .filter_map(|caps| caps.get(1))
        .map(|m| strip_tags(m.as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    PageSummary {
        url: url.to_string(),
        title,
        description,
        paragraphs: paragraphs.trim().chars().take(MAX_PARAGRAPH_CHARS).collect(),
    }
}

/// Fetch `url` and describe it. Unreachable and unsupported links yield
/// `None`.
pub async fn crawl(http: &reqwest::Client, url: &str) -> Option<CrawlResult> {
    let response = match http.get(url.trim()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("Could not fetch {}: {}", url, e);
            return None;
        }
    };

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match classify(&content_type)? {
        LinkKind::Image => Some(CrawlResult::Image(url.to_string())),
        LinkKind::Html => {
            let html = response.text().await.ok()?;
            Some(CrawlResult::Html(summarize_html(url, &html)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links() {
        let text = "look <https://a.example/x> and https://b.example/y?q=1\nthen http://c.example";
        assert_eq!(
            extract_links(text),
            vec![
                "https://a.example/x".to_string(),
                "https://b.example/y?q=1".to_string(),
                "http://c.example".to_string(),
            ]
        );
        assert!(extract_links("no links here").is_empty());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("text/html; charset=utf-8"), Some(LinkKind::Html));
        assert_eq!(classify("image/png"), Some(LinkKind::Image));
        assert_eq!(classify("IMAGE/JPEG"), Some(LinkKind::Image));
        assert_eq!(classify("image/svg+xml"), None);
        assert_eq!(classify("application/json"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_summarize_prefers_open_graph_title_and_plain_description() {
        let html = r#"
            <html><head>
              <title>Fallback title</title>
              <meta property="og:title" content="OG &amp; title">
              <meta content='Short' property='og:description'>
              <meta name="description" content="The full description">
            </head><body>
              <p>First <b>bold</b> paragraph.</p>
              <p class="x">Second
                 paragraph.</p>
            </body></html>
        "#;

        let summary = summarize_html("https://a.example", html);
        assert_eq!(summary.url, "https://a.example");
        assert_eq!(summary.title, "OG & title");
        assert_eq!(summary.description, "The full description");
        assert_eq!(summary.paragraphs, "First bold paragraph. Second paragraph.");
    }

    #[test]
    fn test_summarize_falls_back_to_title_tag() {
        let html = "<title> Plain </title><meta property=\"og:description\" content=\"OG only\">";
        let summary = summarize_html("u", html);
        assert_eq!(summary.title, "Plain");
        assert_eq!(summary.description, "OG only");
        assert_eq!(summary.paragraphs, "");
    }

    #[test]
    fn test_paragraphs_are_capped() {
        let html = (0..20).map(|i| format!("<p>{}</p>", i)).collect::<String>();
        let summary = summarize_html("u", &html);
        assert_eq!(summary.paragraphs, "0 1 2 3 4 5 6 7 8 9");

        let long = format!("<p>{}</p>", "x".repeat(2000));
        assert_eq!(summarize_html("u", &long).paragraphs.len(), MAX_PARAGRAPH_CHARS);
    }
}
