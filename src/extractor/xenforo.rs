//! Extractor for XenForo 1.x style forums
//!
//! Listing pages carry topics as `h3.title a`, topic pages carry a
//! `span.pageNavHeader` reading "Page 1/25", and each post sits in a
//! `div.messageInfo` with an `a.datePermalink` and a `blockquote.messageText`.

use crate::crawler::Document;
use crate::extractor::PageExtractor;
use crate::state::{PostRecord, TopicRef};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const TOPIC_LINK: &str = "h3.title a";
const PAGE_NAV_HEADER: &str = "span.pageNavHeader";
const MESSAGE: &str = "div.messageInfo";
const MESSAGE_DATE: &str = "a.datePermalink";
const MESSAGE_BODY: &str = "blockquote.messageText";

#[derive(Debug, Clone)]
pub struct XenForoExtractor {
    base_url: Url,
}

impl XenForoExtractor {
    /// Creates an extractor resolving relative links against `base_url`
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        self.base_url.join(href).ok().map(|url| url.to_string())
    }
}

impl PageExtractor for XenForoExtractor {
    fn extract_topic_refs(&self, doc: &Document) -> Vec<TopicRef> {
        let html = Html::parse_document(&doc.body);
        let Ok(selector) = Selector::parse(TOPIC_LINK) else {
            return Vec::new();
        };

        let mut topics = Vec::new();
        for anchor in html.select(&selector) {
            let Some(url) = anchor.value().attr("href").and_then(|h| self.resolve(h)) else {
                tracing::debug!("Skipping topic link without usable href on {}", doc.url);
                continue;
            };
            topics.push(TopicRef {
                url,
                title: collapsed_text(&anchor),
            });
        }
        topics
    }

    fn extract_page_count(&self, doc: &Document) -> u32 {
        let html = Html::parse_document(&doc.body);
        let Ok(selector) = Selector::parse(PAGE_NAV_HEADER) else {
            return 1;
        };

        html.select(&selector)
            .next()
            .map(|nav| nav.text().collect::<String>())
            .and_then(|text| parse_page_count(&text))
            .unwrap_or(1)
    }

    fn extract_posts(
        &self,
        doc: &Document,
        topic_title: &str,
        topic_url: &str,
        page: u32,
    ) -> Vec<PostRecord> {
        let html = Html::parse_document(&doc.body);
        let (Ok(message), Ok(date), Ok(body)) = (
            Selector::parse(MESSAGE),
            Selector::parse(MESSAGE_DATE),
            Selector::parse(MESSAGE_BODY),
        ) else {
            return Vec::new();
        };

        html.select(&message)
            .map(|msg| PostRecord {
                topic_title: topic_title.to_string(),
                topic_url: topic_url.to_string(),
                page,
                post_time: msg
                    .select(&date)
                    .next()
                    .map(|d| collapsed_text(&d))
                    .unwrap_or_default(),
                content: msg
                    .select(&body)
                    .next()
                    .map(|b| line_text(&b))
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Reads the trailing number of a "Page 3/25" style header
fn parse_page_count(text: &str) -> Option<u32> {
    if !text.contains('/') {
        return None;
    }
    let total = text.rsplit('/').next()?.trim();
    match total.parse::<u32>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

/// Element text with runs of whitespace collapsed to single spaces
fn collapsed_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Element text nodes, each trimmed, blank ones dropped, joined by newlines
fn line_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
