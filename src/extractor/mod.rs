//! Page extraction
//!
//! The crawl engine never looks at HTML itself. It hands fetched documents
//! to a [`PageExtractor`], which knows one site's markup. Swapping sites
//! means swapping the extractor.

mod xenforo;

pub use xenforo::XenForoExtractor;

use crate::crawler::Document;
use crate::state::{PostRecord, TopicRef};

/// Site-specific knowledge of where topics, pagination, and posts live
///
/// Every method recovers locally from missing or malformed markup; none of
/// them can fail a unit.
pub trait PageExtractor: Send + Sync {
    /// Topic links on a forum listing page; malformed entries are skipped
    fn extract_topic_refs(&self, doc: &Document) -> Vec<TopicRef>;

    /// Total pages of the topic; 1 when pagination is absent or unreadable
    fn extract_page_count(&self, doc: &Document) -> u32;

    /// Posts on one topic page
    ///
    /// A post missing its timestamp or body keeps an empty field; a post
    /// whose container is missing is not produced at all.
    fn extract_posts(
        &self,
        doc: &Document,
        topic_title: &str,
        topic_url: &str,
        page: u32,
    ) -> Vec<PostRecord>;
}
