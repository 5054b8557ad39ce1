//! Work units and the records they produce

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Identifier recorded in a progress log once a unit is durably done
///
/// Each key type knows how to read itself back from one log line; lines
/// that do not parse are skipped by the loader.
pub trait UnitKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    fn parse_key(line: &str) -> Option<Self>;
}

impl UnitKey for u32 {
    fn parse_key(line: &str) -> Option<Self> {
        line.trim().parse().ok()
    }
}

impl UnitKey for String {
    fn parse_key(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// One schedulable item of crawl work
pub trait WorkUnit: Clone + fmt::Debug + Send + Sync + 'static {
    type Key: UnitKey;

    /// The identifier written to the progress log for this unit
    fn key(&self) -> Self::Key;
}

/// A forum listing page to scan for topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageUnit {
    pub page_number: u32,
}

impl PageUnit {
    pub fn new(page_number: u32) -> Self {
        Self { page_number }
    }
}

impl WorkUnit for PageUnit {
    type Key = u32;

    fn key(&self) -> u32 {
        self.page_number
    }
}

impl fmt::Display for PageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.page_number)
    }
}

/// A topic whose pages are all fetched within one unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicUnit {
    pub url: String,
    pub title: String,
}

impl WorkUnit for TopicUnit {
    type Key = String;

    fn key(&self) -> String {
        self.url.clone()
    }
}

impl From<TopicRef> for TopicUnit {
    fn from(topic: TopicRef) -> Self {
        Self {
            url: topic.url,
            title: topic.title,
        }
    }
}

impl fmt::Display for TopicUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic {}", self.url)
    }
}

/// A topic link found on a listing page
///
/// Field order matches the `url,title` columns of the topic list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRef {
    pub url: String,
    pub title: String,
}

impl TopicRef {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// One post extracted from a topic page
///
/// Serialized column names are the batch file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub topic_title: String,
    pub topic_url: String,
    /// 1-based index of the topic page the post was found on
    pub page: u32,
    pub post_time: String,
    pub content: String,
}
