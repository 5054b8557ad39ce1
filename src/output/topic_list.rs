//! The `url,title` topic list
//!
//! Discovery appends to it as listing pages succeed; extraction reads it in
//! full at startup.

use crate::output::BOM;
use crate::state::TopicRef;
use crate::storage::StorageResult;
use crate::{ConfigError, ConfigResult};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends discovered topics to the list file
pub struct TopicListWriter {
    writer: csv::Writer<File>,
}

impl TopicListWriter {
    /// Opens `path` for appending, writing a BOM and the header if the file is new
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let needs_header = file.metadata()?.len() == 0;
        if needs_header {
            // UTF-8 BOM ahead of the header
            file.write_all(BOM.as_bytes())?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(["url", "title"])?;
            writer.flush()?;
        }

        Ok(Self { writer })
    }

    /// Appends the topics and syncs them to disk
    pub fn append(&mut self, topics: &[TopicRef]) -> StorageResult<()> {
        for topic in topics {
            self.writer.write_record([topic.url.as_str(), topic.title.as_str()])?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Reads the whole topic list
///
/// A leading BOM is tolerated and every header and cell is trimmed, so keys
/// match the trimmed ones in the progress log. Rows that do not deserialize
/// are skipped with a warning; a missing file or missing columns are fatal.
pub fn load_topic_list(path: impl AsRef<Path>) -> ConfigResult<Vec<TopicRef>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::MissingTopicList(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let content = content.strip_prefix(BOM).unwrap_or(&content);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ConfigError::MalformedTopicList(format!("{}: {}", path.display(), e)))?;
    let has_column = |name: &str| headers.iter().any(|h| h == name);
    if !has_column("url") || !has_column("title") {
        return Err(ConfigError::MalformedTopicList(format!(
            "{}: expected a url,title header",
            path.display()
        )));
    }

    let mut topics = Vec::new();
    for (index, row) in reader.deserialize::<TopicRef>().enumerate() {
        match row {
            Ok(topic) if !topic.url.is_empty() => topics.push(topic),
            Ok(_) => tracing::warn!("Skipping row {} of {}: empty url", index + 2, path.display()),
            Err(e) => tracing::warn!("Skipping row {} of {}: {}", index + 2, path.display(), e),
        }
    }

    tracing::debug!("Loaded {} topics from {}", topics.len(), path.display());
    Ok(topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.csv");

        let mut writer = TopicListWriter::open(&path).unwrap();
        writer
            .append(&[TopicRef::new("https://forum.example/threads/a.1/", "A, the first")])
            .unwrap();
        drop(writer);

        let mut writer = TopicListWriter::open(&path).unwrap();
        writer
            .append(&[TopicRef::new("https://forum.example/threads/b.2/", "B")])
            .unwrap();
        drop(writer);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("\u{feff}url,title\n"));
        assert_eq!(content.matches("url,title").count(), 1);
        assert_eq!(content.matches('\u{feff}').count(), 1);

        let topics = load_topic_list(&path).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].title, "A, the first");
    }

    #[test]
    fn test_bom_is_stripped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.csv");
        std::fs::write(
            &path,
            "\u{feff}url,title\nhttps://forum.example/threads/a.1/,Mã VNM\n",
        )
        .unwrap();

        let topics = load_topic_list(&path).unwrap();
        assert_eq!(
            topics,
            vec![TopicRef::new("https://forum.example/threads/a.1/", "Mã VNM")]
        );
    }

    #[test]
    fn test_padded_cells_are_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.csv");
        std::fs::write(
            &path,
            "url, title\n https://forum.example/threads/a.1/ , A \n",
        )
        .unwrap();

        let topics = load_topic_list(&path).unwrap();
        assert_eq!(
            topics,
            vec![TopicRef::new("https://forum.example/threads/a.1/", "A")]
        );
    }

    #[test]
    fn test_missing_list_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = load_topic_list(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTopicList(_)));
    }

    #[test]
    fn test_wrong_header_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.csv");
        std::fs::write(&path, "link,name\nhttps://forum.example/,x\n").unwrap();

        let err = load_topic_list(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedTopicList(_)));
    }

    #[test]
    fn test_bad_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.csv");
        std::fs::write(
            &path,
            "url,title\nhttps://forum.example/threads/a.1/,A\n,blank url\nonly-one-field\n",
        )
        .unwrap();

        let topics = load_topic_list(&path).unwrap();
        assert_eq!(topics.len(), 1);
    }
}
