//! Vector store collaborator
//!
//! The vector database is an external system. The pipeline only writes
//! records and manages collection lifecycle through the [`VectorStore`]
//! trait. [`MemoryVectorStore`] backs dry runs and tests;
//! [`JsonlVectorStore`] appends records to a file a real backend can
//! bulk-load.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A text record destined for the text collection
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub text: String,
    pub url: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// An image record destined for the image collection
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub url: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Trait for the vector database collaborator
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare collections; called once at processor construction
    async fn setup(&self) -> Result<()>;

    /// Write text records to a collection
    async fn write_documents(&self, collection: &str, records: &[DocumentRecord]) -> Result<()>;

    /// Write image records to a collection
    async fn write_images(&self, collection: &str, records: &[ImageRecord]) -> Result<()>;

    /// Whether the backend stores image records natively
    fn supports_images(&self) -> bool;

    /// URLs of all records in a collection
    async fn list_documents(&self, collection: &str) -> Result<Vec<String>>;

    /// Delete records by URL; returns the number removed
    async fn delete_document(&self, collection: &str, url: &str) -> Result<usize>;

    /// Number of records in a collection
    async fn count_documents(&self, collection: &str) -> Result<usize>;

    /// Release backend resources; safe to call more than once
    async fn teardown(&self) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// In-memory vector store
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    documents: Mutex<HashMap<String, Vec<DocumentRecord>>>,
    images: Mutex<HashMap<String, Vec<ImageRecord>>>,
    supports_images: bool,
}

impl MemoryVectorStore {
    /// A store that accepts image records natively
    pub fn new() -> Self {
        Self {
            supports_images: true,
            ..Self::default()
        }
    }

    /// A text-only store; image content is synthesized into text records
    pub fn text_only() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn write_documents(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        let mut documents = self.documents.lock();
        documents
            .entry(collection.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn write_images(&self, collection: &str, records: &[ImageRecord]) -> Result<()> {
        if !self.supports_images {
            return Err(Error::vector_store("backend does not store image records"));
        }
        let mut images = self.images.lock();
        images
            .entry(collection.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(())
    }

    fn supports_images(&self) -> bool {
        self.supports_images
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        let documents = self.documents.lock();
        let mut urls: Vec<String> = documents
            .get(collection)
            .map(|records| records.iter().map(|r| r.url.clone()).collect())
            .unwrap_or_default();
        let images = self.images.lock();
        if let Some(records) = images.get(collection) {
            urls.extend(records.iter().map(|r| r.url.clone()));
        }
        Ok(urls)
    }

    async fn delete_document(&self, collection: &str, url: &str) -> Result<usize> {
        let mut removed = 0;
        let mut documents = self.documents.lock();
        if let Some(records) = documents.get_mut(collection) {
            let before = records.len();
            records.retain(|r| r.url != url && !r.url.starts_with(&format!("{url}#")));
            removed += before - records.len();
        }
        let mut images = self.images.lock();
        if let Some(records) = images.get_mut(collection) {
            let before = records.len();
            records.retain(|r| r.url != url);
            removed += before - records.len();
        }
        Ok(removed)
    }

    async fn count_documents(&self, collection: &str) -> Result<usize> {
        let documents = self.documents.lock();
        let images = self.images.lock();
        Ok(documents.get(collection).map_or(0, |r| r.len())
            + images.get(collection).map_or(0, |r| r.len()))
    }

    async fn teardown(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// One line of the JSONL store file
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct JsonlLine {
    collection: String,
    record_type: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
}

/// Vector store writing newline-delimited JSON records to a single file.
///
/// Each line is a self-contained record, so the file doubles as an export
/// an actual vector database can bulk-load later.
#[derive(Debug)]
pub struct JsonlVectorStore {
    path: std::path::PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlVectorStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, lines: &[JsonlLine]) -> Result<()> {
        use std::io::Write;
        let _guard = self.write_lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for line in lines {
            let json = serde_json::to_string(line)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    fn read_lines(&self) -> Result<Vec<JsonlLine>> {
        let _guard = self.write_lock.lock();
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut lines = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            lines.push(serde_json::from_str(line)?);
        }
        Ok(lines)
    }
}

#[async_trait]
impl VectorStore for JsonlVectorStore {
    async fn setup(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    async fn write_documents(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        let lines: Vec<JsonlLine> = records
            .iter()
            .map(|r| JsonlLine {
                collection: collection.to_string(),
                record_type: "text".to_string(),
                url: r.url.clone(),
                text: Some(r.text.clone()),
                metadata: r.metadata.clone(),
            })
            .collect();
        self.append(&lines)
    }

    async fn write_images(&self, collection: &str, records: &[ImageRecord]) -> Result<()> {
        let lines: Vec<JsonlLine> = records
            .iter()
            .map(|r| JsonlLine {
                collection: collection.to_string(),
                record_type: "image".to_string(),
                url: r.url.clone(),
                text: None,
                metadata: r.metadata.clone(),
            })
            .collect();
        self.append(&lines)
    }

    fn supports_images(&self) -> bool {
        true
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter(|l| l.collection == collection)
            .map(|l| l.url)
            .collect())
    }

    async fn delete_document(&self, collection: &str, url: &str) -> Result<usize> {
        use std::io::Write;
        let lines = self.read_lines()?;
        let _guard = self.write_lock.lock();
        let chunk_prefix = format!("{url}#");
        let (kept, removed): (Vec<_>, Vec<_>) = lines.into_iter().partition(|l| {
            l.collection != collection || (l.url != url && !l.url.starts_with(&chunk_prefix))
        });
        let mut file = std::fs::File::create(&self.path)?;
        for line in &kept {
            let json = serde_json::to_string(line)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(removed.len())
    }

    async fn count_documents(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read_lines()?
            .iter()
            .filter(|l| l.collection == collection)
            .count())
    }

    async fn teardown(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> DocumentRecord {
        DocumentRecord {
            text: "body".to_string(),
            url: url.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn writes_and_counts() {
        let store = MemoryVectorStore::new();
        store
            .write_documents("documents", &[record("file:///a.pdf")])
            .await
            .unwrap();
        assert_eq!(store.count_documents("documents").await.unwrap(), 1);
        assert_eq!(store.count_documents("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_chunk_siblings() {
        let store = MemoryVectorStore::new();
        store
            .write_documents(
                "documents",
                &[
                    record("file:///a.pdf#chunk-0"),
                    record("file:///a.pdf#chunk-1"),
                    record("file:///b.pdf"),
                ],
            )
            .await
            .unwrap();
        let removed = store
            .delete_document("documents", "file:///a.pdf")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            store.list_documents("documents").await.unwrap(),
            vec!["file:///b.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn jsonl_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlVectorStore::new(dir.path().join("records.jsonl"));
        store.setup().await.unwrap();

        store
            .write_documents(
                "documents",
                &[record("file:///a.pdf#chunk-0"), record("file:///a.pdf#chunk-1")],
            )
            .await
            .unwrap();
        store
            .write_images(
                "images",
                &[ImageRecord {
                    url: "file:///p.jpg".to_string(),
                    metadata: HashMap::new(),
                }],
            )
            .await
            .unwrap();

        assert_eq!(store.count_documents("documents").await.unwrap(), 2);
        assert_eq!(store.count_documents("images").await.unwrap(), 1);

        let removed = store
            .delete_document("documents", "file:///a.pdf")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count_documents("documents").await.unwrap(), 0);
        assert_eq!(store.count_documents("images").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn text_only_store_rejects_images() {
        let store = MemoryVectorStore::text_only();
        assert!(!store.supports_images());
        let result = store
            .write_images(
                "images",
                &[ImageRecord {
                    url: "file:///p.jpg".to_string(),
                    metadata: HashMap::new(),
                }],
            )
            .await;
        assert!(result.is_err());
    }
}
