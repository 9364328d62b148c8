//! Per-file processing outcome

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::FileKind;

/// Per-stage durations in milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub extraction_ms: u64,
    pub chunking_ms: u64,
    pub image_analysis_ms: u64,
    pub storage_ms: u64,
}

impl StageTimings {
    pub fn total_ms(&self) -> u64 {
        self.extraction_ms + self.chunking_ms + self.image_analysis_ms + self.storage_ms
    }
}

/// Outcome of analyzing a single image (standalone or harvested from a PDF)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageOutcome {
    /// Image path (for harvested images, the temporary file it lived in)
    pub path: PathBuf,
    /// Path of the PDF this image was harvested from, if any
    pub source_document: Option<PathBuf>,
    pub success: bool,
    pub has_exif: bool,
    pub has_classification: bool,
    pub has_ocr: bool,
    pub error: Option<String>,
}

/// Document metadata captured during extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub author: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub paragraph_count: Option<usize>,
    pub table_count: Option<usize>,
}

impl DocumentInfo {
    pub fn is_empty(&self) -> bool {
        self.author.is_none()
            && self.title.is_none()
            && self.subject.is_none()
            && self.created.is_none()
            && self.modified.is_none()
            && self.paragraph_count.is_none()
            && self.table_count.is_none()
    }
}

/// The outcome of processing one input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// File name component
    pub file_name: String,
    /// Full path of the input file
    pub path: PathBuf,
    /// Detected kind
    pub kind: FileKind,
    /// Size in bytes
    pub size_bytes: u64,
    /// Per-stage durations
    pub timings: StageTimings,
    /// Number of chunks written to the text collection
    pub chunk_count: usize,
    /// Page count for paginated documents
    pub page_count: usize,
    /// Images harvested from the document and analyzed
    pub image_outcomes: Vec<ImageOutcome>,
    /// Document metadata, where the format carries any
    pub document_info: DocumentInfo,
    /// Errors accumulated across attempts
    pub errors: Vec<String>,
    /// Informational notes (not failures)
    pub notes: Vec<String>,
    /// Whether the file was skipped (held lock, already processed)
    pub skipped: bool,
    /// Attempts actually made (0 for unsupported files)
    pub retry_count: u32,
}

impl ProcessingResult {
    /// Start an empty result for a file
    pub fn new(path: &Path, kind: FileKind, size_bytes: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            file_name,
            path: path.to_path_buf(),
            kind,
            size_bytes,
            timings: StageTimings::default(),
            chunk_count: 0,
            page_count: 0,
            image_outcomes: Vec::new(),
            document_info: DocumentInfo::default(),
            errors: Vec::new(),
            notes: Vec::new(),
            skipped: false,
            retry_count: 0,
        }
    }

    /// A failure result carrying a single error
    pub fn failure(path: &Path, kind: FileKind, size_bytes: u64, error: impl Into<String>) -> Self {
        let mut result = Self::new(path, kind, size_bytes);
        result.errors.push(error.into());
        result
    }

    /// A skip result (lock held, recently processed)
    pub fn skip(path: &Path, kind: FileKind, size_bytes: u64, reason: impl Into<String>) -> Self {
        let mut result = Self::failure(path, kind, size_bytes, reason);
        result.skipped = true;
        result
    }

    /// Success is defined as the absence of errors
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of images successfully analyzed
    pub fn images_analyzed(&self) -> usize {
        self.image_outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of images harvested out of a document (as opposed to
    /// standalone image files)
    pub fn images_extracted(&self) -> usize {
        self.image_outcomes
            .iter()
            .filter(|o| o.source_document.is_some())
            .count()
    }
}
