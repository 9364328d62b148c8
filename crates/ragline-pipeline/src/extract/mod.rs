//! Per-format text and metadata extraction

mod docx;
mod pdf;

pub use docx::DocxExtractor;
pub use pdf::{PdfExtractor, PdfTextStrategy};

use std::path::PathBuf;

use crate::types::DocumentInfo;

/// Extraction output for one document
#[derive(Debug, Default)]
pub struct ExtractedDocument {
    /// Extracted text; empty when every strategy failed
    pub text: String,
    /// Page count; zero when extraction failed outright
    pub page_count: usize,
    /// Name of the strategy that produced the text, `None` on total failure
    pub strategy: Option<&'static str>,
    /// Errors accumulated across failed strategies
    pub errors: Vec<String>,
    /// Document metadata, where the format carries any
    pub info: DocumentInfo,
    /// Embedded images harvested to temporary files; the caller owns
    /// (and must delete) these files
    pub images: Vec<HarvestedImage>,
    /// Informational notes, e.g. images skipped for size bounds
    pub notes: Vec<String>,
}

impl ExtractedDocument {
    /// True when no strategy produced text
    pub fn failed(&self) -> bool {
        self.strategy.is_none()
    }
}

/// An embedded image written to a temporary file during extraction
#[derive(Debug)]
pub struct HarvestedImage {
    /// Temporary file holding the raw image bytes
    pub path: PathBuf,
    /// Position among the document's harvested images
    pub index: usize,
    /// Raw size in bytes
    pub byte_len: usize,
}
