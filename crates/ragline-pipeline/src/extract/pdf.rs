//! PDF text extraction with a multi-library fallback chain
//!
//! PDFs in the wild are frequently malformed, and no single library reads
//! them all. Extraction runs an ordered list of interchangeable strategies
//! until one produces text; each failure is accumulated rather than raised,
//! and only a fully exhausted chain marks the document as failed.

use lopdf::Object;
use std::io::Write;
use std::path::Path;

use super::{ExtractedDocument, HarvestedImage};
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

/// One attempt at pulling text out of a PDF
pub trait PdfTextStrategy: Send + Sync {
    /// Short name used in logs and accumulated errors
    fn name(&self) -> &'static str;

    /// Extract text from raw PDF bytes; empty output is a failure
    fn extract(&self, data: &[u8]) -> Result<String>;
}

/// Primary strategy: `pdf-extract`, robust on most well-formed files
struct PdfExtractStrategy;

impl PdfTextStrategy for PdfExtractStrategy {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, data: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::file_parse("document.pdf", e.to_string()))?;
        if text.trim().is_empty() {
            return Err(Error::file_parse("document.pdf", "no extractable text"));
        }
        Ok(text)
    }
}

/// Second strategy: `lopdf` page-by-page extraction, better on files with
/// unusual layouts or partially broken cross-reference tables
struct LopdfStrategy;

impl PdfTextStrategy for LopdfStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse("document.pdf", e.to_string()))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        let text = doc
            .extract_text(&pages)
            .map_err(|e| Error::file_parse("document.pdf", e.to_string()))?;
        if text.trim().is_empty() {
            return Err(Error::file_parse("document.pdf", "no extractable text"));
        }
        Ok(text)
    }
}

/// Last-resort strategy: scan raw content streams for text-show operators
struct ContentScanStrategy;

impl PdfTextStrategy for ContentScanStrategy {
    fn name(&self) -> &'static str {
        "content-scan"
    }

    fn extract(&self, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse("document.pdf", e.to_string()))?;

        let mut all_text = String::new();
        for (_page_num, page_id) in doc.get_pages() {
            if let Ok(content) = doc.get_page_content(page_id) {
                let text = scan_content_stream(&content);
                if !text.is_empty() {
                    all_text.push_str(&text);
                    all_text.push('\n');
                }
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::file_parse(
                "document.pdf",
                "no text operators found; PDF may be image-based or encrypted",
            ));
        }
        Ok(all_text)
    }
}

/// Extract text from a PDF content stream by scanning BT/ET blocks for
/// `Tj`/`TJ` operators with literal string operands
fn scan_content_stream(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let line = line.trim();
        if line == "BT" {
            in_text_block = true;
            continue;
        }
        if line == "ET" {
            in_text_block = false;
            continue;
        }
        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let Some(start) = line.find('(') {
                if let Some(end) = line.rfind(')') {
                    if start < end {
                        let decoded = line[start + 1..end]
                            .replace("\\n", "\n")
                            .replace("\\r", "\r")
                            .replace("\\t", "\t")
                            .replace("\\(", "(")
                            .replace("\\)", ")")
                            .replace("\\\\", "\\");
                        text.push_str(&decoded);
                        text.push(' ');
                    }
                }
            }
        }
    }

    text
}

/// Normalize extracted PDF text: ligatures, typographic punctuation,
/// null bytes, and blank-line noise
fn normalize_text(text: &str) -> String {
    let text = text
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\0', "");

    text.lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Multi-strategy PDF extractor with embedded-image harvesting
pub struct PdfExtractor {
    strategies: Vec<Box<dyn PdfTextStrategy>>,
    min_image_bytes: usize,
    max_image_bytes: usize,
}

impl PdfExtractor {
    /// Default chain: pdf-extract, then lopdf, then a raw content scan
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_strategies(
            vec![
                Box::new(PdfExtractStrategy),
                Box::new(LopdfStrategy),
                Box::new(ContentScanStrategy),
            ],
            config,
        )
    }

    /// Build an extractor from an explicit strategy chain
    pub fn with_strategies(
        strategies: Vec<Box<dyn PdfTextStrategy>>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            strategies,
            min_image_bytes: config.min_image_bytes,
            max_image_bytes: config.max_image_bytes,
        }
    }

    /// Extract text, metadata, and embedded images from a PDF file.
    ///
    /// Never fails on unreadable content: an exhausted strategy chain
    /// returns a document with `failed() == true`, a sentinel text body,
    /// zero pages, and the accumulated per-strategy errors. Only the
    /// initial file read can return `Err`.
    pub fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = std::fs::read(path)?;

        let mut doc = ExtractedDocument::default();

        for strategy in &self.strategies {
            match strategy.extract(&data) {
                Ok(text) => {
                    tracing::debug!("[{}] extracted via {}", filename, strategy.name());
                    doc.text = normalize_text(&text);
                    doc.strategy = Some(strategy.name());
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] {} failed: {}, trying next strategy",
                        filename,
                        strategy.name(),
                        e
                    );
                    doc.errors.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if doc.failed() {
            doc.text = format!(
                "[PDF extraction failed: {}]",
                doc.errors.join("; ")
            );
            doc.page_count = 0;
            return Ok(doc);
        }

        doc.page_count = match lopdf::Document::load_mem(&data) {
            Ok(parsed) => {
                let pages = parsed.get_pages().len();
                self.harvest_images(&parsed, &filename, &mut doc);
                pages.max(1)
            }
            Err(_) => 1,
        };

        Ok(doc)
    }

    /// Collect embedded raster images within the configured size bounds
    /// into temporary files for downstream analysis
    fn harvest_images(&self, parsed: &lopdf::Document, filename: &str, doc: &mut ExtractedDocument) {
        for (_id, object) in parsed.objects.iter() {
            let Object::Stream(stream) = object else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|o| o.as_name().ok())
                .is_some_and(|n| n == b"Image");
            if !is_image {
                continue;
            }
            let Some(ext) = image_extension(stream) else {
                continue;
            };

            let data = &stream.content;
            if data.len() < self.min_image_bytes || data.len() > self.max_image_bytes {
                doc.notes.push(format!(
                    "embedded image ({} bytes) outside size bounds, skipped",
                    data.len()
                ));
                continue;
            }

            match write_temp_image(data, ext) {
                Ok(path) => {
                    tracing::debug!(
                        "[{}] harvested embedded image #{} ({} bytes)",
                        filename,
                        doc.images.len(),
                        data.len()
                    );
                    doc.images.push(HarvestedImage {
                        path,
                        index: doc.images.len(),
                        byte_len: data.len(),
                    });
                }
                Err(e) => {
                    doc.notes.push(format!("could not save embedded image: {}", e));
                }
            }
        }
    }
}

/// Map the stream's filter to a raster format we can hand to the analyzer
fn image_extension(stream: &lopdf::Stream) -> Option<&'static str> {
    let filter = stream.dict.get(b"Filter").ok()?;
    let names: Vec<&[u8]> = match filter {
        Object::Name(name) => vec![name.as_slice()],
        Object::Array(items) => items.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => return None,
    };
    if names.iter().any(|n| *n == b"DCTDecode") {
        Some("jpg")
    } else if names.iter().any(|n| *n == b"JPXDecode") {
        Some("jp2")
    } else {
        None
    }
}

fn write_temp_image(data: &[u8], ext: &str) -> Result<std::path::PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("ragline-img-")
        .suffix(&format!(".{ext}"))
        .tempfile()?;
    file.write_all(data)?;
    let path = file
        .into_temp_path()
        .keep()
        .map_err(|e| Error::internal(format!("could not persist temp image: {}", e)))?;
    Ok(path)
}
