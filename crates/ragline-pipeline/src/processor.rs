//! Per-file processing: extraction, chunking, storage, and retries
//!
//! The processor is the error boundary for a single file. Extraction,
//! chunking, and storage failures are retried a bounded number of times and
//! surfaced as fields on the returned [`ProcessingResult`]; no error
//! escapes `process_file_with_retry` as an exception.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analyzer::{ImageAnalysis, ImageAnalyzer};
use crate::chunker::TextChunker;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::extract::{DocxExtractor, ExtractedDocument, PdfExtractor};
use crate::store::{DocumentRecord, ImageRecord, VectorStore};
use crate::types::{FileKind, ImageOutcome, ProcessingResult, ProcessingTask};

/// Deletes leftover temporary files when an attempt ends, on any path out
struct TempFiles(Vec<PathBuf>);

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove temp image {:?}: {}", path, e),
            }
        }
    }
}

/// Converts one file into stored records, with retry on transient failure
pub struct FileProcessor {
    chunker: TextChunker,
    pdf: Arc<PdfExtractor>,
    store: Arc<dyn VectorStore>,
    analyzer: Arc<dyn ImageAnalyzer>,
    text_collection: String,
    image_collection: String,
    max_retries: u32,
    retry_delay: Duration,
    closed: AtomicBool,
}

impl FileProcessor {
    /// Create a processor and set up the backing collections
    pub async fn new(
        config: &PipelineConfig,
        store: Arc<dyn VectorStore>,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Result<Self> {
        store.setup().await?;
        Ok(Self {
            chunker: TextChunker::new(config.chunking.chunk_size, config.chunking.overlap_ratio),
            pdf: Arc::new(PdfExtractor::new(&config.extraction)),
            store,
            analyzer,
            text_collection: config.collections.text_collection.clone(),
            image_collection: config.collections.image_collection.clone(),
            max_retries: config.processing.max_retries,
            retry_delay: Duration::from_millis(config.processing.retry_delay_ms),
            closed: AtomicBool::new(false),
        })
    }

    /// Process one file, retrying transient failures.
    ///
    /// Unsupported kinds fail immediately with zero attempts. Supported
    /// kinds get `max_retries + 1` attempts with a short sleep in between;
    /// the result's `retry_count` records the attempts actually made.
    pub async fn process_file_with_retry(&self, task: &ProcessingTask) -> ProcessingResult {
        let filename = task.file_name();

        if !task.kind.is_supported() {
            let ext = task
                .path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "none".to_string());
            tracing::info!("[{}] skipped: unsupported extension", filename);
            return ProcessingResult::failure(
                &task.path,
                task.kind,
                task.size_bytes,
                Error::UnsupportedFileType(ext).to_string(),
            );
        }

        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let outcome = match task.kind {
                FileKind::Document => self.process_document(task).await,
                FileKind::Image => self.process_image_file(task).await,
                FileKind::Unsupported => unreachable!("filtered above"),
            };

            match outcome {
                Ok(mut result) => {
                    result.retry_count = attempt;
                    return result;
                }
                Err(e) => {
                    tracing::error!(
                        "[{}] attempt {}/{} failed: {:?}",
                        filename,
                        attempt,
                        attempts,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let mut result = ProcessingResult::failure(
            &task.path,
            task.kind,
            task.size_bytes,
            format!("{} (after {} attempts)", last_error, attempts),
        );
        result.retry_count = attempts;
        result
    }

    /// One attempt at a PDF or DOCX file
    async fn process_document(&self, task: &ProcessingTask) -> Result<ProcessingResult> {
        let filename = task.file_name();
        let mut result = ProcessingResult::new(&task.path, task.kind, task.size_bytes);

        // Extraction (blocking parsers, moved off the runtime)
        let started = Instant::now();
        let extracted = self.extract_document(&task.path).await?;
        result.timings.extraction_ms = started.elapsed().as_millis() as u64;

        // Temp images are deleted no matter how this attempt ends
        let _temp_guard = TempFiles(extracted.images.iter().map(|i| i.path.clone()).collect());

        if extracted.failed() {
            return Err(Error::file_parse(&filename, extracted.errors.join("; ")));
        }
        if extracted.text.trim().is_empty() {
            return Err(Error::file_parse(&filename, "extracted text is empty"));
        }

        result.page_count = extracted.page_count;
        result.document_info = extracted.info.clone();
        result.notes = extracted.notes.clone();

        // Chunking
        let started = Instant::now();
        let chunks = self.chunker.chunk(&extracted.text);
        result.timings.chunking_ms = started.elapsed().as_millis() as u64;
        result.chunk_count = chunks.len();

        // Storage
        let started = Instant::now();
        let records = build_document_records(&task.path, &extracted, &chunks);
        self.store
            .write_documents(&self.text_collection, &records)
            .await?;
        result.timings.storage_ms = started.elapsed().as_millis() as u64;

        // Embedded images, each isolated from the document's outcome
        if !extracted.images.is_empty() {
            let started = Instant::now();
            for image in &extracted.images {
                let outcome = self.analyze_image(&image.path, Some(&task.path)).await;
                result.image_outcomes.push(outcome);
            }
            result.timings.image_analysis_ms = started.elapsed().as_millis() as u64;
        }

        tracing::info!(
            "[{}] stored {} chunks, {} pages, {} embedded images",
            filename,
            result.chunk_count,
            result.page_count,
            result.image_outcomes.len()
        );
        Ok(result)
    }

    async fn extract_document(&self, path: &Path) -> Result<ExtractedDocument> {
        let is_docx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
        let path = path.to_path_buf();

        let handle = if is_docx {
            tokio::task::spawn_blocking(move || DocxExtractor::extract(&path))
        } else {
            let pdf = self.pdf.clone();
            tokio::task::spawn_blocking(move || pdf.extract(&path))
        };

        handle
            .await
            .map_err(|e| Error::internal(format!("extraction task failed: {}", e)))?
    }

    /// One attempt at a standalone image file
    async fn process_image_file(&self, task: &ProcessingTask) -> Result<ProcessingResult> {
        let filename = task.file_name();
        let mut result = ProcessingResult::new(&task.path, task.kind, task.size_bytes);

        let started = Instant::now();
        let analysis = self.analyzer.process_image(&task.path).await?;
        result.timings.image_analysis_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        self.store_image(&task.path, &analysis, None).await?;
        result.timings.storage_ms = started.elapsed().as_millis() as u64;

        result.image_outcomes.push(ImageOutcome {
            path: task.path.clone(),
            source_document: None,
            success: true,
            has_exif: analysis.has_exif(),
            has_classification: analysis.has_classification(),
            has_ocr: analysis.has_ocr(),
            error: None,
        });

        tracing::info!("[{}] image analyzed and stored", filename);
        Ok(result)
    }

    /// Analyze and store one image, capturing failure in the outcome
    /// instead of failing the owning document
    async fn analyze_image(&self, path: &Path, source_document: Option<&Path>) -> ImageOutcome {
        let mut outcome = ImageOutcome {
            path: path.to_path_buf(),
            source_document: source_document.map(|p| p.to_path_buf()),
            success: false,
            has_exif: false,
            has_classification: false,
            has_ocr: false,
            error: None,
        };

        match self.analyzer.process_image(path).await {
            Ok(analysis) => {
                outcome.has_exif = analysis.has_exif();
                outcome.has_classification = analysis.has_classification();
                outcome.has_ocr = analysis.has_ocr();
                match self.store_image(path, &analysis, source_document).await {
                    Ok(()) => outcome.success = true,
                    Err(e) => outcome.error = Some(e.to_string()),
                }
            }
            Err(e) => outcome.error = Some(e.to_string()),
        }

        if let Some(error) = &outcome.error {
            tracing::warn!("[{}] embedded image failed: {}", path.display(), error);
        }
        outcome
    }

    /// Write an analyzed image to the image collection, or synthesize a
    /// text record when the backend is text-only
    async fn store_image(
        &self,
        path: &Path,
        analysis: &ImageAnalysis,
        source_document: Option<&Path>,
    ) -> Result<()> {
        let url = file_url(path);
        let mut metadata = HashMap::new();
        metadata.insert(
            "file_name".to_string(),
            serde_json::json!(path.file_name().map(|n| n.to_string_lossy().to_string())),
        );
        if let Some(source) = source_document {
            metadata.insert(
                "source_document".to_string(),
                serde_json::json!(file_url(source)),
            );
        }
        metadata.insert("exif".to_string(), serde_json::json!(analysis.exif));
        metadata.insert(
            "classification".to_string(),
            serde_json::to_value(&analysis.classification)?,
        );
        metadata.insert(
            "ocr_content".to_string(),
            serde_json::to_value(&analysis.ocr_content)?,
        );

        if self.store.supports_images() {
            let record = ImageRecord { url, metadata };
            self.store
                .write_images(&self.image_collection, &[record])
                .await
        } else {
            // Text-only backend: keep the image searchable via its labels
            let label = analysis
                .classification
                .top_prediction
                .clone()
                .unwrap_or_else(|| "unclassified".to_string());
            let text = format!(
                "Image classified as: {}. OCR text: {}",
                label,
                analysis.ocr_content.extracted_text.trim()
            );
            let record = DocumentRecord {
                text,
                url,
                metadata,
            };
            self.store
                .write_documents(&self.text_collection, &[record])
                .await
        }
    }

    /// Release the collection handles; safe to call multiple times
    pub async fn cleanup(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.store.teardown().await {
            tracing::warn!("Store teardown failed: {}", e);
        }
    }
}

/// Build storage records for a chunked document.
///
/// A single chunk is stored at the file URL itself; multiple chunks share
/// the base URL with a `#chunk-N` suffix and carry enough metadata to
/// reassemble the parent document without a join table.
fn build_document_records(
    path: &Path,
    extracted: &ExtractedDocument,
    chunks: &[String],
) -> Vec<DocumentRecord> {
    let base_url = file_url(path);
    let content_hash = hex::encode(Sha256::digest(extracted.text.as_bytes()));
    let chunk_sizes: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();

    let base_metadata = |metadata: &mut HashMap<String, serde_json::Value>| {
        metadata.insert(
            "file_name".to_string(),
            serde_json::json!(path.file_name().map(|n| n.to_string_lossy().to_string())),
        );
        metadata.insert("page_count".to_string(), serde_json::json!(extracted.page_count));
        metadata.insert("content_hash".to_string(), serde_json::json!(content_hash));
        if let Some(title) = &extracted.info.title {
            metadata.insert("title".to_string(), serde_json::json!(title));
        }
        if let Some(author) = &extracted.info.author {
            metadata.insert("author".to_string(), serde_json::json!(author));
        }
    };

    if chunks.len() == 1 {
        let mut metadata = HashMap::new();
        base_metadata(&mut metadata);
        return vec![DocumentRecord {
            text: chunks[0].clone(),
            url: base_url,
            metadata,
        }];
    }

    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let mut metadata = HashMap::new();
            base_metadata(&mut metadata);
            metadata.insert("total_chunks".to_string(), serde_json::json!(chunks.len()));
            metadata.insert("chunk_index".to_string(), serde_json::json!(index));
            metadata.insert("chunk_sizes".to_string(), serde_json::json!(chunk_sizes));
            DocumentRecord {
                text: chunk.clone(),
                url: format!("{}#chunk-{}", base_url, index),
                metadata,
            }
        })
        .collect()
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
