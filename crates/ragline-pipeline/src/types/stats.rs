//! Batch-level aggregate statistics

use serde::{Deserialize, Serialize};

use super::{FileKind, ProcessingResult};

/// Aggregate over a batch of processing results.
///
/// Purely a projection: computed from a result list and never mutated in
/// place. `already_processed` is filled in by the orchestrator from
/// discovery, since those files never produce a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub already_processed: usize,
    pub total_documents: usize,
    pub total_images: usize,
    pub total_chunks: usize,
    pub total_pdf_images: usize,
    pub total_errors: usize,
    pub total_retries: u64,
    pub avg_duration_ms: u64,
    pub avg_document_ms: u64,
    pub avg_image_ms: u64,
    pub avg_file_size_bytes: u64,
}

impl BatchStatistics {
    /// Compute statistics from a list of results
    pub fn aggregate(results: &[ProcessingResult]) -> Self {
        let mut stats = Self {
            total_files: results.len(),
            ..Self::default()
        };
        if results.is_empty() {
            return stats;
        }

        let mut total_ms = 0u64;
        let mut document_ms = (0u64, 0usize);
        let mut image_ms = (0u64, 0usize);
        let mut total_size = 0u64;

        for result in results {
            if result.success() {
                stats.successful_files += 1;
            } else {
                stats.failed_files += 1;
            }
            if result.skipped {
                stats.skipped_files += 1;
            }
            match result.kind {
                FileKind::Document => {
                    stats.total_documents += 1;
                    document_ms.0 += result.timings.total_ms();
                    document_ms.1 += 1;
                }
                FileKind::Image => {
                    stats.total_images += 1;
                    image_ms.0 += result.timings.total_ms();
                    image_ms.1 += 1;
                }
                FileKind::Unsupported => {}
            }
            stats.total_chunks += result.chunk_count;
            stats.total_pdf_images += result.images_extracted();
            stats.total_errors += result.errors.len();
            stats.total_retries += result.retry_count as u64;
            total_ms += result.timings.total_ms();
            total_size += result.size_bytes;
        }

        stats.avg_duration_ms = total_ms / results.len() as u64;
        if document_ms.1 > 0 {
            stats.avg_document_ms = document_ms.0 / document_ms.1 as u64;
        }
        if image_ms.1 > 0 {
            stats.avg_image_ms = image_ms.0 / image_ms.1 as u64;
        }
        stats.avg_file_size_bytes = total_size / results.len() as u64;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn result(kind: FileKind, success: bool, chunks: usize) -> ProcessingResult {
        let mut r = ProcessingResult::new(Path::new("/tmp/f"), kind, 100);
        r.chunk_count = chunks;
        if !success {
            r.errors.push("failed".to_string());
        }
        r
    }

    #[test]
    fn aggregates_counts() {
        let results = vec![
            result(FileKind::Document, true, 5),
            result(FileKind::Document, false, 0),
            result(FileKind::Image, true, 0),
        ];
        let stats = BatchStatistics::aggregate(&results);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.successful_files, 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_images, 1);
        assert_eq!(stats.total_chunks, 5);
    }

    #[test]
    fn empty_batch_is_valid() {
        let stats = BatchStatistics::aggregate(&[]);
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.avg_duration_ms, 0);
    }

    #[test]
    fn averages_file_sizes() {
        let mut a = result(FileKind::Document, true, 1);
        a.size_bytes = 100;
        let mut b = result(FileKind::Document, true, 1);
        b.size_bytes = 300;
        let stats = BatchStatistics::aggregate(&[a, b]);
        assert_eq!(stats.avg_file_size_bytes, 200);
    }
}
