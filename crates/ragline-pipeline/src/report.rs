//! Per-file and batch reporting
//!
//! The `.processed` file written here serves two purposes: it is the
//! idempotency marker the lock coordinator checks, and a human-auditable
//! record of what happened to the file. One file, both jobs.

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::locks::processed_path;
use crate::types::{BatchStatistics, ProcessingResult};

/// Writes per-file summaries, the CSV rollup, and console statistics
pub struct ReportGenerator;

impl ReportGenerator {
    /// Write the human-readable summary / idempotency marker for one file
    pub fn create_processed_file(result: &ProcessingResult) -> Result<()> {
        let marker = processed_path(&result.path);
        let mut file = std::fs::File::create(&marker)?;
        write!(file, "{}", render_summary(result))?;
        tracing::debug!("Wrote {:?}", marker);
        Ok(())
    }

    /// Write the batch CSV rollup, overwriting any previous run's file
    pub fn create_csv_report(results: &[ProcessingResult], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "file",
            "type",
            "size_bytes",
            "success",
            "skipped",
            "chunks",
            "pages",
            "images_extracted",
            "images_analyzed",
            "has_ocr",
            "has_classification",
            "extraction_ms",
            "chunking_ms",
            "image_analysis_ms",
            "storage_ms",
            "total_ms",
            "retries",
            "errors",
        ])?;

        for result in results {
            let has_ocr = result.image_outcomes.iter().any(|o| o.has_ocr);
            let has_classification = result.image_outcomes.iter().any(|o| o.has_classification);
            writer.write_record([
                result.file_name.clone(),
                result.kind.to_string(),
                result.size_bytes.to_string(),
                result.success().to_string(),
                result.skipped.to_string(),
                result.chunk_count.to_string(),
                result.page_count.to_string(),
                result.images_extracted().to_string(),
                result.images_analyzed().to_string(),
                has_ocr.to_string(),
                has_classification.to_string(),
                result.timings.extraction_ms.to_string(),
                result.timings.chunking_ms.to_string(),
                result.timings.image_analysis_ms.to_string(),
                result.timings.storage_ms.to_string(),
                result.timings.total_ms().to_string(),
                result.retry_count.to_string(),
                result.errors.join("; "),
            ])?;
        }

        writer.flush()?;
        tracing::info!("Wrote CSV report with {} rows to {:?}", results.len(), path);
        Ok(())
    }

    /// Pure projection of a result list into batch statistics
    pub fn aggregate_results(results: &[ProcessingResult]) -> BatchStatistics {
        BatchStatistics::aggregate(results)
    }

    /// Print batch statistics to the console; verbose adds per-file lines
    pub fn print_summary(results: &[ProcessingResult], stats: &BatchStatistics, verbose: bool) {
        println!();
        println!("Processing complete");
        println!("  Files processed:    {}", stats.total_files);
        println!("  Successful:         {}", stats.successful_files);
        println!("  Failed:             {}", stats.failed_files);
        println!("  Skipped:            {}", stats.skipped_files);
        println!("  Already processed:  {}", stats.already_processed);
        println!("  Documents / images: {} / {}", stats.total_documents, stats.total_images);
        println!("  Chunks stored:      {}", stats.total_chunks);
        println!("  Images from PDFs:   {}", stats.total_pdf_images);
        println!("  Errors:             {}", stats.total_errors);
        println!("  Retries:            {}", stats.total_retries);
        println!(
            "  Avg time (all/doc/img): {} / {} / {} ms",
            stats.avg_duration_ms, stats.avg_document_ms, stats.avg_image_ms
        );
        println!("  Avg file size:      {} bytes", stats.avg_file_size_bytes);

        if verbose {
            println!();
            for result in results {
                let status = if result.success() {
                    "ok"
                } else if result.skipped {
                    "skipped"
                } else {
                    "failed"
                };
                println!(
                    "  [{}] {} ({}, {} chunks, {} ms, {} attempts){}",
                    status,
                    result.file_name,
                    result.kind,
                    result.chunk_count,
                    result.timings.total_ms(),
                    result.retry_count,
                    if result.errors.is_empty() {
                        String::new()
                    } else {
                        format!(" - {}", result.errors.join("; "))
                    }
                );
            }
        }
    }
}

fn render_summary(result: &ProcessingResult) -> String {
    let mut out = String::new();
    let push = |out: &mut String, line: String| {
        out.push_str(&line);
        out.push('\n');
    };

    push(&mut out, format!("Processing summary for {}", result.file_name));
    push(&mut out, format!("Generated at {}", chrono::Utc::now().to_rfc3339()));
    push(&mut out, String::new());

    push(&mut out, "== File ==".to_string());
    push(&mut out, format!("Path: {}", result.path.display()));
    push(&mut out, format!("Type: {}", result.kind));
    push(&mut out, format!("Size: {} bytes", result.size_bytes));
    push(&mut out, String::new());

    push(&mut out, "== Results ==".to_string());
    push(
        &mut out,
        format!("Status: {}", if result.success() { "success" } else { "failure" }),
    );
    push(&mut out, format!("Attempts: {}", result.retry_count));
    push(&mut out, format!("Chunks stored: {}", result.chunk_count));
    push(&mut out, format!("Pages: {}", result.page_count));
    push(
        &mut out,
        format!(
            "Images: {} analyzed, {} failed, {} harvested from document",
            result.images_analyzed(),
            result.image_outcomes.len() - result.images_analyzed(),
            result.images_extracted()
        ),
    );
    push(&mut out, String::new());

    push(&mut out, "== Timing (ms) ==".to_string());
    push(&mut out, format!("Extraction: {}", result.timings.extraction_ms));
    push(&mut out, format!("Chunking: {}", result.timings.chunking_ms));
    push(&mut out, format!("Image analysis: {}", result.timings.image_analysis_ms));
    push(&mut out, format!("Storage: {}", result.timings.storage_ms));
    push(&mut out, format!("Total: {}", result.timings.total_ms()));
    push(&mut out, String::new());

    push(&mut out, "== Errors ==".to_string());
    if result.errors.is_empty() {
        push(&mut out, "(none)".to_string());
    } else {
        for error in &result.errors {
            push(&mut out, format!("- {}", error));
        }
    }

    if !result.notes.is_empty() {
        push(&mut out, String::new());
        push(&mut out, "== Notes ==".to_string());
        for note in &result.notes {
            push(&mut out, format!("- {}", note));
        }
    }

    if !result.document_info.is_empty() {
        push(&mut out, String::new());
        push(&mut out, "== Document metadata ==".to_string());
        let info = &result.document_info;
        if let Some(title) = &info.title {
            push(&mut out, format!("Title: {}", title));
        }
        if let Some(author) = &info.author {
            push(&mut out, format!("Author: {}", author));
        }
        if let Some(subject) = &info.subject {
            push(&mut out, format!("Subject: {}", subject));
        }
        if let Some(created) = &info.created {
            push(&mut out, format!("Created: {}", created));
        }
        if let Some(modified) = &info.modified {
            push(&mut out, format!("Modified: {}", modified));
        }
        if let Some(count) = info.paragraph_count {
            push(&mut out, format!("Paragraphs: {}", count));
        }
        if let Some(count) = info.table_count {
            push(&mut out, format!("Tables: {}", count));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileKind;

    fn sample_result(dir: &Path, name: &str, success: bool) -> ProcessingResult {
        let path = dir.join(name);
        std::fs::write(&path, b"content").unwrap();
        let mut result = ProcessingResult::new(&path, FileKind::Document, 7);
        result.chunk_count = 3;
        result.page_count = 2;
        result.retry_count = 1;
        if !success {
            result.errors.push("extraction blew up".to_string());
        }
        result
    }

    #[test]
    fn processed_file_is_written_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result(dir.path(), "a.pdf", true);

        ReportGenerator::create_processed_file(&result).unwrap();

        let marker = dir.path().join("a.pdf.processed");
        assert!(marker.exists());
        let body = std::fs::read_to_string(marker).unwrap();
        assert!(body.contains("== File =="));
        assert!(body.contains("Status: success"));
        assert!(body.contains("Chunks stored: 3"));
    }

    #[test]
    fn failed_result_lists_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result(dir.path(), "b.pdf", false);
        let body = render_summary(&result);
        assert!(body.contains("Status: failure"));
        assert!(body.contains("- extraction blew up"));
    }

    #[test]
    fn csv_has_one_row_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            sample_result(dir.path(), "a.pdf", true),
            sample_result(dir.path(), "b.pdf", false),
        ];
        let csv_path = dir.path().join("processing_results.csv");

        ReportGenerator::create_csv_report(&results, &csv_path).unwrap();

        let body = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file,type,size_bytes"));
        assert!(lines[2].contains("extraction blew up"));
    }

    #[test]
    fn aggregate_matches_batch_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![sample_result(dir.path(), "a.pdf", true)];
        let stats = ReportGenerator::aggregate_results(&results);
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.successful_files, 1);
        assert_eq!(stats.total_chunks, 3);
    }
}
