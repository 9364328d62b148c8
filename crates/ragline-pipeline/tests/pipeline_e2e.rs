//! End-to-end pipeline tests over a real temporary directory

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ragline_pipeline::analyzer::{Classification, ImageAnalysis, ImageAnalyzer, OcrContent};
use ragline_pipeline::{
    Error, MemoryVectorStore, Pipeline, PipelineConfig, Result, VectorStore,
};

/// Build a small real PDF with one text page per entry
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

struct StubAnalyzer;

#[async_trait]
impl ImageAnalyzer for StubAnalyzer {
    async fn process_image(&self, _path: &Path) -> Result<ImageAnalysis> {
        Ok(ImageAnalysis {
            exif: HashMap::from([("Make".to_string(), "TestCam".to_string())]),
            classification: Classification {
                classifications: vec![],
                top_prediction: Some("photo".to_string()),
            },
            ocr_content: OcrContent {
                extracted_text: "sign text".to_string(),
                ocr_processing: true,
            },
        })
    }
    fn name(&self) -> &str {
        "stub"
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl ImageAnalyzer for BrokenAnalyzer {
    async fn process_image(&self, _path: &Path) -> Result<ImageAnalysis> {
        Err(Error::image_analysis("service unreachable"))
    }
    fn name(&self) -> &str {
        "broken"
    }
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.processing.batch_size = 2;
    config.processing.max_retries = 1;
    config.processing.retry_delay_ms = 1;
    config
}

async fn pipeline_for(
    dir: &Path,
    store: Arc<dyn VectorStore>,
    analyzer: Arc<dyn ImageAnalyzer>,
) -> Pipeline {
    Pipeline::new(dir, test_config(), store, analyzer)
        .await
        .unwrap()
}

#[tokio::test]
async fn batch_processes_pdf_and_image_then_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("handbook.pdf");
    std::fs::write(
        &pdf_path,
        build_pdf(&[
            "Page one is about onboarding.",
            "Page two covers benefits.",
            "Page three lists contacts.",
        ]),
    )
    .unwrap();
    let jpg_path = dir.path().join("badge.jpg");
    std::fs::write(&jpg_path, b"not real jpeg bytes, analyzer is stubbed").unwrap();

    let store = Arc::new(MemoryVectorStore::new());
    let pipeline = pipeline_for(dir.path(), store.clone(), Arc::new(StubAnalyzer)).await;
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.successful_files, 2);
    assert_eq!(stats.failed_files, 0);
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.total_images, 1);
    assert!(stats.total_chunks >= 1);

    // Markers and CSV exist next to the inputs
    assert!(dir.path().join("handbook.pdf.processed").exists());
    assert!(dir.path().join("badge.jpg.processed").exists());
    let csv = std::fs::read_to_string(dir.path().join("processing_results.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);

    // No lock files remain
    assert!(!dir.path().join("handbook.pdf.lock").exists());
    assert!(!dir.path().join("badge.jpg.lock").exists());

    // Records reached the collaborator
    assert!(store.count_documents("documents").await.unwrap() >= 1);
    assert_eq!(store.count_documents("images").await.unwrap(), 1);

    // A second run sees the markers and processes nothing
    let pipeline = pipeline_for(
        dir.path(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(StubAnalyzer),
    )
    .await;
    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.already_processed, 2);
}

#[tokio::test]
async fn held_lock_skips_one_file_not_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("doc.pdf");
    std::fs::write(&pdf_path, build_pdf(&["Locked file body."])).unwrap();
    let jpg_path = dir.path().join("pic.png");
    std::fs::write(&jpg_path, b"bytes").unwrap();

    // Another process holds the PDF
    std::fs::write(dir.path().join("doc.pdf.lock"), b"held elsewhere").unwrap();

    let pipeline = pipeline_for(
        dir.path(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(StubAnalyzer),
    )
    .await;
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.skipped_files, 1);
    assert_eq!(stats.successful_files, 1);

    // The foreign lock is not ours to remove
    assert!(dir.path().join("doc.pdf.lock").exists());
    assert!(!dir.path().join("doc.pdf.processed").exists());
    assert!(dir.path().join("pic.png.processed").exists());
}

#[tokio::test]
async fn failing_analyzer_exhausts_retries_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let jpg_path = dir.path().join("broken.jpg");
    std::fs::write(&jpg_path, b"bytes").unwrap();
    let pdf_path = dir.path().join("fine.pdf");
    std::fs::write(&pdf_path, build_pdf(&["Still processed fine."])).unwrap();

    let pipeline = pipeline_for(
        dir.path(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(BrokenAnalyzer),
    )
    .await;
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.successful_files, 1);
    assert_eq!(stats.failed_files, 1);
    // max_retries = 1 means two attempts for the failing image
    assert_eq!(stats.total_retries, 2 + 1);

    // Failure is recorded in the CSV but leaves no marker
    assert!(!dir.path().join("broken.jpg.processed").exists());
    let csv = std::fs::read_to_string(dir.path().join("processing_results.csv")).unwrap();
    assert!(csv.contains("service unreachable"));
}

#[tokio::test]
async fn empty_directory_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(
        dir.path(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(StubAnalyzer),
    )
    .await;
    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.already_processed, 0);
    assert!(!dir.path().join("processing_results.csv").exists());
}

#[tokio::test]
async fn missing_directory_fails_fast() {
    let result = Pipeline::new(
        "/definitely/not/a/real/dir",
        test_config(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(StubAnalyzer),
    )
    .await;
    assert!(matches!(result, Err(Error::InputDirNotFound(_))));
}

#[tokio::test]
async fn unsupported_files_are_not_discovered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
    std::fs::write(dir.path().join("data.csv"), b"a,b").unwrap();
    std::fs::write(dir.path().join("scan.pdf"), build_pdf(&["A page."])).unwrap();

    let pipeline = pipeline_for(
        dir.path(),
        Arc::new(MemoryVectorStore::new()),
        Arc::new(StubAnalyzer),
    )
    .await;
    let (tasks, already) = pipeline.discover_files().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(already, 0);
    assert_eq!(tasks[0].file_name(), "scan.pdf");
}
