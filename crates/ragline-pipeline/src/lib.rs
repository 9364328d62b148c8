//! ragline-pipeline: batch document processing for RAG ingestion
//!
//! Discovers PDF, DOCX, and image files in a directory, extracts and chunks
//! their text, writes records to a vector-store collaborator, and leaves
//! per-file `.processed` summaries plus a batch CSV rollup behind.
//! Filesystem lock files make concurrent runs over the same directory safe,
//! including runs in separate processes.

pub mod analyzer;
pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod locks;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod store;
pub mod types;

pub use analyzer::{HttpImageAnalyzer, ImageAnalysis, ImageAnalyzer};
pub use chunker::TextChunker;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use locks::LockCoordinator;
pub use pipeline::Pipeline;
pub use processor::FileProcessor;
pub use report::ReportGenerator;
pub use store::{DocumentRecord, ImageRecord, JsonlVectorStore, MemoryVectorStore, VectorStore};
pub use types::{BatchStatistics, FileKind, ProcessingResult, ProcessingTask};
