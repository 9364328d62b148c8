//! Configuration for the processing pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Vector store collection names
    #[serde(default)]
    pub collections: CollectionConfig,
    /// Image analysis service configuration
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, as a ratio of chunk size
    pub overlap_ratio: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap_ratio: 0.1,
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of parallel file workers (batch size)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries after the first attempt for a failing file
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between retry attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Age in seconds after which leftover markers are purged at startup
    #[serde(default = "default_marker_ttl_secs")]
    pub marker_ttl_secs: u64,
}

fn default_batch_size() -> usize {
    num_cpus::get().min(8)
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_marker_ttl_secs() -> u64 {
    60
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            marker_ttl_secs: default_marker_ttl_secs(),
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Smallest embedded PDF image worth analyzing, in bytes
    #[serde(default = "default_min_image_bytes")]
    pub min_image_bytes: usize,
    /// Largest embedded PDF image worth analyzing, in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_min_image_bytes() -> usize {
    4 * 1024
}
fn default_max_image_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_image_bytes: default_min_image_bytes(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Vector store collection names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection for text records
    pub text_collection: String,
    /// Collection for image records
    pub image_collection: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            text_collection: "documents".to_string(),
            image_collection: "images".to_string(),
        }
    }
}

/// Image analysis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the image analysis service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout_secs: 120,
        }
    }
}
