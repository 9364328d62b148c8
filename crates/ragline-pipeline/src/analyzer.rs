//! Image analysis collaborator
//!
//! The pipeline never inspects pixel data itself. Analysis (EXIF,
//! classification, OCR) is delegated to an external service behind the
//! [`ImageAnalyzer`] trait; the shipped implementation posts the file to a
//! configured HTTP endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};

/// One classification label with its confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationLabel {
    pub label: String,
    pub confidence: f32,
}

/// Classification output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub classifications: Vec<ClassificationLabel>,
    #[serde(default)]
    pub top_prediction: Option<String>,
}

/// OCR output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrContent {
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub ocr_processing: bool,
}

/// Full analysis of one image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub exif: HashMap<String, String>,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub ocr_content: OcrContent,
}

impl ImageAnalysis {
    pub fn has_exif(&self) -> bool {
        !self.exif.is_empty()
    }

    pub fn has_classification(&self) -> bool {
        !self.classification.classifications.is_empty()
            || self.classification.top_prediction.is_some()
    }

    pub fn has_ocr(&self) -> bool {
        !self.ocr_content.extracted_text.trim().is_empty()
    }
}

/// Trait for the external image analysis collaborator
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyze one image file
    async fn process_image(&self, path: &Path) -> Result<ImageAnalysis>;

    /// Analyzer name for logging
    fn name(&self) -> &str;
}

/// Analyzer backed by an HTTP service
pub struct HttpImageAnalyzer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    async fn process_image(&self, path: &Path) -> Result<ImageAnalysis> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let data = tokio::fs::read(path).await?;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(data).file_name(filename.clone()),
        );

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::image_analysis(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::image_analysis(format!(
                "analyzer returned {}: {}",
                status, body
            )));
        }

        let analysis: ImageAnalysis = response
            .json()
            .await
            .map_err(|e| Error::image_analysis(format!("invalid analyzer response: {}", e)))?;

        tracing::debug!(
            "[{}] analyzed: exif={}, classification={}, ocr={}",
            filename,
            analysis.has_exif(),
            analysis.has_classification(),
            analysis.has_ocr()
        );
        Ok(analysis)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_flags() {
        let mut analysis = ImageAnalysis::default();
        assert!(!analysis.has_exif());
        assert!(!analysis.has_classification());
        assert!(!analysis.has_ocr());

        analysis.exif.insert("Make".to_string(), "TestCam".to_string());
        analysis.classification.top_prediction = Some("diagram".to_string());
        analysis.ocr_content.extracted_text = "visible text".to_string();
        assert!(analysis.has_exif());
        assert!(analysis.has_classification());
        assert!(analysis.has_ocr());
    }

    #[test]
    fn analysis_deserializes_with_missing_fields() {
        let analysis: ImageAnalysis = serde_json::from_str(
            r#"{"classification": {"top_prediction": "chart"}}"#,
        )
        .unwrap();
        assert_eq!(
            analysis.classification.top_prediction.as_deref(),
            Some("chart")
        );
        assert!(!analysis.has_ocr());
    }
}
