//! Input file classification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Image extensions routed to the image analysis collaborator
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "heic", "heif", "tiff", "tif",
];

/// Kind of input file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Text-bearing document (.pdf, .docx)
    Document,
    /// Raster image
    Image,
    /// Anything else; never processed
    Unsupported,
}

impl FileKind {
    /// Detect the kind from a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "pdf" | "docx" => Self::Document,
            _ if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Unsupported,
        }
    }

    /// Detect the kind from a path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One input file under consideration
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    /// Absolute path of the input file
    pub path: PathBuf,
    /// Detected kind
    pub kind: FileKind,
    /// Size in bytes
    pub size_bytes: u64,
}

impl ProcessingTask {
    pub fn new(path: PathBuf, size_bytes: u64) -> Self {
        let kind = FileKind::from_path(&path);
        Self {
            path,
            kind,
            size_bytes,
        }
    }

    /// File name component, lossily decoded
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}
