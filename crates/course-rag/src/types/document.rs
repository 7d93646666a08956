//! Course material and passage types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classification::CategoryId;

/// Supported course material formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Txt => "Text File",
        }
    }
}

/// Text extracted from one uploaded file; lives for one pipeline run
#[derive(Debug, Clone)]
pub struct CourseMaterial {
    pub tenant_id: String,
    pub source_path: PathBuf,
    pub format: FileType,
    pub raw_text: String,
}

impl CourseMaterial {
    /// Extracted length in characters
    pub fn char_len(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// Unit of embedding, classification and retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    /// Assigned by the classifier
    pub category: Option<CategoryId>,
    /// Empty until embedded
    pub embedding: Vec<f32>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
            embedding: Vec::new(),
        }
    }

    /// Finalize with the classifier's decision
    pub fn categorized(self, category: CategoryId, embedding: Vec<f32>) -> Self {
        Self {
            text: self.text,
            category: Some(category),
            embedding,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
