//! Error types for the knowledge pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Knowledge pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input path does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input path is a directory where a file was expected
    #[error("Expected a file but found a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    /// Extension is not one of pdf, docx, txt
    #[error("Unsupported file format '{extension}': {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// File decoded but contained no text
    #[error("No text could be extracted from {}", .0.display())]
    EmptyExtraction(PathBuf),

    /// File could not be decoded
    #[error("Failed to extract text from {}: {message}", .path.display())]
    Extraction { path: PathBuf, message: String },

    /// Ingestion produced no usable documents
    #[error("No course materials could be loaded: {0}")]
    NoMaterials(String),

    /// Tenant id cannot be mapped to storage
    #[error("Invalid tenant id: {0:?}")]
    InvalidTenant(String),

    /// Category name is not part of the taxonomy
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Persisted index exists but cannot be read
    #[error("Corrupt index at {}: {message}", .path.display())]
    CorruptIndex { path: PathBuf, message: String },

    /// Index was built with another embedding model
    #[error("Embedding model mismatch: index uses '{expected}', provider is '{found}'")]
    EmbeddingModelMismatch { expected: String, found: String },

    /// Vector length differs from the index dimensions
    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Embedding call failed
    #[error("Embedding failed ({context}): {message}")]
    Embedding { context: String, message: String },

    /// Operation was cancelled or timed out
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad path, format, tenant or category; not retried
    Input,
    /// Persisted index unreadable or incompatible
    IndexCorrupt,
    /// Embedding model call failed; caller may retry
    Embedding,
    /// Nothing usable to ingest
    NoMaterials,
    /// Cancelled or timed out
    Cancelled,
    /// Invalid configuration
    Config,
    /// Everything else
    Internal,
}

impl Error {
    /// Create an embedding error without call-site context
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            context: "embedding request".to_string(),
            message: message.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt index error
    pub fn corrupt_index(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach the passage or query that triggered an embedding failure
    pub fn with_embedding_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Embedding { message, .. } => Self::Embedding {
                context: context.into(),
                message,
            },
            Self::Http(err) => Self::Embedding {
                context: context.into(),
                message: err.to_string(),
            },
            other => other,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_)
            | Self::IsADirectory(_)
            | Self::UnsupportedFormat { .. }
            | Self::EmptyExtraction(_)
            | Self::Extraction { .. }
            | Self::InvalidTenant(_)
            | Self::UnknownCategory(_) => ErrorKind::Input,
            Self::CorruptIndex { .. }
            | Self::EmbeddingModelMismatch { .. }
            | Self::DimensionMismatch { .. } => ErrorKind::IndexCorrupt,
            Self::Embedding { .. } | Self::Http(_) => ErrorKind::Embedding,
            Self::NoMaterials(_) => ErrorKind::NoMaterials,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Input errors are surfaced immediately and never retried
    pub fn is_input_error(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Task join error: {}", err))
    }
}
