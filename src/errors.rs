// ABOUTME: Error types for the showtell application
// ABOUTME: Provides structured error handling for each stage of the render and serve pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShowError {
    #[error("Failed to read {path:?}: {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata in {path:?}: {source}")]
    MetadataParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No matching slide parser for file type: {0:?}")]
    NoParserForFormat(String),

    #[error("Template error in {path:?}: {message}")]
    TemplateCompositionError { path: PathBuf, message: String },

    #[error("Path not found: {0:?}")]
    PathNotFoundError(PathBuf),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Invalid asset path: {0}")]
    InvalidAssetPath(String),

    #[error("Message bus queue is full, dropped message for topic: {0}")]
    BusQueueFull(String),

    #[error("Message bus is closed")]
    BusClosed,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ShowError {
    /// Wrap an I/O error together with the path that caused it.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ShowError::IoFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShowError>;
