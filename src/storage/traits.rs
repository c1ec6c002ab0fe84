//! Storage traits and error types
//!
//! This module defines the persistence interface the mirror writes through and
//! its error type.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Implementations must be shareable between crawl workers. Parent directories
/// are created on write.
pub trait Storage: Send + Sync {
    /// Writes bytes to a file, creating parent directories and replacing any
    /// existing content
    fn write_file(&self, path: &Path, bytes: &[u8]) -> StorageResult<()>;

    /// Returns true if a file exists at the path
    fn file_exists(&self, path: &Path) -> bool;

    /// Reads the full content of a file
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Reads a file as UTF-8 text, replacing invalid sequences
    fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        let bytes = self.read_file(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
