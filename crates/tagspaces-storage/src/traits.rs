//! Storage abstraction trait
//!
//! This module defines the `StorageAdapter` trait that all location
//! backends must implement, and the kind-tagged error type shared by them.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use tagspaces_core::{FileSystemEntry, LocationType};

/// Storage operation errors.
///
/// Each variant is a kind the UI can render distinctly without parsing
/// strings. Adapters never swallow errors; they tag and return them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, StorageError::Aborted(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked byte stream used for progress-driven transfers.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Storage abstraction trait
///
/// One adapter instance serves one configured location. The transfer
/// orchestrator composes these primitives into batch move/copy/delete;
/// adapters only translate them into backend calls.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Enumerate the direct children of a directory.
    ///
    /// Returned paths use this location's separator convention. When
    /// `extensions` is non-empty, files whose extension is not listed are
    /// filtered out; directories always pass. Fails with `NotFound` when
    /// the directory does not exist and `AccessDenied` on permission
    /// failure.
    async fn list_directory(
        &self,
        path: &str,
        extensions: &[String],
    ) -> StorageResult<Vec<FileSystemEntry>>;

    /// Read full text content. The UTF-8 BOM is not stripped here.
    async fn load_text_file(&self, path: &str) -> StorageResult<String>;

    /// Read full binary content.
    async fn get_file_content(&self, path: &str) -> StorageResult<Bytes>;

    /// Open a chunked download stream (for large files and for
    /// progress-counting cross-backend copies).
    async fn get_file_stream(&self, path: &str) -> StorageResult<ByteStream>;

    /// Write full content to `path`.
    ///
    /// Fails with `Conflict` when the destination exists and `overwrite`
    /// is false. Parent directories are created as needed.
    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry>;

    /// Write a chunked stream to `path`.
    ///
    /// If the stream yields an error (including `Aborted` injected by a
    /// cancelled transfer), the adapter removes the partially written
    /// destination: cancellation leaves at most one partial file and the
    /// adapter cleans it up.
    async fn put_file_stream(
        &self,
        path: &str,
        stream: ByteStream,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry>;

    /// Stat a single entry.
    async fn stat(&self, path: &str) -> StorageResult<FileSystemEntry>;

    /// Existence check by name only; no content comparison.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    async fn create_directory(&self, path: &str) -> StorageResult<()>;

    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    /// Delete a directory and everything below it.
    async fn delete_directory(&self, path: &str) -> StorageResult<()>;

    /// Native same-backend copy. Cross-backend copies go through
    /// `get_file_stream` + `put_file_stream` instead.
    async fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> StorageResult<()>;

    /// Whether this backend can hand out direct upload URLs.
    fn supports_presign(&self) -> bool;

    /// Presigned/direct upload URL for `path`. Backends without presign
    /// support return a `Config` error.
    async fn presign_upload_url(&self, path: &str, expires_in: Duration)
        -> StorageResult<String>;

    fn location_type(&self) -> LocationType;
}
