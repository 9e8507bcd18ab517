use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
#[allow(unused_imports)]
use object_store::{
    ObjectMeta, ObjectStore, ObjectStoreExt, PutMode, PutPayload, Result as ObjectResult,
};

use crate::traits::{ByteStream, StorageAdapter, StorageError, StorageResult};
use tagspaces_core::{paths, FileSystemEntry, LocationType};

/// S3-compatible object store adapter.
///
/// Paths are bucket-relative keys, forward-slash separated, never starting
/// with `/`. Directories are implicit key prefixes; listing reports them
/// through the delimiter API.
#[derive(Clone)]
pub struct ObjectStoreAdapter {
    store: AmazonS3,
    bucket: String,
}

impl ObjectStoreAdapter {
    /// Create a new adapter for one bucket.
    ///
    /// Credentials come from the environment (the usual AWS variables);
    /// `endpoint_url` selects S3-compatible providers such as MinIO.
    pub fn new(
        bucket: String,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket.clone());

        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(ObjectStoreAdapter { store, bucket })
    }

    fn key(path: &str) -> ObjectPath {
        ObjectPath::from(path.trim_start_matches('/'))
    }

    fn map_store_error(key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            ObjectStoreError::AlreadyExists { .. } => StorageError::Conflict(key.to_string()),
            other => StorageError::Backend(other.to_string()),
        }
    }

    fn file_entry(meta: &ObjectMeta) -> FileSystemEntry {
        let key = meta.location.as_ref().to_string();
        FileSystemEntry {
            uuid: None,
            name: meta.location.filename().unwrap_or_default().to_string(),
            path: key,
            is_file: true,
            size: meta.size as u64,
            lmdt: Some(meta.last_modified.timestamp_millis()),
            tags: Vec::new(),
        }
    }

    fn dir_entry(prefix: &ObjectPath) -> FileSystemEntry {
        FileSystemEntry {
            uuid: None,
            name: prefix.filename().unwrap_or_default().to_string(),
            path: prefix.as_ref().to_string(),
            is_file: false,
            size: 0,
            lmdt: None,
            tags: Vec::new(),
        }
    }
}

#[async_trait]
impl StorageAdapter for ObjectStoreAdapter {
    async fn list_directory(
        &self,
        path: &str,
        extensions: &[String],
    ) -> StorageResult<Vec<FileSystemEntry>> {
        let trimmed = path.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            None
        } else {
            Some(Self::key(trimmed))
        };

        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| Self::map_store_error(path, e))?;

        // A non-root prefix with no children and no object of its own does
        // not exist in the bucket.
        if prefix.is_some() && listing.objects.is_empty() && listing.common_prefixes.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let wanted: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
        let mut entries: Vec<FileSystemEntry> = listing
            .common_prefixes
            .iter()
            .map(Self::dir_entry)
            .collect();

        for meta in &listing.objects {
            let entry = Self::file_entry(meta);
            if !wanted.is_empty() {
                let ext = paths::extract_file_extension(&entry.name, '/');
                if !wanted.contains(&ext) {
                    continue;
                }
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    async fn load_text_file(&self, path: &str) -> StorageResult<String> {
        let content = self.get_file_content(path).await?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    async fn get_file_content(&self, path: &str) -> StorageResult<Bytes> {
        let location = Self::key(path);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| Self::map_store_error(path, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| Self::map_store_error(path, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store download successful"
        );

        Ok(bytes)
    }

    async fn get_file_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let location = Self::key(path);
        let key = path.to_string();

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| Self::map_store_error(path, e))?;

        let stream = result
            .into_stream()
            .map(move |chunk| chunk.map_err(|e| Self::map_store_error(&key, e)));
        Ok(Box::pin(stream))
    }

    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        let location = Self::key(path);
        let size = content.len() as u64;
        let start = std::time::Instant::now();

        let payload = PutPayload::from(content);
        let result: ObjectResult<_> = if overwrite {
            self.store.put(&location, payload).await
        } else {
            // Conditional put: the bucket rejects the write when the key
            // already exists, closing the check-then-write window that
            // name-based conflict detection leaves open.
            self.store
                .put_opts(&location, payload, PutMode::Create.into())
                .await
        };

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %location,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store upload failed"
            );
            Self::map_store_error(path, e)
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store upload successful"
        );

        self.stat(path).await
    }

    async fn put_file_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        // Buffer the stream and upload in a single put. Less optimal for
        // very large files, but multipart bookkeeping is not worth it here;
        // a failed or cancelled stream leaves no partial object behind.
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
        }
        self.put_file(path, Bytes::from(buffer), overwrite).await
    }

    async fn stat(&self, path: &str) -> StorageResult<FileSystemEntry> {
        let location = Self::key(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Self::file_entry(&meta)),
            Err(ObjectStoreError::NotFound { .. }) => {
                // No object at the key; it may still be a directory prefix.
                let listing = self
                    .store
                    .list_with_delimiter(Some(&location))
                    .await
                    .map_err(|e| Self::map_store_error(path, e))?;
                if listing.objects.is_empty() && listing.common_prefixes.is_empty() {
                    Err(StorageError::NotFound(path.to_string()))
                } else {
                    Ok(Self::dir_entry(&location))
                }
            }
            Err(e) => Err(Self::map_store_error(path, e)),
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_directory(&self, _path: &str) -> StorageResult<()> {
        // Directories are implicit key prefixes; they come into existence
        // with the first object written below them.
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let location = Self::key(path);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;
        result.map_err(|e| Self::map_store_error(path, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store delete successful"
        );
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> StorageResult<()> {
        let prefix = Self::key(path);
        let mut listing = self.store.list(Some(&prefix));
        let mut deleted: u64 = 0;

        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| Self::map_store_error(path, e))?;
            self.store
                .delete(&meta.location)
                .await
                .map_err(|e| Self::map_store_error(meta.location.as_ref(), e))?;
            deleted += 1;
        }

        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            objects = deleted,
            "Object store directory delete successful"
        );
        Ok(())
    }

    async fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> StorageResult<()> {
        let from_key = Self::key(from);
        let to_key = Self::key(to);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = if overwrite {
            self.store.copy(&from_key, &to_key).await
        } else {
            self.store.copy_if_not_exists(&from_key, &to_key).await
        };
        result.map_err(|e| Self::map_store_error(from, e))?;

        tracing::info!(
            bucket = %self.bucket,
            from_key = %from_key,
            to_key = %to_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store copy successful"
        );
        Ok(())
    }

    fn supports_presign(&self) -> bool {
        true
    }

    async fn presign_upload_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = Self::key(path);
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::PUT, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| Self::map_store_error(path, e))?
            .to_string();
        Ok(url)
    }

    fn location_type(&self) -> LocationType {
        LocationType::ObjectStore
    }
}
