use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{ByteStream, StorageAdapter, StorageError, StorageResult};
use tagspaces_core::{paths, FileSystemEntry, LocationType};

/// Local filesystem adapter.
///
/// Operates on absolute OS-native paths. No presign support: local copies
/// are blocking filesystem calls, cancellation closes the stream mid-write
/// and the partial destination file is removed.
#[derive(Clone, Default)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub fn new() -> Self {
        LocalAdapter
    }

    fn map_io_error(path: &Path, err: std::io::Error) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StorageError::AccessDenied(path.display().to_string())
            }
            _ => StorageError::Io(err),
        }
    }

    fn lmdt_millis(modified: std::io::Result<SystemTime>) -> Option<i64> {
        modified
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
    }

    async fn entry_from_metadata(path: &Path) -> StorageResult<FileSystemEntry> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(FileSystemEntry {
            uuid: None,
            name,
            path: path.to_string_lossy().to_string(),
            is_file: meta.is_file(),
            size: if meta.is_file() { meta.len() } else { 0 },
            lmdt: Self::lmdt_millis(meta.modified()),
            tags: Vec::new(),
        })
    }

    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::map_io_error(parent, e))?;
        }
        Ok(())
    }

    async fn check_overwrite(&self, path: &Path, overwrite: bool) -> StorageResult<()> {
        if !overwrite && fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::Conflict(path.display().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    async fn list_directory(
        &self,
        path: &str,
        extensions: &[String],
    ) -> StorageResult<Vec<FileSystemEntry>> {
        let dir = PathBuf::from(path);
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| Self::map_io_error(&dir, e))?;

        let wanted: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
        let mut entries = Vec::new();

        while let Some(child) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(&dir, e))?
        {
            let child_path = child.path();
            let entry = Self::entry_from_metadata(&child_path).await?;
            if entry.is_file && !wanted.is_empty() {
                let ext = paths::extract_file_extension(&entry.name, MAIN_SEPARATOR);
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
        let p = PathBuf::from(path);
        let data = fs::read(&p).await.map_err(|e| Self::map_io_error(&p, e))?;
        Ok(Bytes::from(data))
    }

    async fn get_file_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let p = PathBuf::from(path);
        let file = fs::File::open(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        let stream = tokio_util::io::ReaderStream::new(file)
            .map(|chunk| chunk.map_err(StorageError::Io));
        Ok(Box::pin(stream))
    }

    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        let p = PathBuf::from(path);
        self.check_overwrite(&p, overwrite).await?;
        Self::ensure_parent_dir(&p).await?;

        let start = std::time::Instant::now();
        let size = content.len();

        let mut file = fs::File::create(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        file.write_all(&content)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        file.sync_all()
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;

        tracing::info!(
            path = %p.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local write successful"
        );

        Self::entry_from_metadata(&p).await
    }

    async fn put_file_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        let p = PathBuf::from(path);
        self.check_overwrite(&p, overwrite).await?;
        Self::ensure_parent_dir(&p).await?;

        let start = std::time::Instant::now();
        let mut file = fs::File::create(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    // Stream failed or was cancelled mid-transfer: drop the
                    // partially written destination so no dangling file remains.
                    drop(file);
                    let _ = fs::remove_file(&p).await;
                    return Err(err);
                }
            };
            if let Err(err) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(&p).await;
                return Err(Self::map_io_error(&p, err));
            }
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;

        tracing::info!(
            path = %p.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local stream write successful"
        );

        Self::entry_from_metadata(&p).await
    }

    async fn stat(&self, path: &str) -> StorageResult<FileSystemEntry> {
        Self::entry_from_metadata(Path::new(path)).await
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(Path::new(path)).await.unwrap_or(false))
    }

    async fn create_directory(&self, path: &str) -> StorageResult<()> {
        let p = PathBuf::from(path);
        fs::create_dir_all(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let p = PathBuf::from(path);
        fs::remove_file(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        tracing::info!(path = %p.display(), "Local delete successful");
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> StorageResult<()> {
        let p = PathBuf::from(path);
        fs::remove_dir_all(&p)
            .await
            .map_err(|e| Self::map_io_error(&p, e))?;
        tracing::info!(path = %p.display(), "Local directory delete successful");
        Ok(())
    }

    async fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> StorageResult<()> {
        let from_p = PathBuf::from(from);
        let to_p = PathBuf::from(to);

        if !fs::try_exists(&from_p).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from.to_string()));
        }
        self.check_overwrite(&to_p, overwrite).await?;
        Self::ensure_parent_dir(&to_p).await?;

        let start = std::time::Instant::now();
        let bytes = fs::copy(&from_p, &to_p)
            .await
            .map_err(|e| Self::map_io_error(&to_p, e))?;

        tracing::info!(
            from = %from_p.display(),
            to = %to_p.display(),
            size_bytes = bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local copy successful"
        );
        Ok(())
    }

    fn supports_presign(&self) -> bool {
        false
    }

    async fn presign_upload_url(
        &self,
        _path: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::Config(
            "presigned uploads are not supported by local locations".to_string(),
        ))
    }

    fn location_type(&self) -> LocationType {
        LocationType::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::tempdir;

    fn path_str(p: &Path) -> String {
        p.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn write_read_round_trip() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let file = dir.path().join("note.txt");

        adapter
            .put_file(&path_str(&file), Bytes::from_static(b"hello"), false)
            .await
            .unwrap();

        let content = adapter.get_file_content(&path_str(&file)).await.unwrap();
        assert_eq!(&content[..], b"hello");

        let text = adapter.load_text_file(&path_str(&file)).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn put_without_overwrite_conflicts() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let file = dir.path().join("existing.txt");

        adapter
            .put_file(&path_str(&file), Bytes::from_static(b"v1"), false)
            .await
            .unwrap();

        let result = adapter
            .put_file(&path_str(&file), Bytes::from_static(b"v2"), false)
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        adapter
            .put_file(&path_str(&file), Bytes::from_static(b"v2"), true)
            .await
            .unwrap();
        let content = adapter.get_file_content(&path_str(&file)).await.unwrap();
        assert_eq!(&content[..], b"v2");
    }

    #[tokio::test]
    async fn list_directory_with_extension_filter() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();

        for name in ["a.txt", "b.md", "c.txt"] {
            adapter
                .put_file(
                    &path_str(&dir.path().join(name)),
                    Bytes::from_static(b"x"),
                    false,
                )
                .await
                .unwrap();
        }
        adapter
            .create_directory(&path_str(&dir.path().join("sub")))
            .await
            .unwrap();

        let all = adapter
            .list_directory(&path_str(dir.path()), &[])
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        let txt_only = adapter
            .list_directory(&path_str(dir.path()), &["txt".to_string()])
            .await
            .unwrap();
        let mut names: Vec<&str> = txt_only.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        // directories always pass the filter
        assert_eq!(names, vec!["a.txt", "c.txt", "sub"]);
    }

    #[tokio::test]
    async fn list_missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let missing = path_str(&dir.path().join("nope"));
        let result = adapter.list_directory(&missing, &[]).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let target = path_str(&dir.path().join("partial.bin"));

        let chunks: Vec<StorageResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"first")),
            Err(StorageError::Aborted("user cancelled".to_string())),
        ];
        let stream: ByteStream = Box::pin(stream::iter(chunks));

        let result = adapter.put_file_stream(&target, stream, false).await;
        assert!(matches!(result, Err(StorageError::Aborted(_))));
        assert!(!adapter.exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn copy_preserves_content() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let src = path_str(&dir.path().join("src.bin"));
        let dst = path_str(&dir.path().join("dst.bin"));

        let payload: Vec<u8> = (0..1024u32).flat_map(|i| i.to_le_bytes()).collect();
        adapter
            .put_file(&src, Bytes::from(payload.clone()), false)
            .await
            .unwrap();
        adapter.copy_file(&src, &dst, false).await.unwrap();

        let copied = adapter.get_file_content(&dst).await.unwrap();
        assert_eq!(&copied[..], &payload[..]);
    }

    #[tokio::test]
    async fn presign_is_unsupported() {
        let adapter = LocalAdapter::new();
        assert!(!adapter.supports_presign());
        let result = adapter
            .presign_upload_url("/tmp/x", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
