//! Failure and cancellation behavior of batch transfers.
//!
//! Uses a wrapper adapter around the local backend that can misreport its
//! location type (to force the streamed cross-backend path), deny copies
//! to selected targets, and cancel a transfer mid-stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use tagspaces_core::{FileSystemEntry, LocationType};
use tagspaces_ops::{
    AutoResolution, ConflictResolution, TransferOrchestrator, TransferState,
};
use tagspaces_storage::LocalAdapter;
use tagspaces_storage::{ByteStream, StorageAdapter, StorageError, StorageResult};

/// Local backend with fault-injection knobs for transfer tests.
struct TestAdapter {
    inner: LocalAdapter,
    reported_type: LocationType,
    deny_write_substring: Option<String>,
    deny_budget: AtomicUsize,
    cancel_on_read: Option<CancellationToken>,
}

impl TestAdapter {
    fn local() -> Self {
        TestAdapter {
            inner: LocalAdapter::new(),
            reported_type: LocationType::Local,
            deny_write_substring: None,
            deny_budget: AtomicUsize::new(0),
            cancel_on_read: None,
        }
    }

    fn remote_like() -> Self {
        TestAdapter {
            reported_type: LocationType::WebDav,
            ..Self::local()
        }
    }

    fn denying(substring: &str, budget: usize) -> Self {
        TestAdapter {
            deny_write_substring: Some(substring.to_string()),
            deny_budget: AtomicUsize::new(budget),
            ..Self::local()
        }
    }

    fn cancelling(token: CancellationToken) -> Self {
        TestAdapter {
            reported_type: LocationType::WebDav,
            cancel_on_read: Some(token),
            ..Self::local()
        }
    }

    fn check_denied(&self, path: &str) -> StorageResult<()> {
        if let Some(marker) = &self.deny_write_substring {
            if path.contains(marker.as_str()) {
                let budget = self.deny_budget.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |n| n.checked_sub(1),
                );
                if budget.is_ok() {
                    return Err(StorageError::Backend(format!(
                        "injected write failure: {}",
                        path
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for TestAdapter {
    async fn list_directory(
        &self,
        path: &str,
        extensions: &[String],
    ) -> StorageResult<Vec<FileSystemEntry>> {
        self.inner.list_directory(path, extensions).await
    }

    async fn load_text_file(&self, path: &str) -> StorageResult<String> {
        self.inner.load_text_file(path).await
    }

    async fn get_file_content(&self, path: &str) -> StorageResult<Bytes> {
        self.inner.get_file_content(path).await
    }

    async fn get_file_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let stream = self.inner.get_file_stream(path).await?;
        if let Some(token) = self.cancel_on_read.clone() {
            // Fires after the first chunk is produced, before the writer
            // can finish.
            let cancelling = stream.inspect(move |_| token.cancel());
            return Ok(Box::pin(cancelling));
        }
        Ok(stream)
    }

    async fn put_file(
        &self,
        path: &str,
        content: Bytes,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        self.check_denied(path)?;
        self.inner.put_file(path, content, overwrite).await
    }

    async fn put_file_stream(
        &self,
        path: &str,
        stream: ByteStream,
        overwrite: bool,
    ) -> StorageResult<FileSystemEntry> {
        self.check_denied(path)?;
        self.inner.put_file_stream(path, stream, overwrite).await
    }

    async fn stat(&self, path: &str) -> StorageResult<FileSystemEntry> {
        self.inner.stat(path).await
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        self.inner.exists(path).await
    }

    async fn create_directory(&self, path: &str) -> StorageResult<()> {
        self.inner.create_directory(path).await
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        self.inner.delete_file(path).await
    }

    async fn delete_directory(&self, path: &str) -> StorageResult<()> {
        self.inner.delete_directory(path).await
    }

    async fn copy_file(&self, from: &str, to: &str, overwrite: bool) -> StorageResult<()> {
        self.check_denied(to)?;
        self.inner.copy_file(from, to, overwrite).await
    }

    fn supports_presign(&self) -> bool {
        false
    }

    async fn presign_upload_url(
        &self,
        _path: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::Config("presign not supported".to_string()))
    }

    fn location_type(&self) -> LocationType {
        self.reported_type
    }
}

async fn seed_file(adapter: &dyn StorageAdapter, path: &str, body: &[u8]) -> FileSystemEntry {
    adapter
        .put_file(path, Bytes::copy_from_slice(body), false)
        .await
        .unwrap()
}

#[tokio::test]
async fn one_failing_file_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let adapter: Arc<dyn StorageAdapter> =
        Arc::new(TestAdapter::denying("dest/b.txt", usize::MAX));

    let mut sources = Vec::new();
    for name in ["a.txt", "b.txt", "c.txt"] {
        sources.push(seed_file(&*adapter, &format!("{}/{}", root, name), b"data").await);
    }
    let target = format!("{}/dest", root);
    adapter.create_directory(&target).await.unwrap();

    let orchestrator = TransferOrchestrator::new(1);
    let report = orchestrator
        .copy_files(
            &sources,
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Skip),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("b.txt"));
    assert!(adapter.exists(&format!("{}/a.txt", target)).await.unwrap());
    assert!(!adapter.exists(&format!("{}/b.txt", target)).await.unwrap());
    assert!(adapter.exists(&format!("{}/c.txt", target)).await.unwrap());
}

#[tokio::test]
async fn retried_move_survives_transient_copy_failure() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    // The first copy attempt fails; every later attempt goes through.
    let adapter: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::denying("dest/flaky.txt", 1));

    let src_path = format!("{}/flaky.txt", root);
    let entry = seed_file(&*adapter, &src_path, b"survives the retry").await;
    let target = format!("{}/dest", root);
    adapter.create_directory(&target).await.unwrap();

    let orchestrator = TransferOrchestrator::new(1);
    let first = orchestrator
        .move_files(
            &[entry.clone()],
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Overwrite),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(first.failed.len(), 1);
    // The failed attempt must leave the source untouched.
    assert!(adapter.exists(&src_path).await.unwrap());

    let second = orchestrator
        .move_files(
            &[entry],
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Overwrite),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(second.is_complete_success());
    assert!(!adapter.exists(&src_path).await.unwrap());
    let moved = adapter
        .load_text_file(&format!("{}/flaky.txt", target))
        .await
        .unwrap();
    assert_eq!(moved, "survives the retry");
}

#[tokio::test]
async fn retried_move_completes_after_interrupted_copy() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let adapter: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::local());

    let src_path = format!("{}/done.txt", root);
    let entry = seed_file(&*adapter, &src_path, b"already there").await;
    let target = format!("{}/dest", root);
    adapter.create_directory(&target).await.unwrap();
    // Simulate a crash after the copy but before the source delete.
    adapter
        .copy_file(&src_path, &format!("{}/done.txt", target), false)
        .await
        .unwrap();

    let orchestrator = TransferOrchestrator::new(1);
    let report = orchestrator
        .move_files(
            &[entry],
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Overwrite),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert!(!adapter.exists(&src_path).await.unwrap());
    let kept = adapter
        .load_text_file(&format!("{}/done.txt", target))
        .await
        .unwrap();
    assert_eq!(kept, "already there");
}

#[tokio::test]
async fn move_overwrite_replaces_same_size_destination() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let adapter: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::local());

    let src_path = format!("{}/note.txt", root);
    let entry = seed_file(&*adapter, &src_path, b"hello").await;
    let target = format!("{}/dest", root);
    adapter.create_directory(&target).await.unwrap();
    // Unrelated destination file of exactly the source's size.
    seed_file(&*adapter, &format!("{}/note.txt", target), b"world").await;

    let orchestrator = TransferOrchestrator::new(1);
    let report = orchestrator
        .move_files(
            &[entry],
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Overwrite),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert!(!adapter.exists(&src_path).await.unwrap());
    let moved = adapter
        .load_text_file(&format!("{}/note.txt", target))
        .await
        .unwrap();
    assert_eq!(moved, "hello");
}

#[tokio::test]
async fn cross_backend_copy_preserves_bytes() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let src: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::remote_like());
    let dst: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::remote_like());

    let body: Vec<u8> = (0u16..2048).map(|n| (n % 251) as u8).collect();
    let src_path = format!("{}/blob.bin", root);
    let entry = seed_file(&*src, &src_path, &body).await;
    let target = format!("{}/dest", root);
    src.create_directory(&target).await.unwrap();

    let orchestrator = TransferOrchestrator::new(1);
    let report = orchestrator
        .copy_files(
            &[entry],
            &target,
            src.clone(),
            dst.clone(),
            '/',
            &AutoResolution(ConflictResolution::Skip),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_complete_success());
    let copied = dst
        .get_file_content(&format!("{}/blob.bin", target))
        .await
        .unwrap();
    assert_eq!(copied.as_ref(), body.as_slice());

    // The final snapshot shows the task finished at 100 percent.
    let snapshot = orchestrator.progress().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].state, TransferState::Finished);
    assert_eq!(snapshot[0].progress, 100);
}

#[tokio::test]
async fn cancellation_mid_stream_leaves_no_partial_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let cancel = CancellationToken::new();
    let src: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::cancelling(cancel.clone()));
    let dst: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::remote_like());

    let body = vec![7u8; 256 * 1024];
    let src_path = format!("{}/big.bin", root);
    let entry = seed_file(&*src, &src_path, &body).await;
    let target = format!("{}/dest", root);
    src.create_directory(&target).await.unwrap();

    let orchestrator = TransferOrchestrator::new(1);
    let report = orchestrator
        .copy_files(
            &[entry],
            &target,
            src.clone(),
            dst.clone(),
            '/',
            &AutoResolution(ConflictResolution::Skip),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.aborted.len(), 1);
    assert!(report.succeeded.is_empty());
    // The writer cleaned up whatever it had written before the abort.
    assert!(!dst
        .exists(&format!("{}/big.bin", target))
        .await
        .unwrap());
    // The source is untouched.
    assert!(src.exists(&src_path).await.unwrap());
}

#[tokio::test]
async fn moved_directory_is_deleted_only_after_full_copy() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_str().unwrap();
    let adapter: Arc<dyn StorageAdapter> = Arc::new(TestAdapter::local());

    let src_dir = format!("{}/project", root);
    adapter.create_directory(&src_dir).await.unwrap();
    seed_file(&*adapter, &format!("{}/readme.md", src_dir), b"readme").await;
    adapter
        .create_directory(&format!("{}/src", src_dir))
        .await
        .unwrap();
    seed_file(&*adapter, &format!("{}/src/main.rs", src_dir), b"fn main() {}").await;

    let target = format!("{}/dest", root);
    adapter.create_directory(&target).await.unwrap();

    let stats = tagspaces_ops::collect_dir_stats(&*adapter, &src_dir)
        .await
        .unwrap();
    let source = FileSystemEntry {
        uuid: None,
        name: "project".to_string(),
        path: src_dir.clone(),
        is_file: false,
        size: 0,
        lmdt: None,
        tags: Vec::new(),
    };

    let orchestrator = TransferOrchestrator::new(2);
    let report = orchestrator
        .move_dirs(
            &[source],
            &target,
            adapter.clone(),
            adapter.clone(),
            '/',
            &AutoResolution(ConflictResolution::Skip),
            &CancellationToken::new(),
            &[stats],
        )
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert!(!adapter.exists(&src_dir).await.unwrap());
    assert!(adapter
        .exists(&format!("{}/project/src/main.rs", target))
        .await
        .unwrap());
}
