//! Transfer orchestrator.
//!
//! Sequences batches of move/copy/delete operations across storage
//! adapters with bounded concurrency, per-file progress, cooperative
//! cancellation, and partial-failure accounting.
//!
//! Move is never assumed atomic: every move is copy, verify, then delete
//! the source. A crash mid-operation leaves the source intact and at most
//! a partial copy at the destination; retrying routes the leftover copy
//! through conflict resolution, and an Overwrite resolution re-copies
//! rather than trusting a size match against an unknown file.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::conflict::{self, ConflictHandler, ConflictResolution};
use crate::error::{OpsError, OpsResult};
use crate::progress::{
    AbortHandle, ProgressPublisher, ProgressSnapshot, TransferProgress, TransferState,
    CONFLICT_PENDING,
};
use tagspaces_core::{paths, FileSystemEntry, LocationType};
use tagspaces_storage::{StorageAdapter, StorageError};

/// Pre-computed size of a directory tree, supplied by the directory
/// properties collaborator so directory transfers can show a percentage
/// instead of an indeterminate bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub file_count: u64,
    pub dir_count: u64,
    pub total_bytes: u64,
}

/// Walk a directory tree and accumulate its stats.
pub async fn collect_dir_stats(
    adapter: &dyn StorageAdapter,
    path: &str,
) -> OpsResult<DirStats> {
    let mut stats = DirStats::default();
    let mut pending = vec![path.to_string()];

    while let Some(dir) = pending.pop() {
        for entry in adapter.list_directory(&dir, &[]).await? {
            if entry.is_file {
                stats.file_count += 1;
                stats.total_bytes += entry.size;
            } else {
                stats.dir_count += 1;
                pending.push(entry.path);
            }
        }
    }
    Ok(stats)
}

/// Outcome of one batch, reported only after every task reached a
/// terminal state.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, StorageError)>,
    pub aborted: Vec<String>,
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_empty()
    }

    /// Fold another batch's outcome into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.aborted.extend(other.aborted);
        self.skipped.extend(other.skipped);
    }

    fn record(&mut self, path: String, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Finished => self.succeeded.push(path),
            TaskOutcome::Skipped => self.skipped.push(path),
            TaskOutcome::Aborted => self.aborted.push(path),
            TaskOutcome::Failed(err) => self.failed.push((path, err)),
        }
    }
}

enum TaskOutcome {
    Finished,
    Skipped,
    Aborted,
    Failed(StorageError),
}

struct TaskPlan {
    source: FileSystemEntry,
    target: String,
    overwrite: bool,
    skip: bool,
    token: CancellationToken,
}

/// Batch move/copy/delete driver.
pub struct TransferOrchestrator {
    semaphore: Arc<Semaphore>,
    progress: Arc<ProgressPublisher>,
}

impl TransferOrchestrator {
    pub fn new(max_concurrent: usize) -> Self {
        TransferOrchestrator {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            progress: Arc::new(ProgressPublisher::new()),
        }
    }

    pub fn progress(&self) -> &ProgressPublisher {
        &self.progress
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Copy a batch of files into `target_dir` on the destination
    /// adapter. Conflicts are detected up front and routed through
    /// `handler`; one file failing does not stop the rest.
    pub async fn copy_files(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
    ) -> OpsResult<BatchReport> {
        let plans = self
            .plan_batch(sources, target_dir, &src_adapter, &dst_adapter, sep, handler, cancel)
            .await?;
        self.run_file_batch(plans, src_adapter, dst_adapter, false)
            .await
    }

    /// Move a batch of files: copy, verify, then delete each source.
    pub async fn move_files(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
    ) -> OpsResult<BatchReport> {
        let plans = self
            .plan_batch(sources, target_dir, &src_adapter, &dst_adapter, sep, handler, cancel)
            .await?;
        self.run_file_batch(plans, src_adapter, dst_adapter, true)
            .await
    }

    /// Copy directory trees. `stats` is parallel to `sources` and drives
    /// percentage progress.
    pub async fn copy_dirs(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
        stats: &[DirStats],
    ) -> OpsResult<BatchReport> {
        self.run_dir_batch(
            sources, target_dir, src_adapter, dst_adapter, sep, handler, cancel, stats, false,
        )
        .await
    }

    /// Move directory trees: full copy first, the source tree is deleted
    /// only after its copy completed without failures.
    pub async fn move_dirs(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
        stats: &[DirStats],
    ) -> OpsResult<BatchReport> {
        self.run_dir_batch(
            sources, target_dir, src_adapter, dst_adapter, sep, handler, cancel, stats, true,
        )
        .await
    }

    /// Delete a batch of entries, accumulating per-entry failures.
    pub async fn delete_entries(
        &self,
        entries: &[FileSystemEntry],
        adapter: Arc<dyn StorageAdapter>,
    ) -> OpsResult<BatchReport> {
        let mut report = BatchReport::default();
        for entry in entries {
            let result = if entry.is_file {
                adapter.delete_file(&entry.path).await
            } else {
                adapter.delete_directory(&entry.path).await
            };
            match result {
                Ok(()) => report.succeeded.push(entry.path.clone()),
                Err(err) => report.failed.push((entry.path.clone(), err)),
            }
        }
        Ok(report)
    }

    /// Same-backend transfers use the adapter's native copy; everything
    /// else streams through the client.
    fn is_native(
        src_adapter: &Arc<dyn StorageAdapter>,
        dst_adapter: &Arc<dyn StorageAdapter>,
    ) -> bool {
        Arc::ptr_eq(src_adapter, dst_adapter)
            || (src_adapter.location_type() == LocationType::Local
                && dst_adapter.location_type() == LocationType::Local)
    }

    async fn plan_batch(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: &Arc<dyn StorageAdapter>,
        dst_adapter: &Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
    ) -> OpsResult<Vec<TaskPlan>> {
        let native = Self::is_native(src_adapter, dst_adapter);

        let mut plans: Vec<TaskPlan> = sources
            .iter()
            .map(|source| TaskPlan {
                source: source.clone(),
                target: paths::join_path(target_dir, &source.name, sep),
                overwrite: false,
                skip: false,
                token: cancel.child_token(),
            })
            .collect();

        let rows: Vec<TransferProgress> = plans
            .iter()
            .map(|plan| {
                let abort = if native {
                    AbortHandle::Unsupported(
                        "copy runs as one filesystem call and cannot be aborted mid-stream"
                            .to_string(),
                    )
                } else {
                    AbortHandle::Token(plan.token.clone())
                };
                TransferProgress::queued(plan.source.path.clone(), plan.target.clone(), abort)
            })
            .collect();
        self.progress.init(rows);

        let conflicts =
            conflict::handle_entry_exist(sources, target_dir, &**dst_adapter, sep).await?;
        if conflicts.is_empty() {
            return Ok(plans);
        }

        for found in &conflicts {
            self.progress
                .update(&found.source.path, CONFLICT_PENDING, TransferState::Conflicted);
        }

        let decisions = handler.resolve(&conflicts).await;
        for (found, decision) in conflicts.iter().zip(decisions) {
            let plan = plans
                .iter_mut()
                .find(|p| p.source.path == found.source.path)
                .ok_or_else(|| {
                    OpsError::InvalidInput(format!(
                        "conflict for unknown source {}",
                        found.source.path
                    ))
                })?;
            match decision {
                ConflictResolution::Overwrite => {
                    plan.overwrite = true;
                    self.progress
                        .update(&plan.source.path, 0, TransferState::Queued);
                }
                ConflictResolution::Skip => {
                    plan.skip = true;
                    self.progress
                        .update(&plan.source.path, 0, TransferState::Skipped);
                }
                ConflictResolution::Rename => {
                    plan.target = conflict::unique_target_path(
                        &plan.target,
                        plan.source.is_file,
                        &**dst_adapter,
                        sep,
                    )
                    .await?;
                    self.progress
                        .update(&plan.source.path, 0, TransferState::Queued);
                }
            }
        }

        Ok(plans)
    }

    async fn run_file_batch(
        &self,
        plans: Vec<TaskPlan>,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        delete_source: bool,
    ) -> OpsResult<BatchReport> {
        let native = Self::is_native(&src_adapter, &dst_adapter);
        let mut report = BatchReport::default();
        let mut join_set: JoinSet<(String, TaskOutcome)> = JoinSet::new();

        for plan in plans {
            if plan.skip {
                report.skipped.push(plan.source.path.clone());
                continue;
            }

            let semaphore = self.semaphore.clone();
            let progress = self.progress.clone();
            let src = src_adapter.clone();
            let dst = dst_adapter.clone();

            join_set.spawn(async move {
                let path = plan.source.path.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (path, TaskOutcome::Aborted),
                };
                let outcome =
                    transfer_file(&plan, &*src, &*dst, &progress, native, delete_source).await;
                (path, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((path, outcome)) => report.record(path, outcome),
                Err(err) => report.failed.push((
                    String::new(),
                    StorageError::Backend(format!("transfer task panicked: {}", err)),
                )),
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            aborted = report.aborted.len(),
            skipped = report.skipped.len(),
            "Transfer batch complete"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_dir_batch(
        &self,
        sources: &[FileSystemEntry],
        target_dir: &str,
        src_adapter: Arc<dyn StorageAdapter>,
        dst_adapter: Arc<dyn StorageAdapter>,
        sep: char,
        handler: &dyn ConflictHandler,
        cancel: &CancellationToken,
        stats: &[DirStats],
        delete_source: bool,
    ) -> OpsResult<BatchReport> {
        if stats.len() != sources.len() {
            return Err(OpsError::InvalidInput(
                "one DirStats per source directory required".to_string(),
            ));
        }

        let plans = self
            .plan_batch(sources, target_dir, &src_adapter, &dst_adapter, sep, handler, cancel)
            .await?;
        let native = Self::is_native(&src_adapter, &dst_adapter);

        let mut report = BatchReport::default();
        let mut join_set: JoinSet<(String, TaskOutcome)> = JoinSet::new();

        for (plan, dir_stats) in plans.into_iter().zip(stats.iter().copied()) {
            if plan.skip {
                report.skipped.push(plan.source.path.clone());
                continue;
            }

            let semaphore = self.semaphore.clone();
            let progress = self.progress.clone();
            let src = src_adapter.clone();
            let dst = dst_adapter.clone();

            join_set.spawn(async move {
                let path = plan.source.path.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (path, TaskOutcome::Aborted),
                };
                let outcome = transfer_dir(
                    &plan,
                    &*src,
                    &*dst,
                    &progress,
                    native,
                    dir_stats,
                    delete_source,
                )
                .await;
                (path, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((path, outcome)) => report.record(path, outcome),
                Err(err) => report.failed.push((
                    String::new(),
                    StorageError::Backend(format!("transfer task panicked: {}", err)),
                )),
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            aborted = report.aborted.len(),
            skipped = report.skipped.len(),
            "Directory transfer batch complete"
        );
        Ok(report)
    }
}

/// Copy (or move) one file, reporting progress along the way.
async fn transfer_file(
    plan: &TaskPlan,
    src: &dyn StorageAdapter,
    dst: &dyn StorageAdapter,
    progress: &ProgressPublisher,
    native: bool,
    delete_source: bool,
) -> TaskOutcome {
    let path = &plan.source.path;
    progress.update(path, 0, TransferState::Running);

    if plan.token.is_cancelled() {
        progress.update(path, 0, TransferState::Aborted);
        return TaskOutcome::Aborted;
    }

    // Retried move: the previous attempt may already have produced a full
    // copy at the destination. Size comparison cannot tell a finished copy
    // from an unrelated same-size file, so the skip only applies when no
    // conflict was resolved for this entry; an Overwrite resolution always
    // re-copies.
    let mut copy_needed = true;
    if delete_source && !plan.overwrite {
        if let Ok(existing) = dst.stat(&plan.target).await {
            if existing.is_file && existing.size == plan.source.size {
                copy_needed = false;
            }
        }
    }

    if copy_needed {
        let copied = if native {
            copy_native(plan, src, dst, plan.overwrite).await
        } else {
            copy_streamed(plan, src, dst, progress, plan.overwrite).await
        };
        if let Err(err) = copied {
            return fail_or_abort(plan, progress, err);
        }

        // Verify the destination before touching the source.
        if delete_source {
            match dst.stat(&plan.target).await {
                Ok(copied_entry) if copied_entry.size == plan.source.size => {}
                Ok(copied_entry) => {
                    return fail_or_abort(
                        plan,
                        progress,
                        StorageError::Backend(format!(
                            "destination size mismatch after copy: {} != {}",
                            copied_entry.size, plan.source.size
                        )),
                    );
                }
                Err(err) => return fail_or_abort(plan, progress, err),
            }
        }
    }

    if delete_source {
        if let Err(err) = src.delete_file(path).await {
            // The copy exists and the source is intact; reported as a
            // failure so the caller can retry the move.
            return fail_or_abort(plan, progress, err);
        }
    }

    progress.update(path, 100, TransferState::Finished);
    TaskOutcome::Finished
}

async fn copy_native(
    plan: &TaskPlan,
    _src: &dyn StorageAdapter,
    dst: &dyn StorageAdapter,
    overwrite: bool,
) -> Result<(), StorageError> {
    dst.copy_file(&plan.source.path, &plan.target, overwrite)
        .await
}

/// Cross-backend copy: chunked download from the source, streamed upload
/// to the destination, with byte-counted progress and cancellation
/// injected between chunks.
async fn copy_streamed(
    plan: &TaskPlan,
    src: &dyn StorageAdapter,
    dst: &dyn StorageAdapter,
    progress: &ProgressPublisher,
    overwrite: bool,
) -> Result<(), StorageError> {
    if !overwrite && dst.exists(&plan.target).await? {
        return Err(StorageError::Conflict(plan.target.clone()));
    }

    let stream = src.get_file_stream(&plan.source.path).await?;

    let token = plan.token.clone();
    let path = plan.source.path.clone();
    let publisher = progress.clone();
    let total = plan.source.size.max(1);
    let mut done: u64 = 0;

    let counted = stream.map(move |chunk| {
        if token.is_cancelled() {
            return Err(StorageError::Aborted(path.clone()));
        }
        let chunk = chunk?;
        done += chunk.len() as u64;
        let percent = ((done.saturating_mul(100) / total).min(99)) as i8;
        publisher.update(&path, percent, TransferState::Running);
        Ok(chunk)
    });

    dst.put_file_stream(&plan.target, Box::pin(counted), overwrite)
        .await?;
    Ok(())
}

/// Copy (or move) one directory tree, walking it breadth-first.
async fn transfer_dir(
    plan: &TaskPlan,
    src: &dyn StorageAdapter,
    dst: &dyn StorageAdapter,
    progress: &ProgressPublisher,
    native: bool,
    stats: DirStats,
    delete_source: bool,
) -> TaskOutcome {
    let path = &plan.source.path;
    progress.update(path, 0, TransferState::Running);

    let total = stats.total_bytes.max(1);
    let mut done: u64 = 0;
    let mut pending = vec![(plan.source.path.clone(), plan.target.clone())];

    if let Err(err) = dst.create_directory(&plan.target).await {
        return fail_or_abort(plan, progress, err);
    }

    while let Some((src_dir, dst_dir)) = pending.pop() {
        if plan.token.is_cancelled() {
            progress.update(path, 0, TransferState::Aborted);
            return TaskOutcome::Aborted;
        }

        let children = match src.list_directory(&src_dir, &[]).await {
            Ok(children) => children,
            Err(err) => return fail_or_abort(plan, progress, err),
        };

        for child in children {
            if plan.token.is_cancelled() {
                progress.update(path, 0, TransferState::Aborted);
                return TaskOutcome::Aborted;
            }

            let child_target = join_child(&dst_dir, &child.name);
            if child.is_file {
                let result = if native {
                    dst.copy_file(&child.path, &child_target, plan.overwrite).await
                } else {
                    copy_child_streamed(src, dst, &child.path, &child_target, plan.overwrite)
                        .await
                };
                if let Err(err) = result {
                    return fail_or_abort(plan, progress, err);
                }
                done += child.size;
                let percent = ((done.saturating_mul(100) / total).min(99)) as i8;
                progress.update(path, percent, TransferState::Running);
            } else {
                if let Err(err) = dst.create_directory(&child_target).await {
                    return fail_or_abort(plan, progress, err);
                }
                pending.push((child.path, child_target));
            }
        }
    }

    if delete_source {
        if let Err(err) = src.delete_directory(path).await {
            return fail_or_abort(plan, progress, err);
        }
    }

    progress.update(path, 100, TransferState::Finished);
    TaskOutcome::Finished
}

async fn copy_child_streamed(
    src: &dyn StorageAdapter,
    dst: &dyn StorageAdapter,
    from: &str,
    to: &str,
    overwrite: bool,
) -> Result<(), StorageError> {
    let stream = src.get_file_stream(from).await?;
    dst.put_file_stream(to, stream, overwrite).await?;
    Ok(())
}

/// Join a child name onto a target directory using the separator already
/// present in the target path (falls back to `/` for bare names).
fn join_child(dir: &str, name: &str) -> String {
    let sep = if dir.contains('\\') { '\\' } else { '/' };
    paths::join_path(dir, name, sep)
}

fn fail_or_abort(
    plan: &TaskPlan,
    progress: &ProgressPublisher,
    err: StorageError,
) -> TaskOutcome {
    if err.is_aborted() || plan.token.is_cancelled() {
        progress.update(&plan.source.path, 0, TransferState::Aborted);
        TaskOutcome::Aborted
    } else {
        tracing::error!(
            path = %plan.source.path,
            target = %plan.target,
            error = %err,
            "Transfer task failed"
        );
        progress.update(&plan.source.path, 0, TransferState::Failed);
        TaskOutcome::Failed(err)
    }
}
