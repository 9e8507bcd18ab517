//! Transfer progress model.
//!
//! The UI-facing progress list is published as an immutable snapshot
//! (`Arc<Vec<TransferProgress>>`) over a `tokio::sync::watch` channel.
//! The single writer clones-on-write and publishes a fresh snapshot per
//! update, so readers never race a half-mutated list. Per-file progress
//! is monotonically non-decreasing; the only negative value is the
//! conflict-pending marker.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Progress value marking a task that waits on a conflict decision.
pub const CONFLICT_PENDING: i8 = -1;

/// Lifecycle of one transfer task.
///
/// `Conflicted` is terminal until a fresh user decision re-queues the
/// task; `Aborted` tasks stay in the list for accounting rather than
/// being silently removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Queued,
    Running,
    Finished,
    Aborted,
    Conflicted,
    Failed,
    Skipped,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferState::Queued | TransferState::Running)
    }
}

/// How one in-flight task can be aborted.
///
/// Network transfers carry a callable token; backends that cannot stop a
/// transfer mid-stream carry the textual reason instead.
#[derive(Debug, Clone)]
pub enum AbortHandle {
    Token(CancellationToken),
    Unsupported(String),
}

impl AbortHandle {
    /// Request cancellation. Returns false when this task cannot be
    /// aborted.
    pub fn abort(&self) -> bool {
        match self {
            AbortHandle::Token(token) => {
                token.cancel();
                true
            }
            AbortHandle::Unsupported(_) => false,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AbortHandle::Token(_) => None,
            AbortHandle::Unsupported(reason) => Some(reason),
        }
    }
}

/// One row of the progress list.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub path: String,
    pub target_path: String,
    /// 0..=100, or [`CONFLICT_PENDING`].
    pub progress: i8,
    pub state: TransferState,
    pub abort: AbortHandle,
}

impl TransferProgress {
    pub fn queued(path: String, target_path: String, abort: AbortHandle) -> Self {
        TransferProgress {
            path,
            target_path,
            progress: 0,
            state: TransferState::Queued,
            abort,
        }
    }
}

/// Published progress list; a fresh `Arc` per update.
pub type ProgressSnapshot = Arc<Vec<TransferProgress>>;

/// Single-writer publisher of progress snapshots.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        ProgressPublisher { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Replace the whole list at the start of a batch.
    pub fn init(&self, tasks: Vec<TransferProgress>) {
        let _ = self.tx.send(Arc::new(tasks));
    }

    /// Update one task by source path.
    ///
    /// Progress never regresses: a lower value than the current one is
    /// clamped away, except for the conflict-pending marker.
    pub fn update(&self, path: &str, progress: i8, state: TransferState) {
        self.tx.send_modify(|snapshot| {
            let list = Arc::make_mut(snapshot);
            if let Some(item) = list.iter_mut().find(|item| item.path == path) {
                item.state = state;
                item.progress = if progress == CONFLICT_PENDING {
                    CONFLICT_PENDING
                } else {
                    item.progress.max(progress)
                };
            }
        });
    }

    /// Cancel every live task with a callable abort handle.
    ///
    /// Tasks already in a terminal state are untouched. Returns the
    /// number of cancellation requests issued.
    pub fn stop_all(&self) -> usize {
        let snapshot = self.snapshot();
        snapshot
            .iter()
            .filter(|item| !item.state.is_terminal())
            .filter(|item| item.abort.abort())
            .count()
    }
}
