//! TagSpaces Operations Library
//!
//! Orchestration on top of the storage adapters: batch move/copy/delete
//! with progress snapshots and cancellation, up-front conflict detection
//! with pluggable resolution, timestamped file revisions, and sidecar
//! metadata I/O.
//!
//! # Progress and cancellation
//!
//! Progress is published as immutable snapshots over a watch channel;
//! consumers never observe a half-updated list. Cancellation is an
//! explicit `CancellationToken` threaded through the call chain and
//! held by the caller; there is no process-wide abort registry.

pub mod conflict;
pub mod error;
pub mod progress;
pub mod revisions;
pub mod sidecar;
pub mod transfer;

// Re-export commonly used types
pub use conflict::{
    handle_entry_exist, AutoResolution, ConflictHandler, ConflictResolution, EntryConflict,
};
pub use error::{OpsError, OpsResult};
pub use progress::{
    AbortHandle, ProgressPublisher, ProgressSnapshot, TransferProgress, TransferState,
    CONFLICT_PENDING,
};
pub use revisions::{Revision, RevisionManager};
pub use sidecar::{get_metadata_id, load_entry_meta, save_entry_meta};
pub use transfer::{collect_dir_stats, BatchReport, DirStats, TransferOrchestrator};
