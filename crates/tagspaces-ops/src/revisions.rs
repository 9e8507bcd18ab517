//! File revision history.
//!
//! Revisions live in the sidecar area next to the file they back up:
//! `<containingDir>/.ts/<uuid>/<lmdt>.<ext>`, where `uuid` is the file's
//! sidecar metadata id and the revision file name encodes the capture
//! timestamp in epoch milliseconds. Files in the backup directory whose
//! names do not parse as a timestamp are ignored rather than treated as
//! corruption.

use std::sync::Arc;

use chrono::Utc;

use crate::error::OpsResult;
use tagspaces_core::{parse_revision_lmdt, paths};
use tagspaces_storage::{StorageAdapter, StorageError};

/// One captured revision of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub path: String,
    pub name: String,
    pub lmdt: i64,
    pub size: u64,
}

/// Creates, lists, restores and deletes revisions on one adapter.
pub struct RevisionManager {
    adapter: Arc<dyn StorageAdapter>,
    sep: char,
}

impl RevisionManager {
    pub fn new(adapter: Arc<dyn StorageAdapter>, sep: char) -> Self {
        RevisionManager { adapter, sep }
    }

    fn backup_dir(&self, file_path: &str, uuid: &str) -> String {
        paths::get_backup_file_dir(file_path, uuid, self.sep)
    }

    /// List revisions of `file_path`, newest first. A missing backup
    /// directory means no revisions, not an error.
    pub async fn list_revisions(
        &self,
        file_path: &str,
        uuid: &str,
    ) -> OpsResult<Vec<Revision>> {
        let dir = self.backup_dir(file_path, uuid);
        let entries = match self.adapter.list_directory(&dir, &[]).await {
            Ok(entries) => entries,
            Err(err) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut revisions: Vec<Revision> = entries
            .into_iter()
            .filter(|entry| entry.is_file)
            .filter_map(|entry| {
                parse_revision_lmdt(&entry.name).map(|lmdt| Revision {
                    path: entry.path,
                    name: entry.name,
                    lmdt,
                    size: entry.size,
                })
            })
            .collect();
        revisions.sort_by(|a, b| b.lmdt.cmp(&a.lmdt));
        Ok(revisions)
    }

    /// Capture the current content of `file_path` as a new revision
    /// stamped with the current time.
    pub async fn create_revision(&self, file_path: &str, uuid: &str) -> OpsResult<Revision> {
        self.create_revision_at(file_path, uuid, Utc::now().timestamp_millis())
            .await
    }

    /// Capture a revision with an explicit timestamp.
    pub async fn create_revision_at(
        &self,
        file_path: &str,
        uuid: &str,
        lmdt_millis: i64,
    ) -> OpsResult<Revision> {
        // The sidecar directory must exist before the per-file backup
        // directory on backends that create collections one level at a
        // time.
        let containing = paths::extract_containing_directory_path(file_path, self.sep);
        let meta_dir = paths::get_meta_directory_path(&containing, self.sep);
        self.adapter.create_directory(&meta_dir).await?;
        let dir = self.backup_dir(file_path, uuid);
        self.adapter.create_directory(&dir).await?;

        let target = paths::get_backup_file_location(file_path, uuid, lmdt_millis, self.sep);
        self.adapter.copy_file(file_path, &target, true).await?;

        let stored = self.adapter.stat(&target).await?;
        tracing::debug!(path = %file_path, revision = %target, "Captured revision");
        Ok(Revision {
            path: stored.path,
            name: stored.name,
            lmdt: lmdt_millis,
            size: stored.size,
        })
    }

    /// Replace the live file with `revision_path`. The pre-restore
    /// content is captured as a new revision first, so a restore can
    /// itself be undone.
    pub async fn restore_revision(
        &self,
        file_path: &str,
        uuid: &str,
        revision_path: &str,
    ) -> OpsResult<Revision> {
        let backup = self.create_revision(file_path, uuid).await?;
        self.adapter.copy_file(revision_path, file_path, true).await?;
        tracing::info!(path = %file_path, revision = %revision_path, "Restored revision");
        Ok(backup)
    }

    pub async fn delete_revision(&self, revision_path: &str) -> OpsResult<()> {
        self.adapter.delete_file(revision_path).await?;
        Ok(())
    }

    /// Remove the whole revision history of a file. Already gone is fine.
    pub async fn delete_all_revisions(&self, file_path: &str, uuid: &str) -> OpsResult<()> {
        let dir = self.backup_dir(file_path, uuid);
        match self.adapter.delete_directory(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
