//! Conflict detection and resolution policy.
//!
//! Detection is name-based only: an entry with the same name at the
//! destination is always flagged, even when content is byte-identical.
//! Hashing would require a full download on remote backends, so this
//! trade is deliberate.
//!
//! Detection and resolution are decoupled: `handle_entry_exist` computes
//! the conflict list, a `ConflictHandler` decides what to do with it.
//! Interactive callers register a dialog-backed handler; headless callers
//! use [`AutoResolution`].
//!
//! Known weak spot inherited from the check-then-write design: another
//! writer can create a same-named entry between the check and the write.
//! The object store and WebDAV adapters narrow the window with
//! conditional puts when overwrite is off; there is no lock.

use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{OpsError, OpsResult};
use tagspaces_core::{paths, FileSystemEntry};
use tagspaces_storage::{StorageAdapter, StorageError};

/// One (source, existing destination) collision.
#[derive(Debug, Clone)]
pub struct EntryConflict {
    pub source: FileSystemEntry,
    pub existing: FileSystemEntry,
}

/// What to do with one conflicting entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Overwrite,
    Skip,
    Rename,
}

impl FromStr for ConflictResolution {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" => Ok(ConflictResolution::Overwrite),
            "skip" => Ok(ConflictResolution::Skip),
            "rename" => Ok(ConflictResolution::Rename),
            other => Err(OpsError::InvalidInput(format!(
                "unknown conflict resolution: {}",
                other
            ))),
        }
    }
}

/// Resolution strategy hook.
///
/// Returns one resolution per conflict, in order. Implementations hold
/// whatever UI state they need; the resolver itself holds none.
#[async_trait]
pub trait ConflictHandler: Send + Sync {
    async fn resolve(&self, conflicts: &[EntryConflict]) -> Vec<ConflictResolution>;
}

/// Fixed-policy handler for non-interactive callers.
pub struct AutoResolution(pub ConflictResolution);

#[async_trait]
impl ConflictHandler for AutoResolution {
    async fn resolve(&self, conflicts: &[EntryConflict]) -> Vec<ConflictResolution> {
        vec![self.0; conflicts.len()]
    }
}

/// Check which of `entries` collide with an existing entry of the same
/// name under `target_path`. An empty result means no conflicts.
pub async fn handle_entry_exist(
    entries: &[FileSystemEntry],
    target_path: &str,
    adapter: &dyn StorageAdapter,
    sep: char,
) -> OpsResult<Vec<EntryConflict>> {
    let mut conflicts = Vec::new();
    for entry in entries {
        let destination = paths::join_path(target_path, &entry.name, sep);
        match adapter.stat(&destination).await {
            Ok(existing) => conflicts.push(EntryConflict {
                source: entry.clone(),
                existing,
            }),
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(conflicts)
}

/// Derive a free destination path by appending ` (copy)` (then
/// ` (copy 2)`, ` (copy 3)`, ...) before the extension. Directory names
/// get the suffix at the end; a dot inside a folder name is not an
/// extension.
pub async fn unique_target_path(
    desired: &str,
    is_file: bool,
    adapter: &dyn StorageAdapter,
    sep: char,
) -> OpsResult<String> {
    if !adapter.exists(desired).await? {
        return Ok(desired.to_string());
    }

    let dir = paths::extract_containing_directory_path(desired, sep);
    let (stem, ext) = if is_file {
        (
            paths::extract_file_name_without_ext(desired, sep),
            paths::extract_file_extension(desired, sep),
        )
    } else {
        (paths::base_name(desired, sep).to_string(), String::new())
    };

    let mut counter = 1u32;
    loop {
        let suffix = if counter == 1 {
            " (copy)".to_string()
        } else {
            format!(" (copy {})", counter)
        };
        let name = if ext.is_empty() {
            format!("{}{}", stem, suffix)
        } else {
            format!("{}{}.{}", stem, suffix, ext)
        };
        let candidate = paths::join_path(&dir, &name, sep);
        if !adapter.exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    use tagspaces_storage::LocalAdapter;

    fn path_str(p: &std::path::Path) -> String {
        p.to_string_lossy().to_string()
    }

    fn entry_named(name: &str) -> FileSystemEntry {
        FileSystemEntry {
            uuid: None,
            name: name.to_string(),
            path: format!("/elsewhere/{}", name),
            is_file: true,
            size: 1,
            lmdt: None,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn flags_name_collisions_only() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let sep = std::path::MAIN_SEPARATOR;

        adapter
            .put_file(
                &path_str(&dir.path().join("taken.txt")),
                Bytes::from_static(b"x"),
                false,
            )
            .await
            .unwrap();

        let sources = vec![entry_named("taken.txt"), entry_named("free.txt")];
        let conflicts =
            handle_entry_exist(&sources, &path_str(dir.path()), &adapter, sep)
                .await
                .unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].source.name, "taken.txt");
        assert_eq!(conflicts[0].existing.name, "taken.txt");
    }

    #[tokio::test]
    async fn no_collision_means_empty_list() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let sep = std::path::MAIN_SEPARATOR;

        let sources = vec![entry_named("a.txt"), entry_named("b.txt")];
        let conflicts =
            handle_entry_exist(&sources, &path_str(dir.path()), &adapter, sep)
                .await
                .unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn rename_policy_finds_a_free_name() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let sep = std::path::MAIN_SEPARATOR;

        let desired = path_str(&dir.path().join("report.pdf"));
        adapter
            .put_file(&desired, Bytes::from_static(b"x"), false)
            .await
            .unwrap();
        adapter
            .put_file(
                &path_str(&dir.path().join("report (copy).pdf")),
                Bytes::from_static(b"x"),
                false,
            )
            .await
            .unwrap();

        let candidate = unique_target_path(&desired, true, &adapter, sep)
            .await
            .unwrap();
        assert!(candidate.ends_with("report (copy 2).pdf"));

        let untouched = path_str(&dir.path().join("fresh.pdf"));
        assert_eq!(
            unique_target_path(&untouched, true, &adapter, sep)
                .await
                .unwrap(),
            untouched
        );
    }

    #[tokio::test]
    async fn rename_policy_keeps_dotted_directory_names_whole() {
        let dir = tempdir().unwrap();
        let adapter = LocalAdapter::new();
        let sep = std::path::MAIN_SEPARATOR;

        let desired = path_str(&dir.path().join("photos.2024"));
        adapter.create_directory(&desired).await.unwrap();

        let candidate = unique_target_path(&desired, false, &adapter, sep)
            .await
            .unwrap();
        assert!(candidate.ends_with("photos.2024 (copy)"));
    }

    #[tokio::test]
    async fn auto_resolution_applies_one_policy() {
        let conflicts = vec![
            EntryConflict {
                source: entry_named("a"),
                existing: entry_named("a"),
            },
            EntryConflict {
                source: entry_named("b"),
                existing: entry_named("b"),
            },
        ];
        let handler = AutoResolution(ConflictResolution::Skip);
        let decisions = handler.resolve(&conflicts).await;
        assert_eq!(
            decisions,
            vec![ConflictResolution::Skip, ConflictResolution::Skip]
        );
    }
}
