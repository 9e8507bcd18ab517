//! Sidecar metadata I/O.
//!
//! Entry metadata is a JSON document next to the entry it describes:
//! `<dir>/.ts/<name>.json` for files, `<dir>/.ts/tsm.json` for
//! directories. Sidecars written by other tools may start with a UTF-8
//! BOM, which is stripped before parsing.

use bytes::Bytes;

use crate::error::OpsResult;
use tagspaces_core::{paths, EntryMeta};
use tagspaces_storage::StorageAdapter;

fn meta_path(entry_path: &str, is_file: bool, sep: char) -> String {
    if is_file {
        paths::get_meta_file_location_for_file(entry_path, sep)
    } else {
        paths::get_meta_file_location_for_dir(entry_path, sep)
    }
}

/// Load and parse the sidecar for `entry_path`.
pub async fn load_entry_meta(
    adapter: &dyn StorageAdapter,
    entry_path: &str,
    is_file: bool,
    sep: char,
) -> OpsResult<EntryMeta> {
    let path = meta_path(entry_path, is_file, sep);
    let raw = adapter.load_text_file(&path).await?;
    let meta: EntryMeta = serde_json::from_str(paths::strip_bom(&raw))?;
    Ok(meta)
}

/// Serialize and write the sidecar for `entry_path`, creating the sidecar
/// directory first. Always overwrites.
pub async fn save_entry_meta(
    adapter: &dyn StorageAdapter,
    entry_path: &str,
    is_file: bool,
    sep: char,
    meta: &EntryMeta,
) -> OpsResult<()> {
    let dir = if is_file {
        paths::extract_containing_directory_path(entry_path, sep)
    } else {
        entry_path.to_string()
    };
    adapter
        .create_directory(&paths::get_meta_directory_path(&dir, sep))
        .await?;

    let path = meta_path(entry_path, is_file, sep);
    let body = serde_json::to_string(meta)?;
    adapter.put_file(&path, Bytes::from(body), true).await?;
    tracing::debug!(path = %entry_path, "Saved sidecar metadata");
    Ok(())
}

/// Return the persisted metadata id for `entry_path`, creating and saving
/// a fresh sidecar when none exists yet. The id keys revision history, so
/// it must be stable across calls.
pub async fn get_metadata_id(
    adapter: &dyn StorageAdapter,
    entry_path: &str,
    is_file: bool,
    sep: char,
) -> OpsResult<String> {
    match load_entry_meta(adapter, entry_path, is_file, sep).await {
        Ok(meta) => Ok(meta.id),
        Err(crate::OpsError::Storage(err)) if err.is_not_found() => {
            let meta = EntryMeta::generate();
            save_entry_meta(adapter, entry_path, is_file, sep, &meta).await?;
            Ok(meta.id)
        }
        Err(err) => Err(err),
    }
}
