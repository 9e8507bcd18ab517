//! Path normalizer.
//!
//! Pure functions over string paths, parameterized by an explicit
//! directory separator so Windows (`\`) and forward-slash locations share
//! one implementation. Nothing here touches the filesystem.
//!
//! Sidecar layout derived here:
//!
//! - meta directory: `<dir><sep>.ts`
//! - file sidecar:   `<containingDir><sep>.ts<sep><fileName>.json`
//! - dir sidecar:    `<dir><sep>.ts<sep>tsm.json`
//! - revision slot:  `<containingDir><sep>.ts<sep><uuid><sep><millis>.<ext>`

use crate::constants::{META_FILE_EXT, META_FOLDER, META_FOLDER_FILE};
use crate::revisions::revision_file_name;

/// Strip a single trailing separator, keeping a bare root (`/`) intact.
pub fn clean_trailing_separator(path: &str, sep: char) -> &str {
    if path.len() > 1 {
        path.strip_suffix(sep).unwrap_or(path)
    } else {
        path
    }
}

/// Last path segment. A trailing separator is ignored, so the base name of
/// a directory path ending in `sep` is the directory's own name.
pub fn base_name(path: &str, sep: char) -> &str {
    let cleaned = clean_trailing_separator(path, sep);
    match cleaned.rfind(sep) {
        Some(idx) => &cleaned[idx + sep.len_utf8()..],
        None => cleaned,
    }
}

/// Containing directory of `path`, without a trailing separator.
/// Returns an empty string when the path has no separator.
pub fn extract_containing_directory_path(path: &str, sep: char) -> String {
    let cleaned = clean_trailing_separator(path, sep);
    match cleaned.rfind(sep) {
        Some(0) => sep.to_string(),
        Some(idx) => cleaned[..idx].to_string(),
        None => String::new(),
    }
}

/// Lowercased file extension without the dot, or an empty string.
///
/// No extension is reported when the last dot sits inside the directory
/// part, or before a closing `]` (dots inside a bracketed tag group are
/// part of the name, not an extension). A `?query` suffix is stripped.
pub fn extract_file_extension(path: &str, sep: char) -> String {
    let last_dot = match path.rfind('.') {
        Some(idx) => idx,
        None => return String::new(),
    };
    if let Some(last_sep) = path.rfind(sep) {
        if last_dot < last_sep {
            return String::new();
        }
    }
    if let Some(last_bracket) = path.rfind(']') {
        if last_dot < last_bracket {
            return String::new();
        }
    }
    let mut extension = path[last_dot + 1..].trim().to_lowercase();
    if let Some(q) = extension.find('?') {
        extension.truncate(q);
    }
    extension
}

/// File name without its extension (and without the dot).
pub fn extract_file_name_without_ext(path: &str, sep: char) -> String {
    let name = base_name(path, sep);
    let ext = extract_file_extension(path, sep);
    if ext.is_empty() {
        name.to_string()
    } else {
        name[..name.len() - ext.len() - 1].to_string()
    }
}

/// Canonical forward-slash form of a path, without a trailing slash.
pub fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    clean_trailing_separator(&normalized, '/').to_string()
}

/// Join a directory and a child name with the given separator, avoiding a
/// doubled separator when the directory already ends in one.
pub fn join_path(dir: &str, name: &str, sep: char) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    format!("{}{}{}", clean_trailing_separator(dir, sep), sep, name)
}

/// Hidden metadata directory for `dir_path`.
pub fn get_meta_directory_path(dir_path: &str, sep: char) -> String {
    join_path(dir_path, META_FOLDER, sep)
}

/// Sidecar path for a file entry: `<containingDir>/.ts/<fileName>.json`.
pub fn get_meta_file_location_for_file(file_path: &str, sep: char) -> String {
    let containing = extract_containing_directory_path(file_path, sep);
    let meta_dir = get_meta_directory_path(&containing, sep);
    join_path(
        &meta_dir,
        &format!("{}{}", base_name(file_path, sep), META_FILE_EXT),
        sep,
    )
}

/// Sidecar path for a directory entry: `<dir>/.ts/tsm.json`.
pub fn get_meta_file_location_for_dir(dir_path: &str, sep: char) -> String {
    let meta_dir = get_meta_directory_path(clean_trailing_separator(dir_path, sep), sep);
    join_path(&meta_dir, META_FOLDER_FILE, sep)
}

/// Revision directory for an entry: `<containingDir>/.ts/<uuid>`.
///
/// Keyed by the entry's uuid, not its name, so renaming the live file does
/// not orphan its revision history.
pub fn get_backup_file_dir(file_path: &str, uuid: &str, sep: char) -> String {
    let containing = extract_containing_directory_path(file_path, sep);
    let meta_dir = get_meta_directory_path(&containing, sep);
    join_path(&meta_dir, uuid, sep)
}

/// Full path of the revision slot for `file_path` at `lmdt_millis`.
pub fn get_backup_file_location(file_path: &str, uuid: &str, lmdt_millis: i64, sep: char) -> String {
    let dir = get_backup_file_dir(file_path, uuid, sep);
    let ext = extract_file_extension(file_path, sep);
    join_path(&dir, &revision_file_name(lmdt_millis, &ext), sep)
}

/// Strip a leading UTF-8 byte order mark.
///
/// Deliberately a caller-side helper: storage adapters return raw
/// bytes-as-text, BOM handling is a presentation concern.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}
