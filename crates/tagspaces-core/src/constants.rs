//! Shared constants for metadata and sidecar layout.

/// Name of the hidden per-directory metadata folder.
pub const META_FOLDER: &str = ".ts";

/// Extension appended to a file name to derive its sidecar path.
pub const META_FILE_EXT: &str = ".json";

/// Sidecar file name for directory metadata inside the meta folder.
pub const META_FOLDER_FILE: &str = "tsm.json";

/// Directory separator used by object store and WebDAV locations.
pub const FORWARD_SLASH: char = '/';

/// Directory separator used by local locations on Windows.
pub const BACKSLASH: char = '\\';
