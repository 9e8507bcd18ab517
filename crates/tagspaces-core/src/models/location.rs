//! Location descriptors.
//!
//! A `Location` is one configured storage root: a local folder, an
//! S3-compatible bucket, or a WebDAV share. Backend-specific fields live in
//! the `LocationKind` sum type so capability checks are exhaustive matches
//! instead of boolean flags scattered at call sites. Adding a backend is a
//! compile error until every match arm handles it.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BACKSLASH, FORWARD_SLASH};
use crate::models::FileSystemEntry;
use crate::paths;

/// Storage backend types a location can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationType {
    Local,
    ObjectStore,
    WebDav,
}

impl FromStr for LocationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(LocationType::Local),
            "objectstore" | "s3" => Ok(LocationType::ObjectStore),
            "webdav" => Ok(LocationType::WebDav),
            _ => Err(anyhow::anyhow!("Invalid location type: {}", s)),
        }
    }
}

impl Display for LocationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LocationType::Local => write!(f, "local"),
            LocationType::ObjectStore => write!(f, "objectStore"),
            LocationType::WebDav => write!(f, "webDAV"),
        }
    }
}

/// Backend-specific part of a location descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LocationKind {
    /// Local filesystem folder. `path` is an absolute OS-native path.
    #[serde(rename_all = "camelCase")]
    Local { path: String },

    /// S3-compatible bucket. `path` is a bucket-relative key prefix
    /// (may be empty), always forward-slash separated.
    #[serde(rename_all = "camelCase")]
    ObjectStore {
        bucket_name: String,
        region: Option<String>,
        endpoint_url: Option<String>,
        #[serde(default)]
        path: String,
    },

    /// WebDAV share. `path` is a share-relative prefix, forward-slash
    /// separated.
    #[serde(rename_all = "camelCase")]
    WebDav {
        endpoint_url: String,
        username: Option<String>,
        password: Option<String>,
        #[serde(default)]
        path: String,
    },
}

/// One configured storage root.
///
/// The backend type is immutable after creation: configuration edits
/// replace the whole descriptor, they never flip the kind in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub uuid: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: LocationKind,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl Location {
    pub fn location_type(&self) -> LocationType {
        match self.kind {
            LocationKind::Local { .. } => LocationType::Local,
            LocationKind::ObjectStore { .. } => LocationType::ObjectStore,
            LocationKind::WebDav { .. } => LocationType::WebDav,
        }
    }

    /// Directory separator convention for paths inside this location.
    ///
    /// Object store keys and WebDAV hrefs always use `/`. Local locations
    /// use the OS-native separator, detected from the configured root path
    /// so that Windows roots configured on Windows keep their backslashes.
    pub fn dir_separator(&self) -> char {
        match &self.kind {
            LocationKind::Local { path } => {
                if path.contains(BACKSLASH) {
                    BACKSLASH
                } else {
                    FORWARD_SLASH
                }
            }
            LocationKind::ObjectStore { .. } | LocationKind::WebDav { .. } => FORWARD_SLASH,
        }
    }

    pub fn have_object_store_support(&self) -> bool {
        matches!(self.kind, LocationKind::ObjectStore { .. })
    }

    pub fn have_web_dav_support(&self) -> bool {
        matches!(self.kind, LocationKind::WebDav { .. })
    }

    /// Root path (or key prefix) of this location.
    pub fn path(&self) -> &str {
        match &self.kind {
            LocationKind::Local { path } => path,
            LocationKind::ObjectStore { path, .. } => path,
            LocationKind::WebDav { path, .. } => path,
        }
    }

    /// Build a minimal entry for a path the caller already knows about,
    /// without performing any I/O.
    pub fn to_fs_entry(&self, path: &str, is_file: bool) -> FileSystemEntry {
        let sep = self.dir_separator();
        FileSystemEntry {
            uuid: None,
            name: paths::base_name(path, sep).to_string(),
            path: path.to_string(),
            is_file,
            size: 0,
            lmdt: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_store_location() -> Location {
        Location {
            uuid: "loc-1".to_string(),
            name: "bucket".to_string(),
            kind: LocationKind::ObjectStore {
                bucket_name: "files".to_string(),
                region: Some("eu-central-1".to_string()),
                endpoint_url: None,
                path: String::new(),
            },
            is_read_only: false,
            is_default: false,
        }
    }

    #[test]
    fn capability_checks_follow_kind() {
        let loc = object_store_location();
        assert!(loc.have_object_store_support());
        assert!(!loc.have_web_dav_support());
        assert_eq!(loc.location_type(), LocationType::ObjectStore);
        assert_eq!(loc.dir_separator(), '/');
    }

    #[test]
    fn local_separator_detected_from_root() {
        let unix = Location {
            uuid: "l1".to_string(),
            name: "home".to_string(),
            kind: LocationKind::Local {
                path: "/home/user/files".to_string(),
            },
            is_read_only: false,
            is_default: true,
        };
        assert_eq!(unix.dir_separator(), '/');

        let win = Location {
            uuid: "l2".to_string(),
            name: "docs".to_string(),
            kind: LocationKind::Local {
                path: "c:\\Users\\tester".to_string(),
            },
            is_read_only: false,
            is_default: false,
        };
        assert_eq!(win.dir_separator(), '\\');
    }

    #[test]
    fn to_fs_entry_needs_no_io() {
        let loc = object_store_location();
        let entry = loc.to_fs_entry("photos/2024/trip.jpg", true);
        assert_eq!(entry.name, "trip.jpg");
        assert_eq!(entry.path, "photos/2024/trip.jpg");
        assert!(entry.is_file);
        assert!(entry.uuid.is_none());
    }

    #[test]
    fn location_round_trips_through_json() {
        let loc = object_store_location();
        let json = serde_json::to_string(&loc).unwrap();
        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);
        assert!(json.contains("\"type\":\"objectStore\""));
    }
}
