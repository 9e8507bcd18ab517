//! File system entries and tags.

use serde::{Deserialize, Serialize};

/// A tag attached to an entry. Tags are unique by title within one entry
/// and keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<String>,
}

impl Tag {
    pub fn new(title: impl Into<String>) -> Self {
        Tag {
            title: title.into(),
            color: None,
            text_color: None,
            tag_type: None,
        }
    }
}

/// A file or directory inside a location.
///
/// `uuid` is the stable per-entry identifier used for sidecar metadata and
/// revision naming. It is read from the sidecar, never derived from the
/// path, so revisions and tags survive a rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub name: String,
    /// Absolute path using the owning location's separator convention.
    pub path: String,
    pub is_file: bool,
    #[serde(default)]
    pub size: u64,
    /// Last modified timestamp in milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmdt: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl FileSystemEntry {
    /// Add a tag, keeping titles unique and insertion order stable.
    pub fn add_tag(&mut self, tag: Tag) {
        if !self.tags.iter().any(|t| t.title == tag.title) {
            self.tags.push(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_unique_by_title() {
        let mut entry = FileSystemEntry {
            uuid: None,
            name: "notes.md".to_string(),
            path: "/docs/notes.md".to_string(),
            is_file: true,
            size: 120,
            lmdt: Some(1_700_000_000_000),
            tags: Vec::new(),
        };
        entry.add_tag(Tag::new("work"));
        entry.add_tag(Tag::new("urgent"));
        entry.add_tag(Tag::new("work"));
        let titles: Vec<&str> = entry.tags.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["work", "urgent"]);
    }
}
