//! Sidecar metadata models.
//!
//! Sidecars are plain JSON files written through the same storage
//! primitives as user content; there is no special format handling beyond
//! the derived path (see `paths::get_meta_file_location_for_file`).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Tag;

/// Per-entry sidecar content: stable id, tags, and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Millis since epoch of the last sidecar update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl EntryMeta {
    pub fn new(id: impl Into<String>) -> Self {
        EntryMeta {
            id: id.into(),
            tags: Vec::new(),
            description: String::new(),
            app_version: None,
            last_updated: Some(Utc::now().timestamp_millis()),
        }
    }

    /// Fresh sidecar with a newly generated id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_round_trips_through_json() {
        let mut meta = EntryMeta::new("e3b0c442");
        meta.tags.push(Tag::new("vacation"));
        meta.description = "trip photos".to_string();

        let json = serde_json::to_string(&meta).unwrap();
        let back: EntryMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn empty_fields_are_omitted() {
        let meta = EntryMeta {
            id: "abc".to_string(),
            tags: Vec::new(),
            description: String::new(),
            app_version: None,
            last_updated: None,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, "{\"id\":\"abc\"}");
    }
}
