//! TagSpaces Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! path handling shared across all TagSpaces components: locations, file
//! system entries, sidecar metadata models, and the revision filename codec.
//!
//! # Sidecar layout
//!
//! Metadata never modifies user files. Each directory may contain a hidden
//! `.ts` folder holding per-entry JSON sidecars (`<fileName>.json`), a
//! per-directory sidecar (`tsm.json`), and per-entry revision folders keyed
//! by the entry's uuid. Path derivation is centralized in the `paths`
//! module so all backends stay consistent.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod paths;
pub mod revisions;

// Re-export commonly used types
pub use config::LocationsConfig;
pub use error::{CoreError, CoreResult};
pub use models::{
    EntryMeta, FileSystemEntry, Location, LocationKind, LocationType, Tag,
};
pub use revisions::{parse_revision_lmdt, revision_file_name};
