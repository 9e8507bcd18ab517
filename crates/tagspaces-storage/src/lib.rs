//! TagSpaces Storage Library
//!
//! This crate provides the storage abstraction and backend implementations
//! for TagSpaces locations. It includes the [`StorageAdapter`] trait and
//! adapters for the local filesystem, S3-compatible object stores, and
//! WebDAV shares.
//!
//! # Contracts shared by all adapters
//!
//! - Paths are backend-native: OS paths for local, bucket-relative keys
//!   for object stores, share-relative paths for WebDAV.
//! - Every method returns a kind-tagged `StorageError`; callers match on
//!   the variant, never on message strings.
//! - Text reads return raw bytes-as-text; BOM stripping is a caller
//!   concern (`tagspaces_core::paths::strip_bom`).
//! - There is no move primitive. Moving is copy-then-delete, owned by the
//!   transfer orchestrator, so a crash mid-operation never loses the
//!   source.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
#[cfg(feature = "storage-webdav")]
pub mod webdav;

// Re-export commonly used types
pub use factory::create_adapter;
#[cfg(feature = "storage-local")]
pub use local::LocalAdapter;
#[cfg(feature = "storage-s3")]
pub use s3::ObjectStoreAdapter;
pub use tagspaces_core::LocationType;
pub use traits::{ByteStream, StorageAdapter, StorageError, StorageResult};
#[cfg(feature = "storage-webdav")]
pub use webdav::WebDavAdapter;
