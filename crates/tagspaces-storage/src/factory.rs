//! Adapter selection.
//!
//! The match over `LocationKind` is exhaustive on purpose: adding a new
//! backend variant fails to compile until an adapter is wired up here.

use std::sync::Arc;

use crate::{StorageAdapter, StorageResult};
use tagspaces_core::{Location, LocationKind};

/// Create the storage adapter for one configured location.
pub fn create_adapter(location: &Location) -> StorageResult<Arc<dyn StorageAdapter>> {
    match &location.kind {
        #[cfg(feature = "storage-local")]
        LocationKind::Local { .. } => Ok(Arc::new(crate::LocalAdapter::new())),

        #[cfg(not(feature = "storage-local"))]
        LocationKind::Local { .. } => Err(crate::StorageError::Config(
            "local backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        LocationKind::ObjectStore {
            bucket_name,
            region,
            endpoint_url,
            ..
        } => {
            let adapter = crate::ObjectStoreAdapter::new(
                bucket_name.clone(),
                region.clone(),
                endpoint_url.clone(),
            )?;
            Ok(Arc::new(adapter))
        }

        #[cfg(not(feature = "storage-s3"))]
        LocationKind::ObjectStore { .. } => Err(crate::StorageError::Config(
            "object store backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-webdav")]
        LocationKind::WebDav {
            endpoint_url,
            username,
            password,
            ..
        } => {
            let adapter = crate::WebDavAdapter::new(
                endpoint_url.clone(),
                username.clone(),
                password.clone(),
            )?;
            Ok(Arc::new(adapter))
        }

        #[cfg(not(feature = "storage-webdav"))]
        LocationKind::WebDav { .. } => Err(crate::StorageError::Config(
            "WebDAV backend not available (storage-webdav feature not enabled)".to_string(),
        )),
    }
}
