//! Operation-level error types.

use thiserror::Error;

use tagspaces_storage::StorageError;

#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type OpsResult<T> = Result<T, OpsError>;
