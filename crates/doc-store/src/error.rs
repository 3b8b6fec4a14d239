use thiserror::Error;

use crate::{Collection, DocumentId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// A write guard did not hold when the batch was applied. `expected`
    /// is `None` for expect-absent guards; `actual` is `None` when the
    /// document did not exist.
    #[error(
        "write conflict on {collection}/{id}: expected version {expected:?}, found {actual:?}"
    )]
    Conflict {
        collection: Collection,
        id: DocumentId,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// The batch itself was malformed (e.g. empty, or two writes to the
    /// same document).
    #[error("Invalid write batch: {0}")]
    InvalidBatch(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocStoreError {
    /// Returns true if this error is a guard conflict (safe to retry
    /// after re-reading current state).
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocStoreError::Conflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocStoreError>;
