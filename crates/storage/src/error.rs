/// All errors that can be returned by a LedgerStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Unique-constraint violation on `(document_id, version_number)`. Another
    /// writer claimed the slot first; the caller should re-read the latest
    /// version and retry.
    #[error("duplicate version {version_number} for document {document_id}")]
    DuplicateVersion {
        document_id: String,
        version_number: i64,
    },

    /// Optimistic concurrency conflict on a review record. The stored
    /// revision no longer matches the revision the caller read.
    #[error("concurrent conflict on review {document_id}: expected revision {expected_revision}")]
    ConcurrentConflict {
        document_id: String,
        expected_revision: i64,
    },

    /// No version with the given id.
    #[error("version not found: {version_id}")]
    VersionNotFound { version_id: String },

    /// No review record exists for the document.
    #[error("review not found for document {document_id}")]
    ReviewNotFound { document_id: String },

    /// A review record already exists for the document.
    #[error("review already initialized for document {document_id}")]
    AlreadyInitialized { document_id: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the error is a write race that a fresh read-and-retry can resolve.
    ///
    /// `AlreadyInitialized` counts: two writers creating the same document
    /// race on the review record as well as on version slot 1.
    pub fn is_write_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::DuplicateVersion { .. }
                | StorageError::ConcurrentConflict { .. }
                | StorageError::AlreadyInitialized { .. }
        )
    }
}
