//! Ledger error type.

use docledger_storage::{ReviewStatus, StorageError};

/// All errors surfaced by the document ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The version id is unknown, or does not belong to the named document.
    #[error("version not found: {version_id}")]
    VersionNotFound { version_id: String },

    #[error("document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    /// A `Created` version was appended to a document that already has one.
    #[error("document already exists: {document_id}")]
    DocumentAlreadyExists { document_id: String },

    /// The document is posted and locked; no further versions may be appended.
    #[error("document {document_id} is posted and locked")]
    DocumentLocked { document_id: String },

    /// The review operation is not permitted from the current status.
    #[error("cannot {operation} document {document_id} from status {status}: {reason}")]
    InvalidTransition {
        document_id: String,
        operation: &'static str,
        status: ReviewStatus,
        reason: String,
    },

    /// `reject` was called without a non-blank comment.
    #[error("a non-empty comment is required to reject document {document_id}")]
    MissingRequiredComment { document_id: String },

    /// Verification found stored hashes that do not match their content.
    #[error("chain integrity violation on document {document_id}: {findings} finding(s)")]
    ChainIntegrityViolation {
        document_id: String,
        findings: usize,
    },

    /// Version-number race that persisted through every retry.
    #[error("write conflict on document {document_id} after {attempts} attempt(s)")]
    WriteConflict { document_id: String, attempts: u32 },

    /// Two versions compared by `diff_versions` belong to different documents.
    #[error("versions {left} and {right} belong to different documents")]
    DocumentMismatch { left: String, right: String },

    /// A version was appended with an object type differing from the document's.
    #[error("document {document_id} is a '{expected}', not a '{found}'")]
    ObjectTypeMismatch {
        document_id: String,
        expected: String,
        found: String,
    },

    /// A proof bundle is malformed or could not be signed/serialized.
    #[error("proof error: {0}")]
    Proof(String),

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::VersionNotFound { version_id } => {
                LedgerError::VersionNotFound { version_id }
            }
            StorageError::ReviewNotFound { document_id } => {
                LedgerError::DocumentNotFound { document_id }
            }
            other => LedgerError::Storage(other),
        }
    }
}

impl LedgerError {
    /// Whether the error wraps a store-level write race.
    pub(crate) fn is_write_conflict(&self) -> bool {
        matches!(self, LedgerError::Storage(e) if e.is_write_conflict())
    }
}
