use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{DomainEventRecord, ReviewRecord, VersionRecord};

/// The storage trait for document ledger backends.
///
/// A `LedgerStorage` implementation provides durable, transactional storage
/// for document versions, review records, and domain events.
///
/// ## Transaction Semantics
///
/// All mutating operations take `&mut Self::Transaction`. The lifecycle is:
///
/// 1. `begin_transaction()`: start a transaction
/// 2. Call mutating methods with `&mut tx`
/// 3. `commit_transaction(tx)`: commit and consume the transaction
///    OR `abort_transaction(tx)`: roll back and consume the transaction
///
/// If a `Transaction` is dropped without committing, the underlying
/// transaction MUST be rolled back. A commit applies every buffered write or
/// none of them.
///
/// ## Uniqueness and Conflict Detection
///
/// `(document_id, version_number)` is uniquely indexed. A second insert for
/// the same slot fails with `StorageError::DuplicateVersion`, either at
/// `insert_version` or at commit if the competing writer committed first.
///
/// `update_review` performs an optimistic check:
/// `UPDATE WHERE revision = expected_revision`. A stale revision fails with
/// `StorageError::ConcurrentConflict`.
///
/// ## Stored hashes
///
/// `snapshot_hash` and `chain_hash` are persisted verbatim and returned as
/// stored. Backends never recompute them on read.
#[async_trait]
pub trait LedgerStorage: Send + Sync + 'static {
    /// The transaction type used by this storage backend.
    type Transaction: Send;

    // ── Transaction lifecycle ─────────────────────────────────────────────────

    async fn begin_transaction(&self) -> Result<Self::Transaction, StorageError>;

    async fn commit_transaction(&self, tx: Self::Transaction) -> Result<(), StorageError>;

    async fn abort_transaction(&self, tx: Self::Transaction) -> Result<(), StorageError>;

    // ── Writes (within transaction) ───────────────────────────────────────────

    /// Read the highest-numbered version of a document, including versions
    /// inserted earlier in this transaction.
    async fn latest_version(
        &self,
        tx: &mut Self::Transaction,
        document_id: &str,
    ) -> Result<Option<VersionRecord>, StorageError>;

    /// Insert a new version. Fails with `DuplicateVersion` if the
    /// `(document_id, version_number)` slot is taken.
    async fn insert_version(
        &self,
        tx: &mut Self::Transaction,
        record: VersionRecord,
    ) -> Result<(), StorageError>;

    /// Create the review record of a document.
    ///
    /// Returns `Err(StorageError::AlreadyInitialized)` if one exists.
    async fn insert_review(
        &self,
        tx: &mut Self::Transaction,
        record: ReviewRecord,
    ) -> Result<(), StorageError>;

    /// Read a document's review record for a subsequent `update_review`.
    ///
    /// Returns `Err(StorageError::ReviewNotFound)` if none exists.
    async fn get_review_for_update(
        &self,
        tx: &mut Self::Transaction,
        document_id: &str,
    ) -> Result<ReviewRecord, StorageError>;

    /// Replace a review record if its stored revision equals
    /// `expected_revision`. Returns the new revision.
    async fn update_review(
        &self,
        tx: &mut Self::Transaction,
        record: ReviewRecord,
        expected_revision: i64,
    ) -> Result<i64, StorageError>;

    /// Append a domain event.
    async fn insert_event(
        &self,
        tx: &mut Self::Transaction,
        record: DomainEventRecord,
    ) -> Result<(), StorageError>;

    // ── Queries (outside transaction) ─────────────────────────────────────────

    /// All versions of a document, ascending by `version_number`. Empty if the
    /// document does not exist.
    async fn list_versions(&self, document_id: &str) -> Result<Vec<VersionRecord>, StorageError>;

    /// Read a version by id.
    ///
    /// Returns `Err(StorageError::VersionNotFound)` if not found.
    async fn get_version(&self, version_id: &str) -> Result<VersionRecord, StorageError>;

    /// Read a document's review record without locking.
    ///
    /// Returns `Err(StorageError::ReviewNotFound)` if none exists.
    async fn get_review(&self, document_id: &str) -> Result<ReviewRecord, StorageError>;

    /// All events of a document in insertion order.
    async fn list_events(&self, document_id: &str)
        -> Result<Vec<DomainEventRecord>, StorageError>;
}
