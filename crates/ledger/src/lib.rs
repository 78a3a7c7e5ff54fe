//! Tamper-evident document version ledger with a review workflow.
//!
//! Every save of a business document (invoice, bill, ...) appends an
//! immutable, hash-chained [`VersionRecord`](docledger_storage::VersionRecord).
//! A per-document review record tracks acceptance, and accounting-impacting
//! edits after acceptance automatically supersede it. [`DocumentLedger`] is
//! the entry point; persistence is provided by any
//! [`LedgerStorage`](docledger_storage::LedgerStorage) backend.

pub mod audit;
pub mod chain;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod lock;
pub mod proof;
pub mod registry;
pub mod review;
pub mod verify;

pub use audit::{diff_snapshots, AuditTrail, EditCheck, FieldChange, VersionDiff};
pub use chain::AppendRequest;
pub use classifier::Classification;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LedgerConfig, LedgerSettings};
pub use error::LedgerError;
pub use ledger::DocumentLedger;
pub use lock::{NeverLocked, PostingLock, StaticLocks};
pub use proof::{
    compute_etag, key_fingerprint, verify_proof, Attestation, ProofBody, ProofBundle,
    ProofVerification, SignatureStatus,
};
pub use registry::{FieldClass, FieldRegistry};
pub use verify::{verify_chain, ChainFinding, FindingKind, VerificationResult};

pub use docledger_storage::{
    ChangeSeverity, ChangeType, DocumentSnapshot, DomainEventRecord, ReviewRecord, ReviewStatus,
    VersionRecord,
};
