//! Conformance test suite for `LedgerStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `LedgerStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Initialization**: review record creation, duplicate detection
//! - **Isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for multi-record transactions
//! - **Version uniqueness**: `(document_id, version_number)` slot conflicts
//! - **Review revisions**: optimistic revision checks on review updates
//! - **Error handling**: correct error variants for missing records
//! - **Concurrency**: racing writers on one slot, independent documents
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use docledger_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod init;
mod isolation;
mod review;
mod version;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;

use time::macros::datetime;

use crate::record::{ChangeSeverity, ChangeType, DomainEventRecord, ReviewRecord, VersionRecord};
use crate::LedgerStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "isolation", "commit").
    pub category: String,
    /// Test name (e.g. "insert_review_creates_draft").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(isolation::run_isolation_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(review::run_review_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_version(document_id: &str, version_number: i64) -> VersionRecord {
    let mut snapshot = BTreeMap::new();
    snapshot.insert("amount".to_string(), serde_json::json!(100 * version_number));
    VersionRecord {
        id: format!("{document_id}-v{version_number}"),
        document_id: document_id.to_string(),
        object_type: "invoice".to_string(),
        version_number,
        change_type: if version_number == 1 {
            ChangeType::Created
        } else {
            ChangeType::Modified
        },
        change_reason: None,
        changed_by: "test-actor".to_string(),
        changed_at: datetime!(2025-01-01 00:00:00 UTC),
        snapshot,
        changed_fields: BTreeSet::new(),
        change_severity: ChangeSeverity::None,
        snapshot_hash: format!("snapshot-{version_number}"),
        chain_hash: format!("chain-{version_number}"),
    }
}

fn make_event(document_id: &str, id: &str) -> DomainEventRecord {
    DomainEventRecord {
        id: id.to_string(),
        document_id: document_id.to_string(),
        event_type: "test_event".to_string(),
        actor: "test-actor".to_string(),
        created_at: datetime!(2025-01-01 00:00:00 UTC),
        payload: serde_json::json!({"test": true}),
        payload_hash: "payload-hash".to_string(),
    }
}

/// Commit version 1 and a fresh review record for `document_id`.
async fn seed_document<S: LedgerStorage>(s: &S, document_id: &str) -> Result<(), String> {
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.insert_version(&mut tx, make_version(document_id, 1))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_review(&mut tx, ReviewRecord::new(document_id))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_transaction(tx).await.map_err(|e| e.to_string())
}
