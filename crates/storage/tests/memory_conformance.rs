//! Runs the backend-agnostic conformance suite against `MemoryStorage`, plus
//! checks for the memory backend's out-of-band write path.

use docledger_storage::conformance::run_conformance_suite;
use docledger_storage::{LedgerStorage, MemoryStorage, ReviewRecord, StorageError, VersionRecord};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_storage_passes_conformance() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    assert!(report.total > 0, "suite ran no tests");
    assert_eq!(report.failed, 0, "{report}");
}

fn version(id: &str, n: i64) -> VersionRecord {
    VersionRecord {
        id: id.to_string(),
        document_id: "inv-1".to_string(),
        object_type: "invoice".to_string(),
        version_number: n,
        change_type: docledger_storage::ChangeType::Created,
        change_reason: None,
        changed_by: "alice".to_string(),
        changed_at: time::OffsetDateTime::UNIX_EPOCH,
        snapshot: Default::default(),
        changed_fields: Default::default(),
        change_severity: docledger_storage::ChangeSeverity::None,
        snapshot_hash: "aa".to_string(),
        chain_hash: "bb".to_string(),
    }
}

#[tokio::test]
async fn overwrite_version_replaces_stored_record() {
    let s = MemoryStorage::new();
    let mut tx = s.begin_transaction().await.unwrap();
    s.insert_version(&mut tx, version("v1", 1)).await.unwrap();
    s.insert_review(&mut tx, ReviewRecord::new("inv-1"))
        .await
        .unwrap();
    s.commit_transaction(tx).await.unwrap();

    let mut tampered = version("v1", 1);
    tampered.snapshot_hash = "ff".to_string();
    s.overwrite_version(tampered).unwrap();

    assert_eq!(s.get_version("v1").await.unwrap().snapshot_hash, "ff");
    assert_eq!(s.list_versions("inv-1").await.unwrap()[0].snapshot_hash, "ff");
}

#[tokio::test]
async fn overwrite_unknown_version_fails() {
    let s = MemoryStorage::new();
    let err = s.overwrite_version(version("ghost", 1)).unwrap_err();
    assert!(matches!(err, StorageError::VersionNotFound { .. }));
}

#[test]
fn write_conflicts_are_retryable() {
    assert!(StorageError::DuplicateVersion {
        document_id: "d".into(),
        version_number: 2
    }
    .is_write_conflict());
    assert!(StorageError::ConcurrentConflict {
        document_id: "d".into(),
        expected_revision: 0
    }
    .is_write_conflict());
    assert!(StorageError::AlreadyInitialized {
        document_id: "d".into()
    }
    .is_write_conflict());
    assert!(!StorageError::Backend("boom".into()).is_write_conflict());
}
