use std::sync::Arc;

use ed25519_dalek::SigningKey;
use serde_json::json;

use docledger_ledger::{
    verify_proof, AppendRequest, ChangeType, DocumentLedger, DocumentSnapshot, ProofBundle,
    SignatureStatus,
};
use docledger_storage::MemoryStorage;

fn snap(v: serde_json::Value) -> DocumentSnapshot {
    serde_json::from_value(v).unwrap()
}

async fn seeded() -> (Arc<MemoryStorage>, DocumentLedger<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let ledger = DocumentLedger::new(storage.clone());
    let v1 = ledger
        .append_version(AppendRequest::new(
            "BILL-7",
            "invoice",
            ChangeType::Created,
            "alice",
            snap(json!({"amount": 40, "line_items": [{"sku": "A", "qty": 2}]})),
        ))
        .await
        .unwrap();
    ledger.submit_for_review("BILL-7", &v1.id, "alice").await.unwrap();
    ledger.accept("BILL-7", &v1.id, "bob", None).await.unwrap();
    ledger
        .append_version(AppendRequest::new(
            "BILL-7",
            "invoice",
            ChangeType::Issued,
            "alice",
            snap(json!({"amount": 40, "line_items": [{"sku": "A", "qty": 3}]})),
        ))
        .await
        .unwrap();
    (storage, ledger)
}

#[tokio::test]
async fn offline_verdict_matches_audit_trail() {
    let (_, ledger) = seeded().await;
    let key = SigningKey::generate(&mut rand::rngs::OsRng);
    let trail = ledger.get_audit_trail("BILL-7").await.unwrap();
    let proof = ledger.export_proof("BILL-7", Some(&key)).await.unwrap();

    // Only the serialized form crosses the trust boundary.
    let wire = proof.to_json_pretty().unwrap();
    let received = ProofBundle::from_json(&wire).unwrap();
    let report = verify_proof(&received, Some(&key.verifying_key())).unwrap();

    assert_eq!(report.chain.valid, trail.verification.valid);
    assert!(report.valid(), "{report:?}");
    assert!(matches!(report.signature, SignatureStatus::Valid { .. }));
    assert_eq!(received.bundle.versions.len(), 2);
    assert_eq!(received.bundle.object_type.as_deref(), Some("invoice"));
}

#[tokio::test]
async fn corrupted_store_exports_a_consistently_invalid_proof() {
    let (storage, ledger) = seeded().await;
    let mut v2 = ledger.get_versions("BILL-7").await.unwrap()[1].clone();
    v2.snapshot.insert("amount".to_string(), json!(4000));
    storage.overwrite_version(v2).unwrap();

    let trail = ledger.get_audit_trail("BILL-7").await.unwrap();
    assert!(!trail.verification.valid);

    let proof = ledger.export_proof("BILL-7", None).await.unwrap();
    let report = verify_proof(&proof, None).unwrap();
    assert!(report.etag_matches);
    assert!(report.verdict_matches);
    assert_eq!(report.chain, trail.verification);
    assert!(!report.valid());
}

#[tokio::test]
async fn editing_the_exported_json_is_detected() {
    let (_, ledger) = seeded().await;
    let proof = ledger.export_proof("BILL-7", None).await.unwrap();
    let wire = proof.to_json_pretty().unwrap().replace("\"qty\": 3", "\"qty\": 30");
    let received = ProofBundle::from_json(&wire).unwrap();
    let report = verify_proof(&received, None).unwrap();
    assert!(!report.etag_matches);
    assert_eq!(report.chain.offending_versions(), vec![2]);
    assert!(!report.valid());
}
