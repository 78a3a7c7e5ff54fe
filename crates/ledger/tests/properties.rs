//! Property-based tests for the ledger's invariants.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use docledger_ledger::{
    AppendRequest, ChangeType, DocumentLedger, DocumentSnapshot, LedgerError, ReviewStatus,
};
use docledger_storage::MemoryStorage;

const ACCOUNTING: &[&str] = &["amount", "currency", "due_date", "tax_rate", "total"];
const NON_ACCOUNTING: &[&str] = &["notes", "memo", "footer", "tags"];

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(f)
}

/// One edit: set `field` to `value`.
fn edit_strategy(fields: &'static [&'static str]) -> impl Strategy<Value = (&'static str, i64)> {
    (prop::sample::select(fields), 0i64..1_000)
}

fn any_edit() -> impl Strategy<Value = (&'static str, i64)> {
    prop_oneof![edit_strategy(ACCOUNTING), edit_strategy(NON_ACCOUNTING)]
}

fn request(change_type: ChangeType, snapshot: &DocumentSnapshot) -> AppendRequest {
    AppendRequest::new("doc", "invoice", change_type, "prop", snapshot.clone())
}

async fn accepted_ledger() -> (DocumentLedger<MemoryStorage>, DocumentSnapshot) {
    let ledger = DocumentLedger::new(Arc::new(MemoryStorage::new()));
    let mut snapshot = DocumentSnapshot::new();
    snapshot.insert("amount".to_string(), json!(100));
    snapshot.insert("notes".to_string(), json!("initial"));
    let v1 = ledger
        .append_version(request(ChangeType::Created, &snapshot))
        .await
        .unwrap();
    ledger.submit_for_review("doc", &v1.id, "prop").await.unwrap();
    ledger.accept("doc", &v1.id, "reviewer", None).await.unwrap();
    (ledger, snapshot)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Numbering is contiguous from 1 and the chain verifies after every append.
    #[test]
    fn prop_numbering_contiguous_and_chain_valid(
        edits in prop::collection::vec(any_edit(), 0..12),
    ) {
        block_on(async {
            let ledger = DocumentLedger::new(Arc::new(MemoryStorage::new()));
            let mut snapshot = DocumentSnapshot::new();
            ledger.append_version(request(ChangeType::Created, &snapshot)).await.unwrap();

            for (field, value) in &edits {
                snapshot.insert(field.to_string(), json!(value));
                ledger.append_version(request(ChangeType::Modified, &snapshot)).await.unwrap();
                prop_assert!(ledger.verify("doc").await.unwrap().valid);
            }

            let numbers: Vec<i64> = ledger
                .get_versions("doc")
                .await
                .unwrap()
                .iter()
                .map(|v| v.version_number)
                .collect();
            let expected: Vec<i64> = (1..=edits.len() as i64 + 1).collect();
            prop_assert_eq!(numbers, expected);
            Ok(())
        })?;
    }

    /// Non-accounting edits never move an accepted document out of Accepted.
    #[test]
    fn prop_non_accounting_edits_keep_acceptance(
        edits in prop::collection::vec(edit_strategy(NON_ACCOUNTING), 1..8),
    ) {
        block_on(async {
            let (ledger, mut snapshot) = accepted_ledger().await;
            for (field, value) in &edits {
                snapshot.insert(field.to_string(), json!(value));
                ledger.append_version(request(ChangeType::Modified, &snapshot)).await.unwrap();
                let review = ledger.get_review("doc").await.unwrap();
                prop_assert_eq!(review.review_status, ReviewStatus::Accepted);
                prop_assert!(review.required_actions.is_empty());
            }
            Ok(())
        })?;
    }

    /// A single accounting-impacting edit supersedes an acceptance.
    #[test]
    fn prop_accounting_edit_supersedes(
        noise in prop::collection::vec(edit_strategy(NON_ACCOUNTING), 0..4),
        (field, value) in edit_strategy(ACCOUNTING),
    ) {
        block_on(async {
            let (ledger, mut snapshot) = accepted_ledger().await;
            for (f, v) in &noise {
                snapshot.insert(f.to_string(), json!(v));
            }
            // Guarantee the accounting field actually changes.
            snapshot.insert(field.to_string(), json!(format!("changed-{value}")));
            let version = ledger
                .append_version(request(ChangeType::Modified, &snapshot))
                .await
                .unwrap();

            let review = ledger.get_review("doc").await.unwrap();
            prop_assert_eq!(review.review_status, ReviewStatus::Superseded);
            prop_assert!(!review.required_actions.is_empty());
            prop_assert_eq!(&review.required_actions[0].version_id, &version.id);
            Ok(())
        })?;
    }

    /// Blank and whitespace-only rejection comments always fail.
    #[test]
    fn prop_blank_reject_comment_fails(comment in "[ \t\r\n]{0,8}") {
        block_on(async {
            let ledger = DocumentLedger::new(Arc::new(MemoryStorage::new()));
            let v1 = ledger
                .append_version(request(ChangeType::Created, &DocumentSnapshot::new()))
                .await
                .unwrap();
            ledger.submit_for_review("doc", &v1.id, "prop").await.unwrap();
            let err = ledger.reject("doc", &v1.id, "reviewer", &comment).await.unwrap_err();
            let is_missing_comment = matches!(err, LedgerError::MissingRequiredComment { .. });
            prop_assert!(is_missing_comment);
            prop_assert_eq!(
                ledger.get_review("doc").await.unwrap().review_status,
                ReviewStatus::PendingReview
            );
            Ok(())
        })?;
    }

    /// Mutating any stored snapshot out of band is pinned to that version.
    #[test]
    fn prop_tampering_is_localised(
        len in 2usize..8,
        target in 0usize..8,
    ) {
        let target = target % len;
        block_on(async {
            let storage = Arc::new(MemoryStorage::new());
            let ledger = DocumentLedger::new(storage.clone());
            let mut snapshot = DocumentSnapshot::new();
            ledger.append_version(request(ChangeType::Created, &snapshot)).await.unwrap();
            for i in 1..len {
                snapshot.insert("amount".to_string(), json!(i));
                ledger.append_version(request(ChangeType::Modified, &snapshot)).await.unwrap();
            }

            let mut victim = ledger.get_versions("doc").await.unwrap()[target].clone();
            victim.snapshot.insert("forged".to_string(), json!(true));
            storage.overwrite_version(victim).unwrap();

            let result = ledger.verify("doc").await.unwrap();
            prop_assert!(!result.valid);
            prop_assert_eq!(result.offending_versions(), vec![target as i64 + 1]);
            Ok(())
        })?;
    }
}
