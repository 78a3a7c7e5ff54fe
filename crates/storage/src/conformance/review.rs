use std::future::Future;

use super::{seed_document, TestResult};
use crate::record::ReviewStatus;
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_review_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "review",
        "update_with_current_revision_succeeds",
        update_with_current_revision_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "review",
        "update_with_stale_revision_conflicts",
        update_with_stale_revision_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "review",
        "conflict_has_correct_fields",
        conflict_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "review",
        "conflict_does_not_change_review",
        conflict_does_not_change_review(factory).await,
    ));
    results.push(TestResult::from_result(
        "review",
        "second_update_same_transaction_uses_new_revision",
        second_update_same_transaction_uses_new_revision(factory).await,
    ));

    results
}

async fn update_with_current_revision_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut review = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    review.review_status = ReviewStatus::PendingReview;
    let new_revision = s
        .update_review(&mut tx, review, 0)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;

    if new_revision != 1 {
        return Err(format!("expected new revision 1, got {}", new_revision));
    }
    let stored = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    if stored.revision != 1 || stored.review_status != ReviewStatus::PendingReview {
        return Err("update not persisted".to_string());
    }
    Ok(())
}

async fn update_with_stale_revision_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let review = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    let result = s.update_review(&mut tx, review, 7).await;
    let _ = s.abort_transaction(tx).await;
    match result {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-9").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let review = s
        .get_review_for_update(&mut tx, "inv-9")
        .await
        .map_err(|e| e.to_string())?;
    let result = s.update_review(&mut tx, review, 3).await;
    let _ = s.abort_transaction(tx).await;
    match result {
        Err(StorageError::ConcurrentConflict {
            document_id,
            expected_revision,
        }) => {
            if document_id != "inv-9" {
                return Err(format!("expected document_id inv-9, got {}", document_id));
            }
            if expected_revision != 3 {
                return Err(format!(
                    "expected expected_revision 3, got {}",
                    expected_revision
                ));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

async fn conflict_does_not_change_review<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut review = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    review.review_status = ReviewStatus::Accepted;
    let _ = s.update_review(&mut tx, review, 5).await;
    let _ = s.commit_transaction(tx).await;

    let stored = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    if stored.review_status != ReviewStatus::Draft || stored.revision != 0 {
        return Err(format!(
            "conflicting update leaked: {} at revision {}",
            stored.review_status, stored.revision
        ));
    }
    Ok(())
}

async fn second_update_same_transaction_uses_new_revision<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let review = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    let r1 = s
        .update_review(&mut tx, review.clone(), 0)
        .await
        .map_err(|e| e.to_string())?;
    let r2 = s
        .update_review(&mut tx, review, r1)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;

    if (r1, r2) != (1, 2) {
        return Err(format!("expected revisions (1, 2), got ({}, {})", r1, r2));
    }
    let stored = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    if stored.revision != 2 {
        return Err(format!("expected stored revision 2, got {}", stored.revision));
    }
    Ok(())
}
