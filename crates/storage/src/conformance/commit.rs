use std::future::Future;

use super::{make_event, make_version, seed_document, TestResult};
use crate::record::ReviewStatus;
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "commit_persists_version_review_and_event",
        commit_persists_version_review_and_event(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "abort_discards_everything",
        abort_discards_everything(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "failed_commit_applies_nothing",
        failed_commit_applies_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "stored_hashes_returned_verbatim",
        stored_hashes_returned_verbatim(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "events_listed_in_insertion_order",
        events_listed_in_insertion_order(factory).await,
    ));

    results
}

/// A version insert, review update and event insert in one transaction all
/// become visible together.
async fn commit_persists_version_review_and_event<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.insert_version(&mut tx, make_version("inv-1", 2))
        .await
        .map_err(|e| e.to_string())?;
    let mut review = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    review.review_status = ReviewStatus::PendingReview;
    review.submitted_version_id = Some("inv-1-v2".to_string());
    s.update_review(&mut tx, review, 0)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_event(&mut tx, make_event("inv-1", "evt-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    let review = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    let events = s.list_events("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 2 {
        return Err(format!("expected 2 versions, got {}", versions.len()));
    }
    if review.review_status != ReviewStatus::PendingReview || review.revision != 1 {
        return Err(format!(
            "expected pending_review at revision 1, got {} at {}",
            review.review_status, review.revision
        ));
    }
    if events.len() != 1 {
        return Err(format!("expected 1 event, got {}", events.len()));
    }
    Ok(())
}

async fn abort_discards_everything<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.insert_version(&mut tx, make_version("inv-1", 2))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_event(&mut tx, make_event("inv-1", "evt-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_transaction(tx).await.map_err(|e| e.to_string())?;

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    let events = s.list_events("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 1 || !events.is_empty() {
        return Err("aborted writes became visible".to_string());
    }
    match s.get_version("inv-1-v2").await {
        Err(StorageError::VersionNotFound { .. }) => Ok(()),
        other => Err(format!("expected VersionNotFound, got {:?}", other)),
    }
}

/// When commit fails on a stale review revision, the version and event
/// buffered in the same transaction must not be applied either.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut loser = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let review = s
        .get_review_for_update(&mut loser, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    s.insert_version(&mut loser, make_version("inv-1", 2))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_event(&mut loser, make_event("inv-1", "evt-loser"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_review(&mut loser, review.clone(), 0)
        .await
        .map_err(|e| e.to_string())?;

    // A competing writer bumps the review revision first.
    let mut winner = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.update_review(&mut winner, review, 0)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_transaction(winner)
        .await
        .map_err(|e| e.to_string())?;

    match s.commit_transaction(loser).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    let events = s.list_events("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 1 {
        return Err(format!(
            "partial commit: {} versions visible",
            versions.len()
        ));
    }
    if !events.is_empty() {
        return Err("partial commit: loser event visible".to_string());
    }
    Ok(())
}

async fn stored_hashes_returned_verbatim<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let v = s.get_version("inv-1-v1").await.map_err(|e| e.to_string())?;
    if v.snapshot_hash != "snapshot-1" || v.chain_hash != "chain-1" {
        return Err(format!(
            "hashes altered on read: {} / {}",
            v.snapshot_hash, v.chain_hash
        ));
    }
    Ok(())
}

async fn events_listed_in_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["evt-a", "evt-c", "evt-b"] {
        let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
        s.insert_event(&mut tx, make_event("inv-1", id))
            .await
            .map_err(|e| e.to_string())?;
        s.commit_transaction(tx).await.map_err(|e| e.to_string())?;
    }

    let ids: Vec<String> = s
        .list_events("inv-1")
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if ids != ["evt-a", "evt-c", "evt-b"] {
        return Err(format!("unexpected event order: {:?}", ids));
    }
    Ok(())
}
