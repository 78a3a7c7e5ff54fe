use std::future::Future;

use super::{make_event, make_version, seed_document, TestResult};
use crate::LedgerStorage;

pub(super) async fn run_isolation_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "isolation",
        "uncommitted_version_invisible",
        uncommitted_version_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "uncommitted_event_invisible",
        uncommitted_event_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "latest_version_sees_own_writes",
        latest_version_sees_own_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "review_for_update_sees_own_writes",
        review_for_update_sees_own_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "dropped_transaction_rolls_back",
        dropped_transaction_rolls_back(factory).await,
    ));

    results
}

async fn uncommitted_version_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let visible = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    s.abort_transaction(tx).await.map_err(|e| e.to_string())?;
    if visible.len() != 1 {
        return Err(format!(
            "uncommitted version leaked: saw {} versions",
            visible.len()
        ));
    }
    Ok(())
}

async fn uncommitted_event_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.insert_event(&mut tx, make_event("inv-1", "evt-1"))
        .await
        .map_err(|e| e.to_string())?;

    let before = s.list_events("inv-1").await.map_err(|e| e.to_string())?;
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;
    let after = s.list_events("inv-1").await.map_err(|e| e.to_string())?;

    if !before.is_empty() {
        return Err("uncommitted event visible before commit".to_string());
    }
    if after.len() != 1 {
        return Err(format!("expected 1 event after commit, got {}", after.len()));
    }
    Ok(())
}

async fn latest_version_sees_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let latest = s
        .latest_version(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_transaction(tx).await.map_err(|e| e.to_string())?;

    match latest {
        Some(v) if v.version_number == 2 => Ok(()),
        other => Err(format!(
            "expected latest version 2, got {:?}",
            other.map(|v| v.version_number)
        )),
    }
}

async fn review_for_update_sees_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    review.review_comment = Some("pending".to_string());
    s.update_review(&mut tx, review, 0)
        .await
        .map_err(|e| e.to_string())?;
    let reread = s
        .get_review_for_update(&mut tx, "inv-1")
        .await
        .map_err(|e| e.to_string())?;
    let outside = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    s.abort_transaction(tx).await.map_err(|e| e.to_string())?;

    if reread.review_comment.as_deref() != Some("pending") || reread.revision != 1 {
        return Err("transaction did not observe its own review update".to_string());
    }
    if outside.review_comment.is_some() {
        return Err("uncommitted review update visible outside transaction".to_string());
    }
    Ok(())
}

async fn dropped_transaction_rolls_back<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    {
        let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
        s.insert_version(&mut tx, make_version("inv-1", 2))
            .await
            .map_err(|e| e.to_string())?;
    }

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 1 {
        return Err(format!(
            "dropped transaction persisted writes: {} versions",
            versions.len()
        ));
    }
    Ok(())
}
