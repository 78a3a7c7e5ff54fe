use std::future::Future;

use super::TestResult;
use crate::record::ReviewRecord;
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_version_nonexistent",
        get_version_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_review_nonexistent",
        get_review_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_review_for_update_nonexistent",
        get_review_for_update_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_review_nonexistent",
        update_review_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_versions_empty_for_nonexistent",
        list_versions_empty_for_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_events_empty_for_nonexistent",
        list_events_empty_for_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "latest_version_none_for_nonexistent",
        latest_version_none_for_nonexistent(factory).await,
    ));

    results
}

async fn get_version_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_version("no-such-version").await {
        Err(StorageError::VersionNotFound { version_id }) if version_id == "no-such-version" => {
            Ok(())
        }
        other => Err(format!("expected VersionNotFound, got {:?}", other)),
    }
}

async fn get_review_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_review("inv-404").await {
        Err(StorageError::ReviewNotFound { document_id }) if document_id == "inv-404" => Ok(()),
        other => Err(format!("expected ReviewNotFound, got {:?}", other)),
    }
}

async fn get_review_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let result = s.get_review_for_update(&mut tx, "inv-404").await;
    let _ = s.abort_transaction(tx).await;
    match result {
        Err(StorageError::ReviewNotFound { .. }) => Ok(()),
        other => Err(format!("expected ReviewNotFound, got {:?}", other)),
    }
}

async fn update_review_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let result = s
        .update_review(&mut tx, ReviewRecord::new("inv-404"), 0)
        .await;
    let _ = s.abort_transaction(tx).await;
    match result {
        Err(StorageError::ReviewNotFound { .. }) => Ok(()),
        other => Err(format!("expected ReviewNotFound, got {:?}", other)),
    }
}

async fn list_versions_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let versions = s.list_versions("inv-404").await.map_err(|e| e.to_string())?;
    if !versions.is_empty() {
        return Err(format!("expected no versions, got {}", versions.len()));
    }
    Ok(())
}

async fn list_events_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let events = s.list_events("inv-404").await.map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("expected no events, got {}", events.len()));
    }
    Ok(())
}

async fn latest_version_none_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let latest = s.latest_version(&mut tx, "inv-404").await;
    let _ = s.abort_transaction(tx).await;
    match latest {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}
