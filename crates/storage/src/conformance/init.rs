use std::future::Future;

use super::{make_version, seed_document, TestResult};
use crate::record::{ReviewRecord, ReviewStatus};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_review_creates_draft",
        insert_review_creates_draft(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_review_twice_returns_already_initialized",
        insert_review_twice_returns_already_initialized(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_review_twice_same_transaction_fails",
        insert_review_twice_same_transaction_fails(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "first_version_is_listed",
        first_version_is_listed(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "documents_are_independent",
        documents_are_independent(factory).await,
    ));

    results
}

/// A committed review record reads back at Draft, revision 0.
async fn insert_review_creates_draft<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let review = s.get_review("inv-1").await.map_err(|e| e.to_string())?;
    if review.review_status != ReviewStatus::Draft {
        return Err(format!("expected draft, got {}", review.review_status));
    }
    if review.revision != 0 {
        return Err(format!("expected revision 0, got {}", review.revision));
    }
    Ok(())
}

async fn insert_review_twice_returns_already_initialized<S, F, Fut>(
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
    let result = s.insert_review(&mut tx, ReviewRecord::new("inv-1")).await;
    let result = match result {
        Ok(()) => s.commit_transaction(tx).await,
        Err(e) => {
            let _ = s.abort_transaction(tx).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::AlreadyInitialized { document_id }) if document_id == "inv-1" => Ok(()),
        other => Err(format!("expected AlreadyInitialized(inv-1), got {:?}", other)),
    }
}

async fn insert_review_twice_same_transaction_fails<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    s.insert_review(&mut tx, ReviewRecord::new("inv-1"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s.insert_review(&mut tx, ReviewRecord::new("inv-1")).await;
    let _ = s.abort_transaction(tx).await;
    match second {
        Err(StorageError::AlreadyInitialized { .. }) => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {:?}", other)),
    }
}

async fn first_version_is_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 1 {
        return Err(format!("expected 1 version, got {}", versions.len()));
    }
    if versions[0] != make_version("inv-1", 1) {
        return Err("stored version differs from inserted version".to_string());
    }
    Ok(())
}

async fn documents_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;
    seed_document(&s, "inv-2").await?;

    for doc in ["inv-1", "inv-2"] {
        let versions = s.list_versions(doc).await.map_err(|e| e.to_string())?;
        if versions.len() != 1 || versions[0].document_id != doc {
            return Err(format!("{doc}: expected exactly its own version 1"));
        }
    }
    Ok(())
}
