use std::future::Future;

use super::{make_version, seed_document, TestResult};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "versions_listed_ascending",
        versions_listed_ascending(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "duplicate_slot_against_committed_rejected",
        duplicate_slot_against_committed_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "duplicate_slot_within_transaction_rejected",
        duplicate_slot_within_transaction_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "two_transactions_race_one_wins",
        two_transactions_race_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "after_race_slot_holds_winner",
        after_race_slot_holds_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "get_version_by_id",
        get_version_by_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "same_number_different_documents_allowed",
        same_number_different_documents_allowed(factory).await,
    ));

    results
}

async fn versions_listed_ascending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    for n in [3, 2, 4] {
        s.insert_version(&mut tx, make_version("inv-1", n))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;

    let numbers: Vec<i64> = s
        .list_versions("inv-1")
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .map(|v| v.version_number)
        .collect();
    if numbers != [1, 2, 3, 4] {
        return Err(format!("expected [1, 2, 3, 4], got {:?}", numbers));
    }
    Ok(())
}

async fn duplicate_slot_against_committed_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut dup = make_version("inv-1", 1);
    dup.id = "inv-1-v1-again".to_string();
    let mut tx = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let result = match s.insert_version(&mut tx, dup).await {
        Ok(()) => s.commit_transaction(tx).await,
        Err(e) => {
            let _ = s.abort_transaction(tx).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::DuplicateVersion {
            document_id,
            version_number,
        }) if document_id == "inv-1" && version_number == 1 => Ok(()),
        other => Err(format!("expected DuplicateVersion(inv-1, 1), got {:?}", other)),
    }
}

async fn duplicate_slot_within_transaction_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let mut again = make_version("inv-1", 2);
    again.id = "inv-1-v2-again".to_string();
    let second = s.insert_version(&mut tx, again).await;
    let _ = s.abort_transaction(tx).await;
    match second {
        Err(StorageError::DuplicateVersion { .. }) => Ok(()),
        other => Err(format!("expected DuplicateVersion, got {:?}", other)),
    }
}

/// Two open transactions both claim slot 2. Whoever commits first wins; the
/// other commit fails with DuplicateVersion.
async fn two_transactions_race_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut a = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut va = make_version("inv-1", 2);
    va.id = "writer-a".to_string();
    let mut vb = make_version("inv-1", 2);
    vb.id = "writer-b".to_string();
    s.insert_version(&mut a, va)
        .await
        .map_err(|e| e.to_string())?;

    // b may be rejected at insert or at commit, depending on the backend.
    let b_result = match s.insert_version(&mut b, vb).await {
        Ok(()) => {
            s.commit_transaction(a).await.map_err(|e| e.to_string())?;
            s.commit_transaction(b).await
        }
        Err(e) => {
            let _ = s.abort_transaction(b).await;
            s.commit_transaction(a).await.map_err(|e| e.to_string())?;
            Err(e)
        }
    };

    match b_result {
        Err(StorageError::DuplicateVersion { .. }) => Ok(()),
        other => Err(format!("expected loser DuplicateVersion, got {:?}", other)),
    }
}

async fn after_race_slot_holds_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;

    let mut a = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_transaction().await.map_err(|e| e.to_string())?;
    let mut va = make_version("inv-1", 2);
    va.id = "writer-a".to_string();
    let mut vb = make_version("inv-1", 2);
    vb.id = "writer-b".to_string();
    s.insert_version(&mut b, vb)
        .await
        .map_err(|e| e.to_string())?;
    let a_inserted = s.insert_version(&mut a, va).await.is_ok();
    s.commit_transaction(b).await.map_err(|e| e.to_string())?;
    if a_inserted {
        let _ = s.commit_transaction(a).await;
    } else {
        let _ = s.abort_transaction(a).await;
    }

    let versions = s.list_versions("inv-1").await.map_err(|e| e.to_string())?;
    if versions.len() != 2 {
        return Err(format!("expected 2 versions, got {}", versions.len()));
    }
    if versions[1].id != "writer-b" {
        return Err(format!("expected writer-b in slot 2, got {}", versions[1].id));
    }
    Ok(())
}

async fn get_version_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.commit_transaction(tx).await.map_err(|e| e.to_string())?;

    let v = s.get_version("inv-1-v2").await.map_err(|e| e.to_string())?;
    if v.version_number != 2 || v.document_id != "inv-1" {
        return Err(format!(
            "wrong version returned: {}#{}",
            v.document_id, v.version_number
        ));
    }
    Ok(())
}

async fn same_number_different_documents_allowed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_document(&s, "inv-1").await?;
    seed_document(&s, "inv-2").await
}
