use std::future::Future;
use std::sync::Arc;

use super::{make_version, seed_document, TestResult};
use crate::{LedgerStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

/// Retry ceiling for the append-with-retry test.
const MAX_ATTEMPTS: usize = 100;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_same_slot_exactly_one_wins",
        concurrent_inserts_same_slot_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_different_documents_all_succeed",
        concurrent_inserts_different_documents_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_appends_with_retry_stay_contiguous",
        concurrent_appends_with_retry_stay_contiguous(factory).await,
    ));

    results
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks each open a transaction and claim version 2 of the same document.
/// Exactly one commit succeeds; the rest must get DuplicateVersion.
async fn concurrent_inserts_same_slot_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_document(storage.as_ref(), "inv-1").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = s.begin_transaction().await?;
            let mut record = make_version("inv-1", 2);
            record.id = format!("writer-{i}");
            match s.insert_version(&mut tx, record).await {
                Ok(()) => match s.commit_transaction(tx).await {
                    Ok(()) => Ok(true),
                    Err(StorageError::DuplicateVersion { .. }) => Ok(false),
                    Err(e) => Err(e),
                },
                Err(StorageError::DuplicateVersion { .. }) => {
                    s.abort_transaction(tx).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_transaction(tx).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

/// N tasks each append version 2 of a different document. No coordination
/// between documents, so every commit succeeds.
async fn concurrent_inserts_different_documents_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed_document(storage.as_ref(), &format!("inv-{i}")).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = s.begin_transaction().await?;
            s.insert_version(&mut tx, make_version(&format!("inv-{i}"), 2))
                .await?;
            s.commit_transaction(tx).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    for i in 0..N {
        let versions = storage
            .list_versions(&format!("inv-{i}"))
            .await
            .map_err(|e| e.to_string())?;
        if versions.len() != 2 {
            return Err(format!("inv-{i}: expected 2 versions, got {}", versions.len()));
        }
    }
    Ok(())
}

/// N writers each append one version by reading the latest and claiming the
/// next slot, retrying on DuplicateVersion. The result must be the contiguous
/// sequence 1..=N+1 with no duplicates.
async fn concurrent_appends_with_retry_stay_contiguous<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_document(storage.as_ref(), "inv-1").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..MAX_ATTEMPTS {
                let mut tx = s.begin_transaction().await?;
                let next = s
                    .latest_version(&mut tx, "inv-1")
                    .await?
                    .map_or(1, |v| v.version_number + 1);
                let mut record = make_version("inv-1", next);
                record.id = format!("writer-{i}");
                let outcome = match s.insert_version(&mut tx, record).await {
                    Ok(()) => s.commit_transaction(tx).await,
                    Err(e) => {
                        let _ = s.abort_transaction(tx).await;
                        Err(e)
                    }
                };
                match outcome {
                    Ok(()) => return Ok(()),
                    Err(StorageError::DuplicateVersion { .. }) => {
                        tokio::task::yield_now().await;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(StorageError::Backend(format!("writer-{i} exhausted retries")))
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let numbers: Vec<i64> = storage
        .list_versions("inv-1")
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .map(|v| v.version_number)
        .collect();
    let expected: Vec<i64> = (1..=(N as i64 + 1)).collect();
    if numbers != expected {
        return Err(format!("expected {:?}, got {:?}", expected, numbers));
    }
    Ok(())
}
