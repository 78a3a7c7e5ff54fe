//! In-memory `LedgerStorage` backend.
//!
//! Transactions buffer their writes; `commit_transaction` validates every
//! buffered write against the committed state under a single lock and then
//! applies all of them, so a commit is all-or-nothing and two transactions
//! racing for the same `(document_id, version_number)` slot cannot both win.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{DomainEventRecord, ReviewRecord, VersionRecord};
use crate::traits::LedgerStorage;

#[derive(Debug, Default)]
struct MemoryInner {
    /// Versions per document, ascending by version number.
    versions: HashMap<String, Vec<VersionRecord>>,
    /// Version id -> (document_id, index into `versions[document_id]`).
    version_index: HashMap<String, (String, usize)>,
    reviews: HashMap<String, ReviewRecord>,
    events: HashMap<String, Vec<DomainEventRecord>>,
}

#[derive(Debug)]
enum ReviewWrite {
    Insert(ReviewRecord),
    Update {
        record: ReviewRecord,
        expected_revision: i64,
    },
}

impl ReviewWrite {
    fn record(&self) -> &ReviewRecord {
        match self {
            ReviewWrite::Insert(record) => record,
            ReviewWrite::Update { record, .. } => record,
        }
    }
}

/// A buffered transaction against [`MemoryStorage`]. Dropping it discards
/// every write.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    versions: Vec<VersionRecord>,
    reviews: Vec<ReviewWrite>,
    events: Vec<DomainEventRecord>,
}

impl MemoryTransaction {
    fn pending_review(&self, document_id: &str) -> Option<&ReviewRecord> {
        self.reviews
            .iter()
            .rev()
            .map(ReviewWrite::record)
            .find(|r| r.document_id == document_id)
    }
}

/// Mutex-guarded in-memory storage. Suitable for tests, demos, and
/// single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }

    /// Replace a stored version verbatim, bypassing the append-only API.
    ///
    /// This is the out-of-band write path that a compromised or corrupted
    /// store would exhibit; verification is expected to detect it.
    pub fn overwrite_version(&self, record: VersionRecord) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let (document_id, idx) = inner
            .version_index
            .get(&record.id)
            .cloned()
            .ok_or_else(|| StorageError::VersionNotFound {
                version_id: record.id.clone(),
            })?;
        let slot = inner
            .versions
            .get_mut(&document_id)
            .and_then(|versions| versions.get_mut(idx))
            .ok_or_else(|| StorageError::Backend(format!("dangling index for {}", record.id)))?;
        *slot = record;
        Ok(())
    }
}

fn slot_taken(inner: &MemoryInner, document_id: &str, version_number: i64) -> bool {
    inner
        .versions
        .get(document_id)
        .is_some_and(|versions| versions.iter().any(|v| v.version_number == version_number))
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    type Transaction = MemoryTransaction;

    async fn begin_transaction(&self) -> Result<MemoryTransaction, StorageError> {
        Ok(MemoryTransaction::default())
    }

    async fn commit_transaction(&self, tx: MemoryTransaction) -> Result<(), StorageError> {
        let mut inner = self.lock()?;

        // Validate everything before touching committed state.
        for (i, v) in tx.versions.iter().enumerate() {
            let dup_in_tx = tx.versions[..i]
                .iter()
                .any(|o| o.document_id == v.document_id && o.version_number == v.version_number);
            if dup_in_tx || slot_taken(&inner, &v.document_id, v.version_number) {
                return Err(StorageError::DuplicateVersion {
                    document_id: v.document_id.clone(),
                    version_number: v.version_number,
                });
            }
            if inner.version_index.contains_key(&v.id) {
                return Err(StorageError::Backend(format!("duplicate version id {}", v.id)));
            }
        }

        let mut revisions: HashMap<&str, Option<i64>> = HashMap::new();
        for write in &tx.reviews {
            let doc = write.record().document_id.as_str();
            let current = *revisions
                .entry(doc)
                .or_insert_with(|| inner.reviews.get(doc).map(|r| r.revision));
            match write {
                ReviewWrite::Insert(record) => {
                    if current.is_some() {
                        return Err(StorageError::AlreadyInitialized {
                            document_id: record.document_id.clone(),
                        });
                    }
                    revisions.insert(doc, Some(record.revision));
                }
                ReviewWrite::Update {
                    record,
                    expected_revision,
                } => {
                    if current != Some(*expected_revision) {
                        return Err(StorageError::ConcurrentConflict {
                            document_id: record.document_id.clone(),
                            expected_revision: *expected_revision,
                        });
                    }
                    revisions.insert(doc, Some(record.revision));
                }
            }
        }

        for v in tx.versions {
            let versions = inner.versions.entry(v.document_id.clone()).or_default();
            let pos = versions.partition_point(|o| o.version_number < v.version_number);
            versions.insert(pos, v);
            // Re-index the document since insertion may shift positions.
            let doc = versions[pos].document_id.clone();
            let ids: Vec<(String, usize)> = versions
                .iter()
                .enumerate()
                .map(|(idx, r)| (r.id.clone(), idx))
                .collect();
            for (id, idx) in ids {
                inner.version_index.insert(id, (doc.clone(), idx));
            }
        }
        for write in tx.reviews {
            let record = match write {
                ReviewWrite::Insert(record) => record,
                ReviewWrite::Update { record, .. } => record,
            };
            inner.reviews.insert(record.document_id.clone(), record);
        }
        for e in tx.events {
            inner.events.entry(e.document_id.clone()).or_default().push(e);
        }
        Ok(())
    }

    async fn abort_transaction(&self, tx: MemoryTransaction) -> Result<(), StorageError> {
        drop(tx);
        Ok(())
    }

    async fn latest_version(
        &self,
        tx: &mut MemoryTransaction,
        document_id: &str,
    ) -> Result<Option<VersionRecord>, StorageError> {
        let inner = self.lock()?;
        let committed = inner.versions.get(document_id).and_then(|v| v.last());
        let pending = tx
            .versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .max_by_key(|v| v.version_number);
        let latest = match (committed, pending) {
            (Some(c), Some(p)) if p.version_number > c.version_number => Some(p),
            (Some(c), _) => Some(c),
            (None, p) => p,
        };
        Ok(latest.cloned())
    }

    async fn insert_version(
        &self,
        tx: &mut MemoryTransaction,
        record: VersionRecord,
    ) -> Result<(), StorageError> {
        let inner = self.lock()?;
        let pending_dup = tx.versions.iter().any(|v| {
            v.document_id == record.document_id && v.version_number == record.version_number
        });
        if pending_dup || slot_taken(&inner, &record.document_id, record.version_number) {
            return Err(StorageError::DuplicateVersion {
                document_id: record.document_id,
                version_number: record.version_number,
            });
        }
        drop(inner);
        tx.versions.push(record);
        Ok(())
    }

    async fn insert_review(
        &self,
        tx: &mut MemoryTransaction,
        record: ReviewRecord,
    ) -> Result<(), StorageError> {
        let exists = self.lock()?.reviews.contains_key(&record.document_id)
            || tx.pending_review(&record.document_id).is_some();
        if exists {
            return Err(StorageError::AlreadyInitialized {
                document_id: record.document_id,
            });
        }
        tx.reviews.push(ReviewWrite::Insert(record));
        Ok(())
    }

    async fn get_review_for_update(
        &self,
        tx: &mut MemoryTransaction,
        document_id: &str,
    ) -> Result<ReviewRecord, StorageError> {
        if let Some(pending) = tx.pending_review(document_id) {
            return Ok(pending.clone());
        }
        self.lock()?
            .reviews
            .get(document_id)
            .cloned()
            .ok_or_else(|| StorageError::ReviewNotFound {
                document_id: document_id.to_string(),
            })
    }

    async fn update_review(
        &self,
        tx: &mut MemoryTransaction,
        mut record: ReviewRecord,
        expected_revision: i64,
    ) -> Result<i64, StorageError> {
        let current = match tx.pending_review(&record.document_id) {
            Some(pending) => Some(pending.revision),
            None => self
                .lock()?
                .reviews
                .get(&record.document_id)
                .map(|r| r.revision),
        };
        match current {
            None => {
                return Err(StorageError::ReviewNotFound {
                    document_id: record.document_id,
                })
            }
            Some(rev) if rev != expected_revision => {
                return Err(StorageError::ConcurrentConflict {
                    document_id: record.document_id,
                    expected_revision,
                })
            }
            Some(_) => {}
        }
        record.revision = expected_revision + 1;
        let new_revision = record.revision;
        tx.reviews.push(ReviewWrite::Update {
            record,
            expected_revision,
        });
        Ok(new_revision)
    }

    async fn insert_event(
        &self,
        tx: &mut MemoryTransaction,
        record: DomainEventRecord,
    ) -> Result<(), StorageError> {
        tx.events.push(record);
        Ok(())
    }

    async fn list_versions(&self, document_id: &str) -> Result<Vec<VersionRecord>, StorageError> {
        Ok(self
            .lock()?
            .versions
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_version(&self, version_id: &str) -> Result<VersionRecord, StorageError> {
        let inner = self.lock()?;
        inner
            .version_index
            .get(version_id)
            .and_then(|(doc, idx)| inner.versions.get(doc).and_then(|v| v.get(*idx)))
            .cloned()
            .ok_or_else(|| StorageError::VersionNotFound {
                version_id: version_id.to_string(),
            })
    }

    async fn get_review(&self, document_id: &str) -> Result<ReviewRecord, StorageError> {
        self.lock()?
            .reviews
            .get(document_id)
            .cloned()
            .ok_or_else(|| StorageError::ReviewNotFound {
                document_id: document_id.to_string(),
            })
    }

    async fn list_events(
        &self,
        document_id: &str,
    ) -> Result<Vec<DomainEventRecord>, StorageError> {
        Ok(self
            .lock()?
            .events
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }
}
