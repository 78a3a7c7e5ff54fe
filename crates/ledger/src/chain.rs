//! Version Chain Store: append-only, hash-chained versions per document.

use serde_json::json;

use docledger_storage::{
    ChangeSeverity, ChangeType, DocumentSnapshot, LedgerStorage, ReviewRecord, ReviewStatus,
    VersionRecord,
};

use crate::classifier;
use crate::error::LedgerError;
use crate::hasher;
use crate::ledger::DocumentLedger;
use crate::review;

/// Input to [`DocumentLedger::append_version`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRequest {
    pub document_id: String,
    pub object_type: String,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub actor: String,
    pub snapshot: DocumentSnapshot,
}

impl AppendRequest {
    pub fn new(
        document_id: &str,
        object_type: &str,
        change_type: ChangeType,
        actor: &str,
        snapshot: DocumentSnapshot,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            object_type: object_type.to_string(),
            change_type,
            change_reason: None,
            actor: actor.to_string(),
            snapshot,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.change_reason = Some(reason.to_string());
        self
    }
}

/// How an append interacts with the review record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppendMode {
    /// Ordinary edit: accounting changes supersede an acceptance.
    Edit,
    /// Restoring the accepted snapshot; the caller owns the review update.
    Revert,
}

impl<S: LedgerStorage> DocumentLedger<S> {
    /// Append a new immutable version, creating the document when
    /// `change_type` is `Created`.
    ///
    /// Runs in one transaction: the version, its domain event, and any
    /// review supersession commit together or not at all. Version-number
    /// races are retried up to `max_write_retries` times.
    pub async fn append_version(
        &self,
        request: AppendRequest,
    ) -> Result<VersionRecord, LedgerError> {
        let request = &request;
        self.with_retries(&request.document_id, move || async move {
            let mut tx = self.storage.begin_transaction().await?;
            let result = self.append_in(&mut tx, request, AppendMode::Edit).await;
            self.finish(tx, result).await
        })
        .await
    }

    pub(crate) async fn append_in(
        &self,
        tx: &mut S::Transaction,
        request: &AppendRequest,
        mode: AppendMode,
    ) -> Result<VersionRecord, LedgerError> {
        let document_id = request.document_id.as_str();
        if self.locks.is_locked(document_id) {
            tracing::warn!(document_id, "append rejected: document is locked");
            return Err(LedgerError::DocumentLocked {
                document_id: document_id.to_string(),
            });
        }

        let previous = self.storage.latest_version(tx, document_id).await?;
        match (&previous, request.change_type) {
            (None, ChangeType::Created) | (Some(_), _) => {}
            (None, _) => {
                return Err(LedgerError::DocumentNotFound {
                    document_id: document_id.to_string(),
                })
            }
        }
        if let Some(prev) = &previous {
            if request.change_type == ChangeType::Created {
                return Err(LedgerError::DocumentAlreadyExists {
                    document_id: document_id.to_string(),
                });
            }
            if prev.object_type != request.object_type {
                return Err(LedgerError::ObjectTypeMismatch {
                    document_id: document_id.to_string(),
                    expected: prev.object_type.clone(),
                    found: request.object_type.clone(),
                });
            }
        }

        let classification = classifier::classify(
            &self.registry,
            previous.as_ref().map(|p| &p.snapshot),
            &request.snapshot,
            &request.object_type,
        );
        let snapshot_hash = hasher::hash_snapshot(&request.snapshot);
        let chain_hash = hasher::chain_hash(
            &snapshot_hash,
            previous.as_ref().map(|p| p.chain_hash.as_str()),
        );

        // changed_at never runs backwards within a document.
        let now = self.now();
        let changed_at = match &previous {
            Some(prev) if prev.changed_at > now => prev.changed_at,
            _ => now,
        };

        let version = VersionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            object_type: request.object_type.clone(),
            version_number: previous.as_ref().map_or(1, |p| p.version_number + 1),
            change_type: request.change_type,
            change_reason: request.change_reason.clone(),
            changed_by: request.actor.clone(),
            changed_at,
            snapshot: request.snapshot.clone(),
            changed_fields: classification.changed_fields,
            change_severity: classification.severity,
            snapshot_hash,
            chain_hash,
        };
        self.storage.insert_version(tx, version.clone()).await?;

        if previous.is_none() {
            self.storage
                .insert_review(tx, ReviewRecord::new(document_id))
                .await?;
            self.emit_event(
                tx,
                document_id,
                "document_created",
                &request.actor,
                json!({
                    "object_type": version.object_type,
                    "version_id": version.id,
                    "snapshot_hash": version.snapshot_hash,
                }),
                changed_at,
            )
            .await?;
        } else {
            self.emit_event(
                tx,
                document_id,
                "version_appended",
                &request.actor,
                json!({
                    "version_id": version.id,
                    "version_number": version.version_number,
                    "change_type": version.change_type,
                    "change_severity": version.change_severity,
                    "changed_fields": version.changed_fields,
                }),
                changed_at,
            )
            .await?;
        }

        if mode == AppendMode::Edit && version.change_severity == ChangeSeverity::Accounting {
            let mut review = self.storage.get_review_for_update(tx, document_id).await?;
            if review.review_status == ReviewStatus::Accepted {
                let revision = review.revision;
                review::supersede(&mut review, &version, changed_at);
                self.storage.update_review(tx, review, revision).await?;
                self.emit_event(
                    tx,
                    document_id,
                    "review_superseded",
                    &request.actor,
                    json!({
                        "version_id": version.id,
                        "version_number": version.version_number,
                        "changed_fields": version.changed_fields,
                    }),
                    changed_at,
                )
                .await?;
                tracing::info!(
                    document_id,
                    version_number = version.version_number,
                    "acceptance superseded by accounting change"
                );
            }
        }

        tracing::info!(
            document_id,
            version_number = version.version_number,
            change_type = %version.change_type,
            severity = %version.change_severity,
            "appended version"
        );
        Ok(version)
    }

    /// Every version of a document, ascending by version number.
    pub async fn get_versions(&self, document_id: &str) -> Result<Vec<VersionRecord>, LedgerError> {
        let versions = self.storage.list_versions(document_id).await?;
        tracing::debug!(document_id, count = versions.len(), "listed versions");
        Ok(versions)
    }

    pub async fn get_version(&self, version_id: &str) -> Result<VersionRecord, LedgerError> {
        Ok(self.storage.get_version(version_id).await?)
    }

    /// The version with `version_id`, provided it belongs to `document_id`.
    pub(crate) async fn version_of(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<VersionRecord, LedgerError> {
        let version = self.storage.get_version(version_id).await?;
        if version.document_id != document_id {
            return Err(LedgerError::VersionNotFound {
                version_id: version_id.to_string(),
            });
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docledger_storage::MemoryStorage;
    use serde_json::json;

    use super::*;
    use crate::lock::StaticLocks;

    fn snap(v: serde_json::Value) -> DocumentSnapshot {
        serde_json::from_value(v).unwrap()
    }

    fn ledger() -> DocumentLedger<MemoryStorage> {
        DocumentLedger::new(Arc::new(MemoryStorage::new()))
    }

    fn create(doc: &str, v: serde_json::Value) -> AppendRequest {
        AppendRequest::new(doc, "invoice", ChangeType::Created, "alice", snap(v))
    }

    fn edit(doc: &str, v: serde_json::Value) -> AppendRequest {
        AppendRequest::new(doc, "invoice", ChangeType::Modified, "alice", snap(v))
    }

    #[tokio::test]
    async fn first_version_is_genesis_linked() {
        let l = ledger();
        let v1 = l.append_version(create("inv-1", json!({"amount": 100}))).await.unwrap();
        assert_eq!(v1.version_number, 1);
        assert!(v1.changed_fields.is_empty());
        assert_eq!(v1.change_severity, ChangeSeverity::None);
        assert_eq!(v1.snapshot_hash, hasher::hash_snapshot(&v1.snapshot));
        assert_eq!(v1.chain_hash, hasher::chain_hash(&v1.snapshot_hash, None));

        let review = l.get_review("inv-1").await.unwrap();
        assert_eq!(review.review_status, ReviewStatus::Draft);
    }

    #[tokio::test]
    async fn second_version_links_to_first() {
        let l = ledger();
        let v1 = l.append_version(create("inv-1", json!({"amount": 100}))).await.unwrap();
        let v2 = l
            .append_version(edit("inv-1", json!({"amount": 150})).with_reason("price fix"))
            .await
            .unwrap();
        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.change_reason.as_deref(), Some("price fix"));
        assert_eq!(v2.change_severity, ChangeSeverity::Accounting);
        assert_eq!(
            v2.chain_hash,
            hasher::chain_hash(&v2.snapshot_hash, Some(&v1.chain_hash))
        );
        let versions = l.get_versions("inv-1").await.unwrap();
        assert_eq!(versions, vec![v1, v2]);
    }

    #[tokio::test]
    async fn edit_before_create_is_not_found() {
        let l = ledger();
        let err = l.append_version(edit("ghost", json!({}))).await.unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn create_twice_is_rejected() {
        let l = ledger();
        l.append_version(create("inv-1", json!({}))).await.unwrap();
        let err = l.append_version(create("inv-1", json!({}))).await.unwrap_err();
        assert!(matches!(err, LedgerError::DocumentAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn object_type_must_not_change() {
        let l = ledger();
        l.append_version(create("inv-1", json!({}))).await.unwrap();
        let mut req = edit("inv-1", json!({"amount": 1}));
        req.object_type = "bill".to_string();
        let err = l.append_version(req).await.unwrap_err();
        assert!(matches!(err, LedgerError::ObjectTypeMismatch { .. }));
    }

    #[tokio::test]
    async fn locked_document_rejects_append() {
        let locks = Arc::new(StaticLocks::new());
        let l = ledger().with_posting_lock(locks.clone());
        l.append_version(create("inv-1", json!({"amount": 100}))).await.unwrap();
        locks.lock("inv-1");

        let err = l
            .append_version(edit("inv-1", json!({"amount": 200})))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DocumentLocked { .. }));
        assert_eq!(l.get_versions("inv-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn appends_emit_events() {
        let l = ledger();
        l.append_version(create("inv-1", json!({"amount": 100}))).await.unwrap();
        l.append_version(edit("inv-1", json!({"amount": 100, "notes": "x"})))
            .await
            .unwrap();
        let types: Vec<String> = l
            .get_events("inv-1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(types, vec!["document_created", "version_appended"]);
    }

    #[tokio::test]
    async fn version_of_checks_document() {
        let l = ledger();
        let v1 = l.append_version(create("inv-1", json!({}))).await.unwrap();
        l.append_version(create("inv-2", json!({}))).await.unwrap();
        let err = l.version_of("inv-2", &v1.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::VersionNotFound { .. }));
    }
}
