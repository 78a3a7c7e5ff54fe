//! Audit Trail Assembler plus the read-only helpers the editing layer
//! consumes: version diffs and edit gating.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use docledger_storage::{
    ChangeSeverity, ChangeType, DocumentSnapshot, DomainEventRecord, LedgerStorage, ReviewRecord,
    ReviewStatus, VersionRecord,
};

use crate::classifier;
use crate::error::LedgerError;
use crate::ledger::DocumentLedger;
use crate::registry::{FieldClass, FieldRegistry};
use crate::review;
use crate::verify::{self, VerificationResult};

/// Everything known about one document, with a fresh verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub document_id: String,
    pub object_type: Option<String>,
    pub review: ReviewRecord,
    pub versions: Vec<VersionRecord>,
    pub events: Vec<DomainEventRecord>,
    pub verification: VerificationResult,
    pub has_changes_after_acceptance: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// One field that differs between two snapshots. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub accounting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub document_id: String,
    pub from_version: i64,
    pub to_version: i64,
    pub changes: Vec<FieldChange>,
    pub severity: ChangeSeverity,
}

/// Answer to "may this document be edited, and at what cost?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCheck {
    pub can_edit: bool,
    pub reason: Option<String>,
    /// The edit must be saved as a `Corrected` version.
    pub requires_correction: bool,
    /// Saving the edit will supersede the current acceptance.
    pub will_invalidate_acceptance: bool,
}

/// Field-by-field comparison of two snapshots, classified under `registry`.
pub fn diff_snapshots(
    registry: &FieldRegistry,
    object_type: &str,
    old: &DocumentSnapshot,
    new: &DocumentSnapshot,
) -> (Vec<FieldChange>, ChangeSeverity) {
    let fields = classifier::changed_fields(old, new);
    let severity = classifier::classify_change(registry, object_type, &fields);
    let changes = fields
        .into_iter()
        .map(|field| FieldChange {
            old: old.get(&field).cloned(),
            new: new.get(&field).cloned(),
            accounting: registry.classify_field(object_type, &field) == FieldClass::Accounting,
            field,
        })
        .collect();
    (changes, severity)
}

impl<S: LedgerStorage> DocumentLedger<S> {
    pub async fn get_audit_trail(&self, document_id: &str) -> Result<AuditTrail, LedgerError> {
        let review = self.storage.get_review(document_id).await?;
        let versions = self.storage.list_versions(document_id).await?;
        let events = self.storage.list_events(document_id).await?;
        let verification = verify::verify_chain(document_id, &versions);
        if !verification.valid {
            tracing::warn!(
                document_id,
                findings = verification.errors.len(),
                "audit trail carries integrity findings"
            );
        }
        tracing::debug!(
            document_id,
            versions = versions.len(),
            events = events.len(),
            "assembled audit trail"
        );

        Ok(AuditTrail {
            document_id: document_id.to_string(),
            object_type: versions.first().map(|v| v.object_type.clone()),
            has_changes_after_acceptance: review::changes_after_acceptance(&review, &versions),
            review,
            versions,
            events,
            verification,
            generated_at: self.now(),
        })
    }

    /// Compare two versions of the same document. Classification uses the
    /// registry as currently configured, not as it was when the versions
    /// were written.
    pub async fn diff_versions(
        &self,
        from_version_id: &str,
        to_version_id: &str,
    ) -> Result<VersionDiff, LedgerError> {
        let from = self.storage.get_version(from_version_id).await?;
        let to = self.storage.get_version(to_version_id).await?;
        if from.document_id != to.document_id {
            return Err(LedgerError::DocumentMismatch {
                left: from_version_id.to_string(),
                right: to_version_id.to_string(),
            });
        }
        let (changes, severity) =
            diff_snapshots(&self.registry, &to.object_type, &from.snapshot, &to.snapshot);
        Ok(VersionDiff {
            document_id: to.document_id,
            from_version: from.version_number,
            to_version: to.version_number,
            changes,
            severity,
        })
    }

    /// Gate a prospective edit touching `proposed_fields`.
    pub async fn can_edit(
        &self,
        document_id: &str,
        proposed_fields: &[&str],
    ) -> Result<EditCheck, LedgerError> {
        let review = self.storage.get_review(document_id).await?;
        let versions = self.storage.list_versions(document_id).await?;

        if self.locks.is_locked(document_id) {
            return Ok(EditCheck {
                can_edit: false,
                reason: Some("document is posted and locked".to_string()),
                requires_correction: true,
                will_invalidate_acceptance: false,
            });
        }
        let Some(latest) = versions.last() else {
            return Err(LedgerError::DocumentNotFound {
                document_id: document_id.to_string(),
            });
        };
        if latest.change_type == ChangeType::Cancelled {
            return Ok(EditCheck {
                can_edit: false,
                reason: Some("document is cancelled".to_string()),
                requires_correction: false,
                will_invalidate_acceptance: false,
            });
        }

        let requires_correction = versions.iter().any(|v| !v.change_type.is_draft());
        let severity =
            classifier::classify_change(&self.registry, &latest.object_type, proposed_fields);
        let will_invalidate_acceptance = review.review_status == ReviewStatus::Accepted
            && severity == ChangeSeverity::Accounting;

        let reason = match (requires_correction, will_invalidate_acceptance) {
            (_, true) => Some("accounting edit will require re-acceptance".to_string()),
            (true, false) => Some("document has been issued; save as a correction".to_string()),
            (false, false) => None,
        };
        Ok(EditCheck {
            can_edit: true,
            reason,
            requires_correction,
            will_invalidate_acceptance,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docledger_storage::MemoryStorage;
    use serde_json::json;

    use super::*;
    use crate::chain::AppendRequest;
    use crate::lock::StaticLocks;

    fn snap(v: Value) -> DocumentSnapshot {
        serde_json::from_value(v).unwrap()
    }

    fn req(doc: &str, change_type: ChangeType, v: Value) -> AppendRequest {
        AppendRequest::new(doc, "invoice", change_type, "alice", snap(v))
    }

    #[test]
    fn diff_reports_added_removed_and_changed() {
        let registry = FieldRegistry::invoice_defaults();
        let (changes, severity) = diff_snapshots(
            &registry,
            "invoice",
            &snap(json!({"amount": 100, "notes": "a"})),
            &snap(json!({"amount": 100, "memo": "m", "total": 5})),
        );
        let fields: Vec<(&str, bool)> = changes
            .iter()
            .map(|c| (c.field.as_str(), c.accounting))
            .collect();
        assert_eq!(
            fields,
            vec![("memo", false), ("notes", false), ("total", true)]
        );
        assert_eq!(changes[1].old, Some(json!("a")));
        assert_eq!(changes[1].new, None);
        assert_eq!(severity, ChangeSeverity::Accounting);
    }

    #[tokio::test]
    async fn diff_versions_within_document() {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        let v1 = l
            .append_version(req("inv-1", ChangeType::Created, json!({"amount": 100})))
            .await
            .unwrap();
        let v2 = l
            .append_version(req(
                "inv-1",
                ChangeType::Modified,
                json!({"amount": 100, "notes": "thanks"}),
            ))
            .await
            .unwrap();
        let diff = l.diff_versions(&v1.id, &v2.id).await.unwrap();
        assert_eq!((diff.from_version, diff.to_version), (1, 2));
        assert_eq!(diff.severity, ChangeSeverity::NonAccounting);
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].new, Some(json!("thanks")));
    }

    #[tokio::test]
    async fn diff_across_documents_is_rejected() {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        let a = l
            .append_version(req("inv-1", ChangeType::Created, json!({})))
            .await
            .unwrap();
        let b = l
            .append_version(req("inv-2", ChangeType::Created, json!({})))
            .await
            .unwrap();
        let err = l.diff_versions(&a.id, &b.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::DocumentMismatch { .. }));
    }

    #[tokio::test]
    async fn can_edit_tracks_draft_lock_and_acceptance() {
        let locks = Arc::new(StaticLocks::new());
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new())).with_posting_lock(locks.clone());
        let v1 = l
            .append_version(req("inv-1", ChangeType::Created, json!({"amount": 1})))
            .await
            .unwrap();

        let draft = l.can_edit("inv-1", &["amount"]).await.unwrap();
        assert!(draft.can_edit);
        assert!(!draft.requires_correction);
        assert!(!draft.will_invalidate_acceptance);
        assert_eq!(draft.reason, None);

        l.submit_for_review("inv-1", &v1.id, "alice").await.unwrap();
        l.accept("inv-1", &v1.id, "bob", None).await.unwrap();
        let accepted = l.can_edit("inv-1", &["amount"]).await.unwrap();
        assert!(accepted.will_invalidate_acceptance);
        let notes_only = l.can_edit("inv-1", &["notes"]).await.unwrap();
        assert!(!notes_only.will_invalidate_acceptance);

        l.append_version(req("inv-1", ChangeType::Issued, json!({"amount": 1, "memo": "x"})))
            .await
            .unwrap();
        assert!(l.can_edit("inv-1", &["memo"]).await.unwrap().requires_correction);

        locks.lock("inv-1");
        let locked = l.can_edit("inv-1", &["memo"]).await.unwrap();
        assert!(!locked.can_edit);
        assert!(locked.reason.unwrap().contains("locked"));
    }

    #[tokio::test]
    async fn cancelled_document_cannot_be_edited() {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        l.append_version(req("inv-1", ChangeType::Created, json!({})))
            .await
            .unwrap();
        l.append_version(req("inv-1", ChangeType::Cancelled, json!({"status": "void"})))
            .await
            .unwrap();
        let check = l.can_edit("inv-1", &["notes"]).await.unwrap();
        assert!(!check.can_edit);
    }

    #[tokio::test]
    async fn audit_trail_bundles_everything() {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        let v1 = l
            .append_version(req("inv-1", ChangeType::Created, json!({"amount": 1})))
            .await
            .unwrap();
        l.submit_for_review("inv-1", &v1.id, "alice").await.unwrap();
        let trail = l.get_audit_trail("inv-1").await.unwrap();
        assert_eq!(trail.object_type.as_deref(), Some("invoice"));
        assert_eq!(trail.versions.len(), 1);
        assert_eq!(trail.events.len(), 2);
        assert!(trail.verification.valid);
        assert_eq!(trail.review.review_status, ReviewStatus::PendingReview);
        assert!(!trail.has_changes_after_acceptance);
    }

    #[tokio::test]
    async fn audit_trail_of_unknown_document_fails() {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        let err = l.get_audit_trail("ghost").await.unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound { .. }));
    }
}
