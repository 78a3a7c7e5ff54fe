//! Review State Machine.
//!
//! ```text
//! Draft ──submit──▶ PendingReview ──accept──▶ Accepted ──accounting edit──▶ Superseded
//!                        │   ▲
//!                     reject └──submit── Rejected, Superseded
//! ```
//!
//! Every transition reads the review record inside a transaction, checks the
//! move, and writes it back under an optimistic revision check together with
//! the domain event that records it.

use serde_json::json;
use time::OffsetDateTime;

use docledger_storage::{
    ChangeSeverity, ChangeType, LedgerStorage, RequiredAction, RequiredActionKind, ReviewRecord,
    ReviewStatus, VersionRecord,
};

use crate::chain::{AppendMode, AppendRequest};
use crate::error::LedgerError;
use crate::ledger::DocumentLedger;

/// Flip an accepted review to `Superseded` and record the re-acceptance
/// obligation raised by `version`. `reviewed_version_id` is left alone.
pub(crate) fn supersede(review: &mut ReviewRecord, version: &VersionRecord, at: OffsetDateTime) {
    let fields: Vec<&str> = version.changed_fields.iter().map(String::as_str).collect();
    review.review_status = ReviewStatus::Superseded;
    review.required_actions.push(RequiredAction {
        kind: RequiredActionKind::Reaccept,
        message: format!(
            "version {} changed accounting fields ({}); re-acceptance required",
            version.version_number,
            fields.join(", ")
        ),
        version_id: version.id.clone(),
        created_at: at,
    });
}

fn invalid(
    review: &ReviewRecord,
    operation: &'static str,
    reason: impl Into<String>,
) -> LedgerError {
    LedgerError::InvalidTransition {
        document_id: review.document_id.clone(),
        operation,
        status: review.review_status,
        reason: reason.into(),
    }
}

impl<S: LedgerStorage> DocumentLedger<S> {
    /// Put `version_id` up for review.
    ///
    /// Allowed from `Draft`, `Rejected`, `Superseded`, or `PendingReview`
    /// when a different version is currently pending.
    pub async fn submit_for_review(
        &self,
        document_id: &str,
        version_id: &str,
        actor: &str,
    ) -> Result<ReviewRecord, LedgerError> {
        let version = &self.version_of(document_id, version_id).await?;
        let review = self
            .with_retries(document_id, move || async move {
                let mut tx = self.storage.begin_transaction().await?;
                let result = self.submit_in(&mut tx, version, actor).await;
                self.finish(tx, result).await
            })
            .await?;
        tracing::info!(
            document_id,
            version_number = version.version_number,
            actor,
            "submitted for review"
        );
        Ok(review)
    }

    async fn submit_in(
        &self,
        tx: &mut S::Transaction,
        version: &VersionRecord,
        actor: &str,
    ) -> Result<ReviewRecord, LedgerError> {
        let mut review = self
            .storage
            .get_review_for_update(tx, &version.document_id)
            .await?;
        match review.review_status {
            ReviewStatus::Draft | ReviewStatus::Rejected | ReviewStatus::Superseded => {}
            ReviewStatus::PendingReview
                if review.submitted_version_id.as_deref() != Some(version.id.as_str()) => {}
            ReviewStatus::PendingReview => {
                return Err(invalid(&review, "submit", "version is already pending review"))
            }
            ReviewStatus::Accepted => {
                return Err(invalid(&review, "submit", "document is already accepted"))
            }
        }

        review.submitted_version_id = Some(version.id.clone());
        review.review_status = ReviewStatus::PendingReview;
        let at = self.now();
        self.save_review(
            tx,
            review,
            "review_submitted",
            actor,
            json!({
                "version_id": version.id,
                "version_number": version.version_number,
            }),
            at,
        )
        .await
    }

    /// Accept `version_id`.
    ///
    /// From `PendingReview` only the submitted version may be accepted.
    /// With `allow_direct_reaccept`, `Accepted` and `Superseded` documents may
    /// be accepted again without resubmission. A version older than the
    /// last accepted one is never accepted.
    pub async fn accept(
        &self,
        document_id: &str,
        version_id: &str,
        actor: &str,
        comment: Option<&str>,
    ) -> Result<ReviewRecord, LedgerError> {
        let version = &self.version_of(document_id, version_id).await?;
        let review = self
            .with_retries(document_id, move || async move {
                let mut tx = self.storage.begin_transaction().await?;
                let result = self.accept_in(&mut tx, version, actor, comment).await;
                self.finish(tx, result).await
            })
            .await?;
        tracing::info!(
            document_id,
            version_number = version.version_number,
            actor,
            "accepted"
        );
        Ok(review)
    }

    async fn accept_in(
        &self,
        tx: &mut S::Transaction,
        version: &VersionRecord,
        actor: &str,
        comment: Option<&str>,
    ) -> Result<ReviewRecord, LedgerError> {
        let mut review = self
            .storage
            .get_review_for_update(tx, &version.document_id)
            .await?;
        match review.review_status {
            ReviewStatus::PendingReview => {
                if review.submitted_version_id.as_deref() != Some(version.id.as_str()) {
                    return Err(invalid(
                        &review,
                        "accept",
                        format!("version {} is not the submitted version", version.version_number),
                    ));
                }
            }
            ReviewStatus::Accepted | ReviewStatus::Superseded
                if self.settings.allow_direct_reaccept => {}
            _ => return Err(invalid(&review, "accept", "document is not pending review")),
        }

        if let Some(previous_id) = &review.reviewed_version_id {
            let previous = self.storage.get_version(previous_id).await?;
            if version.version_number < previous.version_number {
                return Err(invalid(
                    &review,
                    "accept",
                    format!(
                        "version {} is older than accepted version {}",
                        version.version_number, previous.version_number
                    ),
                ));
            }
        }

        // An acceptance never predates the version it accepts.
        let at = self.now().max(version.changed_at);
        review.review_status = ReviewStatus::Accepted;
        review.reviewed_version_id = Some(version.id.clone());
        review.reviewed_at = Some(at);
        review.reviewed_by = Some(actor.to_string());
        review.review_comment = comment.map(str::to_string);
        review.required_actions.clear();
        self.save_review(
            tx,
            review,
            "review_accepted",
            actor,
            json!({
                "version_id": version.id,
                "version_number": version.version_number,
                "comment": comment,
            }),
            at,
        )
        .await
    }

    /// Reject the pending version. `comment` must contain something other
    /// than whitespace.
    pub async fn reject(
        &self,
        document_id: &str,
        version_id: &str,
        actor: &str,
        comment: &str,
    ) -> Result<ReviewRecord, LedgerError> {
        if comment.trim().is_empty() {
            return Err(LedgerError::MissingRequiredComment {
                document_id: document_id.to_string(),
            });
        }
        let version = &self.version_of(document_id, version_id).await?;
        let review = self
            .with_retries(document_id, move || async move {
                let mut tx = self.storage.begin_transaction().await?;
                let result = self.reject_in(&mut tx, version, actor, comment).await;
                self.finish(tx, result).await
            })
            .await?;
        tracing::info!(
            document_id,
            version_number = version.version_number,
            actor,
            "rejected"
        );
        Ok(review)
    }

    async fn reject_in(
        &self,
        tx: &mut S::Transaction,
        version: &VersionRecord,
        actor: &str,
        comment: &str,
    ) -> Result<ReviewRecord, LedgerError> {
        let mut review = self
            .storage
            .get_review_for_update(tx, &version.document_id)
            .await?;
        if review.review_status != ReviewStatus::PendingReview {
            return Err(invalid(&review, "reject", "document is not pending review"));
        }
        if review.submitted_version_id.as_deref() != Some(version.id.as_str()) {
            return Err(invalid(
                &review,
                "reject",
                format!("version {} is not the submitted version", version.version_number),
            ));
        }

        let at = self.now();
        review.review_status = ReviewStatus::Rejected;
        review.rejected_version_id = Some(version.id.clone());
        review.reviewed_at = Some(at);
        review.reviewed_by = Some(actor.to_string());
        review.review_comment = Some(comment.to_string());
        self.save_review(
            tx,
            review,
            "review_rejected",
            actor,
            json!({
                "version_id": version.id,
                "version_number": version.version_number,
                "comment": comment,
            }),
            at,
        )
        .await
    }

    /// Whether an accounting-impacting version was appended after the
    /// accepted one.
    pub async fn has_changes_after_acceptance(
        &self,
        document_id: &str,
    ) -> Result<bool, LedgerError> {
        let review = self.storage.get_review(document_id).await?;
        let versions = self.storage.list_versions(document_id).await?;
        Ok(changes_after_acceptance(&review, &versions))
    }

    /// Restore the accepted snapshot.
    ///
    /// Appends a `Corrected` version holding the accepted snapshot and moves
    /// the acceptance onto it, so the live state and the acceptance agree
    /// again and the chain records the restore. Fails with
    /// `InvalidTransition` when the latest version already holds the
    /// accepted snapshot.
    pub async fn revert_to_accepted(
        &self,
        document_id: &str,
        actor: &str,
    ) -> Result<VersionRecord, LedgerError> {
        let version = self
            .with_retries(document_id, move || async move {
                let mut tx = self.storage.begin_transaction().await?;
                let result = self.revert_in(&mut tx, document_id, actor).await;
                self.finish(tx, result).await
            })
            .await?;
        tracing::info!(
            document_id,
            version_number = version.version_number,
            actor,
            "reverted to accepted snapshot"
        );
        Ok(version)
    }

    async fn revert_in(
        &self,
        tx: &mut S::Transaction,
        document_id: &str,
        actor: &str,
    ) -> Result<VersionRecord, LedgerError> {
        let mut review = self.storage.get_review_for_update(tx, document_id).await?;
        if !matches!(
            review.review_status,
            ReviewStatus::Accepted | ReviewStatus::Superseded
        ) {
            return Err(invalid(&review, "revert", "document has no current acceptance"));
        }
        let Some(accepted_id) = review.reviewed_version_id.clone() else {
            return Err(invalid(&review, "revert", "no accepted version recorded"));
        };
        let accepted = self.storage.get_version(&accepted_id).await?;
        let latest = self.storage.latest_version(tx, document_id).await?;
        if latest.is_some_and(|v| v.snapshot == accepted.snapshot) {
            return Err(invalid(
                &review,
                "revert",
                "live state already matches the accepted version",
            ));
        }

        let request = AppendRequest::new(
            document_id,
            &accepted.object_type,
            ChangeType::Corrected,
            actor,
            accepted.snapshot.clone(),
        )
        .with_reason(&format!(
            "reverted to accepted version {}",
            accepted.version_number
        ));
        let version = self.append_in(tx, &request, AppendMode::Revert).await?;

        review.review_status = ReviewStatus::Accepted;
        review.reviewed_version_id = Some(version.id.clone());
        review.reviewed_at = Some(version.changed_at);
        review.review_comment = Some(format!(
            "acceptance carried over from version {}",
            accepted.version_number
        ));
        review.required_actions.clear();
        self.save_review(
            tx,
            review,
            "review_reverted",
            actor,
            json!({
                "accepted_version_id": accepted.id,
                "accepted_version_number": accepted.version_number,
                "version_id": version.id,
                "version_number": version.version_number,
            }),
            version.changed_at,
        )
        .await?;
        Ok(version)
    }

    async fn save_review(
        &self,
        tx: &mut S::Transaction,
        mut review: ReviewRecord,
        event_type: &str,
        actor: &str,
        payload: serde_json::Value,
        at: OffsetDateTime,
    ) -> Result<ReviewRecord, LedgerError> {
        let expected = review.revision;
        review.revision = self
            .storage
            .update_review(tx, review.clone(), expected)
            .await?;
        self.emit_event(tx, &review.document_id, event_type, actor, payload, at)
            .await?;
        Ok(review)
    }
}

pub(crate) fn changes_after_acceptance(review: &ReviewRecord, versions: &[VersionRecord]) -> bool {
    if !matches!(
        review.review_status,
        ReviewStatus::Accepted | ReviewStatus::Superseded
    ) {
        return false;
    }
    // "After" is by chain position; `changed_at` may equal `reviewed_at`.
    let Some(accepted) = review
        .reviewed_version_id
        .as_deref()
        .and_then(|id| versions.iter().find(|v| v.id == id))
    else {
        return false;
    };
    versions.iter().any(|v| {
        v.version_number > accepted.version_number
            && v.change_severity == ChangeSeverity::Accounting
    })
}
