use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Full copy of a document's field values at one version, keyed by field name.
pub type DocumentSnapshot = BTreeMap<String, serde_json::Value>;

/// What kind of save produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    DraftSaved,
    Issued,
    Paid,
    Unpaid,
    Corrected,
    Modified,
    Cancelled,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::DraftSaved => "draft_saved",
            ChangeType::Issued => "issued",
            ChangeType::Paid => "paid",
            ChangeType::Unpaid => "unpaid",
            ChangeType::Corrected => "corrected",
            ChangeType::Modified => "modified",
            ChangeType::Cancelled => "cancelled",
        }
    }

    /// True while the document has never left draft.
    pub fn is_draft(&self) -> bool {
        matches!(self, ChangeType::Created | ChangeType::DraftSaved)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact of a set of changed fields on downstream accounting records.
///
/// Ordered so that `max` yields the most severe classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSeverity {
    None,
    NonAccounting,
    Accounting,
}

impl fmt::Display for ChangeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSeverity::None => write!(f, "none"),
            ChangeSeverity::NonAccounting => write!(f, "non_accounting"),
            ChangeSeverity::Accounting => write!(f, "accounting"),
        }
    }
}

/// Review workflow state for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    PendingReview,
    Accepted,
    Rejected,
    Superseded,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Draft => write!(f, "draft"),
            ReviewStatus::PendingReview => write!(f, "pending_review"),
            ReviewStatus::Accepted => write!(f, "accepted"),
            ReviewStatus::Rejected => write!(f, "rejected"),
            ReviewStatus::Superseded => write!(f, "superseded"),
        }
    }
}

/// One immutable, chained version of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub document_id: String,
    pub object_type: String,
    pub version_number: i64,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub changed_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub changed_at: OffsetDateTime,
    pub snapshot: DocumentSnapshot,
    pub changed_fields: BTreeSet<String>,
    pub change_severity: ChangeSeverity,
    /// Lowercase hex SHA-256 of the canonical snapshot serialization.
    pub snapshot_hash: String,
    /// Lowercase hex SHA-256 binding this version to its predecessor.
    pub chain_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredActionKind {
    /// An accounting-impacting edit landed after acceptance.
    Reaccept,
}

/// A pending obligation attached to a review record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub kind: RequiredActionKind,
    pub message: String,
    /// The version whose append created the obligation.
    pub version_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The single review record of a document.
///
/// Mutated in place, but every field that names a version points into the
/// immutable version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub document_id: String,
    pub review_status: ReviewStatus,
    pub submitted_version_id: Option<String>,
    /// The version carrying the most recent acceptance. Rejections never
    /// overwrite it.
    pub reviewed_version_id: Option<String>,
    pub rejected_version_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub required_actions: Vec<RequiredAction>,
    /// Incremented on every committed update; used for optimistic checks.
    pub revision: i64,
}

impl ReviewRecord {
    /// A fresh record at `Draft`, revision 0.
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            review_status: ReviewStatus::Draft,
            submitted_version_id: None,
            reviewed_version_id: None,
            rejected_version_id: None,
            reviewed_at: None,
            reviewed_by: None,
            review_comment: None,
            required_actions: Vec::new(),
            revision: 0,
        }
    }
}

/// An append-only record of a notable occurrence on a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEventRecord {
    pub id: String,
    pub document_id: String,
    pub event_type: String,
    pub actor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub payload: serde_json::Value,
    /// Lowercase hex SHA-256 of the canonical payload serialization.
    pub payload_hash: String,
}
