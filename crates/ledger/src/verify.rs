//! Chain Verifier.
//!
//! Recomputes every snapshot hash and chain link from stored content and
//! compares them with the stored values. Each version's chain link is
//! recomputed against the *stored* chain hash of its predecessor, so a single
//! corrupted row is reported at that row alone instead of cascading through
//! every later version.

use serde::{Deserialize, Serialize};

use docledger_storage::{LedgerStorage, VersionRecord};

use crate::error::LedgerError;
use crate::hasher;
use crate::ledger::DocumentLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SnapshotHashMismatch,
    ChainHashMismatch,
    SequenceGap,
    DuplicateVersionNumber,
    DocumentMismatch,
    TimestampRegression,
}

/// One divergence between stored and recomputed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFinding {
    pub version_number: i64,
    pub kind: FindingKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub version_count: usize,
    pub errors: Vec<ChainFinding>,
}

impl VerificationResult {
    /// Version numbers with at least one finding, ascending and deduplicated.
    pub fn offending_versions(&self) -> Vec<i64> {
        let mut numbers: Vec<i64> = self.errors.iter().map(|f| f.version_number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    /// Escalate a failed verification into an error.
    pub fn into_result(self, document_id: &str) -> Result<Self, LedgerError> {
        if self.valid {
            Ok(self)
        } else {
            Err(LedgerError::ChainIntegrityViolation {
                document_id: document_id.to_string(),
                findings: self.errors.len(),
            })
        }
    }
}

/// Verify `versions` (in stored order) as the chain of `document_id`.
///
/// Pure: needs nothing but the records, so it runs equally on live storage
/// and on an exported proof bundle.
pub fn verify_chain(document_id: &str, versions: &[VersionRecord]) -> VerificationResult {
    let mut errors = Vec::new();
    let mut previous: Option<&VersionRecord> = None;
    let mut expected_number = 1;

    for version in versions {
        let n = version.version_number;
        let mut finding = |kind, message: String| {
            errors.push(ChainFinding {
                version_number: n,
                kind,
                message,
            })
        };

        if version.document_id != document_id {
            finding(
                FindingKind::DocumentMismatch,
                format!(
                    "version {n} belongs to document {}, not {document_id}",
                    version.document_id
                ),
            );
        }

        match previous {
            Some(prev) if prev.version_number == n => finding(
                FindingKind::DuplicateVersionNumber,
                format!("version number {n} appears more than once"),
            ),
            _ if n != expected_number => finding(
                FindingKind::SequenceGap,
                format!("expected version {expected_number}, found {n}"),
            ),
            _ => {}
        }

        let recomputed = hasher::hash_snapshot(&version.snapshot);
        if recomputed != version.snapshot_hash {
            finding(
                FindingKind::SnapshotHashMismatch,
                format!(
                    "stored snapshot_hash {} does not match recomputed {recomputed}",
                    version.snapshot_hash
                ),
            );
        }

        let link = hasher::chain_hash(&recomputed, previous.map(|p| p.chain_hash.as_str()));
        if link != version.chain_hash {
            finding(
                FindingKind::ChainHashMismatch,
                format!(
                    "stored chain_hash {} does not match recomputed {link}",
                    version.chain_hash
                ),
            );
        }

        if let Some(prev) = previous {
            if version.changed_at < prev.changed_at {
                finding(
                    FindingKind::TimestampRegression,
                    format!("changed_at precedes version {}", prev.version_number),
                );
            }
        }

        expected_number = n + 1;
        previous = Some(version);
    }

    VerificationResult {
        valid: errors.is_empty(),
        version_count: versions.len(),
        errors,
    }
}

impl<S: LedgerStorage> DocumentLedger<S> {
    /// Re-run the chain algorithm over every stored version of a document.
    ///
    /// Findings are returned, not raised; use
    /// [`VerificationResult::into_result`] to escalate.
    pub async fn verify(&self, document_id: &str) -> Result<VerificationResult, LedgerError> {
        // Distinguishes "no such document" from an empty but valid chain.
        self.storage.get_review(document_id).await?;
        let versions = self.storage.list_versions(document_id).await?;
        let result = verify_chain(document_id, &versions);
        if result.valid {
            tracing::debug!(document_id, versions = result.version_count, "chain verified");
        } else {
            tracing::warn!(
                document_id,
                findings = result.errors.len(),
                offending = ?result.offending_versions(),
                "chain integrity violation"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use docledger_storage::{ChangeSeverity, ChangeType, DocumentSnapshot};
    use serde_json::json;
    use time::macros::datetime;
    use time::Duration;

    use super::*;

    fn chain(amounts: &[i64]) -> Vec<VersionRecord> {
        let mut out: Vec<VersionRecord> = Vec::new();
        for (i, amount) in amounts.iter().enumerate() {
            let snapshot: DocumentSnapshot =
                serde_json::from_value(json!({ "amount": amount })).unwrap();
            let snapshot_hash = hasher::hash_snapshot(&snapshot);
            let chain_hash =
                hasher::chain_hash(&snapshot_hash, out.last().map(|p| p.chain_hash.as_str()));
            out.push(VersionRecord {
                id: format!("v{}", i + 1),
                document_id: "inv-1".to_string(),
                object_type: "invoice".to_string(),
                version_number: i as i64 + 1,
                change_type: if i == 0 {
                    ChangeType::Created
                } else {
                    ChangeType::Modified
                },
                change_reason: None,
                changed_by: "alice".to_string(),
                changed_at: datetime!(2025-01-01 00:00 UTC) + Duration::minutes(i as i64),
                snapshot,
                changed_fields: Default::default(),
                change_severity: ChangeSeverity::None,
                snapshot_hash,
                chain_hash,
            });
        }
        out
    }

    fn kinds(result: &VerificationResult) -> Vec<(i64, FindingKind)> {
        result
            .errors
            .iter()
            .map(|f| (f.version_number, f.kind))
            .collect()
    }

    #[test]
    fn intact_chain_is_valid() {
        let result = verify_chain("inv-1", &chain(&[100, 150, 200]));
        assert!(result.valid);
        assert_eq!(result.version_count, 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn empty_chain_is_valid() {
        let result = verify_chain("inv-1", &[]);
        assert!(result.valid);
        assert_eq!(result.version_count, 0);
    }

    #[test]
    fn flipped_snapshot_hash_is_reported_at_that_version_only() {
        let mut versions = chain(&[100, 150, 200]);
        let mut bytes = versions[1].snapshot_hash.clone().into_bytes();
        bytes[0] ^= 0x01;
        versions[1].snapshot_hash = String::from_utf8(bytes).unwrap();

        let result = verify_chain("inv-1", &versions);
        assert!(!result.valid);
        assert_eq!(kinds(&result), vec![(2, FindingKind::SnapshotHashMismatch)]);
    }

    #[test]
    fn mutated_snapshot_breaks_both_hashes() {
        let mut versions = chain(&[100, 150, 200]);
        versions[1].snapshot.insert("amount".to_string(), json!(151));
        let result = verify_chain("inv-1", &versions);
        assert_eq!(
            kinds(&result),
            vec![
                (2, FindingKind::SnapshotHashMismatch),
                (2, FindingKind::ChainHashMismatch)
            ]
        );
        assert_eq!(result.offending_versions(), vec![2]);
    }

    #[test]
    fn rewritten_chain_hash_is_detected() {
        let mut versions = chain(&[100, 150, 200]);
        versions[2].chain_hash = hasher::GENESIS_CHAIN_HASH.to_string();
        let result = verify_chain("inv-1", &versions);
        assert_eq!(kinds(&result), vec![(3, FindingKind::ChainHashMismatch)]);
    }

    #[test]
    fn gaps_and_duplicates_are_reported() {
        let mut versions = chain(&[1, 2, 3, 4]);
        versions[1].version_number = 1;
        versions[3].version_number = 6;
        let result = verify_chain("inv-1", &versions);
        let found = kinds(&result);
        assert!(found.contains(&(1, FindingKind::DuplicateVersionNumber)));
        assert!(found.contains(&(6, FindingKind::SequenceGap)));
    }

    #[test]
    fn chain_must_start_at_one() {
        let versions = chain(&[1, 2]);
        let result = verify_chain("inv-1", &versions[1..]);
        assert!(kinds(&result).contains(&(2, FindingKind::SequenceGap)));
    }

    #[test]
    fn foreign_version_and_clock_regression_are_reported() {
        let mut versions = chain(&[1, 2, 3]);
        versions[1].document_id = "inv-9".to_string();
        versions[2].changed_at = datetime!(2024-12-31 00:00 UTC);
        let found = kinds(&verify_chain("inv-1", &versions));
        assert!(found.contains(&(2, FindingKind::DocumentMismatch)));
        assert!(found.contains(&(3, FindingKind::TimestampRegression)));
    }

    #[test]
    fn into_result_escalates_failures() {
        let mut versions = chain(&[1, 2]);
        versions[0].snapshot_hash = "00".to_string();
        let err = verify_chain("inv-1", &versions)
            .into_result("inv-1")
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ChainIntegrityViolation { findings: 1, .. }
        ));
        assert!(verify_chain("inv-1", &chain(&[1])).into_result("inv-1").is_ok());
    }
}
