//! Proof Exporter and the independent proof verifier.
//!
//! A proof bundle carries everything needed to re-run the chain algorithm
//! without the live store:
//!
//! ```json
//! {
//!   "bundle": { "format": "docledger-proof/1", "document_id": "...", "versions": [...], ... },
//!   "etag": "<sha256 of canonical bundle JSON>",
//!   "trust": { "attestation_format": "ed25519-detached", "signer_public_key": "...", "bundle_attestation": "..." }
//! }
//! ```
//!
//! The optional `trust` section is a detached Ed25519 signature over the
//! etag bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use docledger_storage::{DomainEventRecord, LedgerStorage, ReviewRecord, VersionRecord};

use crate::error::LedgerError;
use crate::hasher;
use crate::ledger::DocumentLedger;
use crate::verify::{self, VerificationResult};

pub const PROOF_FORMAT: &str = "docledger-proof/1";
pub const ATTESTATION_FORMAT: &str = "ed25519-detached";

/// The signed content of a proof bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofBody {
    pub format: String,
    pub document_id: String,
    pub object_type: Option<String>,
    pub algorithm: String,
    pub genesis_chain_hash: String,
    pub review: ReviewRecord,
    pub versions: Vec<VersionRecord>,
    pub events: Vec<DomainEventRecord>,
    /// Verdict of the exporting system at export time.
    pub verification: VerificationResult,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub attestation_format: String,
    /// Base64 of the 32-byte Ed25519 verifying key.
    pub signer_public_key: String,
    /// Base64 of the 64-byte signature over the etag.
    pub bundle_attestation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub bundle: ProofBody,
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<Attestation>,
}

impl ProofBundle {
    pub fn to_json_pretty(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Proof(e.to_string()))
    }

    pub fn from_json(source: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(source)
            .map_err(|e| LedgerError::Proof(format!("malformed proof bundle: {e}")))
    }
}

/// SHA-256 over the canonical JSON of the bundle body.
pub fn compute_etag(body: &ProofBody) -> Result<String, LedgerError> {
    let value = serde_json::to_value(body).map_err(|e| LedgerError::Proof(e.to_string()))?;
    Ok(hasher::sha256_hex(hasher::canonical_json(&value).as_bytes()))
}

/// First 16 hex characters of the SHA-256 of the key bytes.
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    hasher::sha256_hex(&key.to_bytes())[..16].to_string()
}

fn attest(etag: &str, signing_key: &SigningKey) -> Attestation {
    let signature = signing_key.sign(etag.as_bytes());
    Attestation {
        attestation_format: ATTESTATION_FORMAT.to_string(),
        signer_public_key: BASE64.encode(signing_key.verifying_key().to_bytes()),
        bundle_attestation: BASE64.encode(signature.to_bytes()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignatureStatus {
    /// No attestation present and none required.
    Unsigned,
    /// A trusted key was supplied but the bundle carries no attestation.
    Missing,
    Valid { fingerprint: String },
    /// Signed by a well-formed key other than the trusted one.
    UntrustedSigner { fingerprint: String },
    Invalid { reason: String },
}

impl SignatureStatus {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, SignatureStatus::Unsigned | SignatureStatus::Valid { .. })
    }
}

/// Outcome of re-checking a proof bundle offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofVerification {
    pub document_id: String,
    /// Format tag, algorithm descriptor and genesis constant are the ones
    /// this verifier implements.
    pub format_supported: bool,
    pub etag_matches: bool,
    /// Chain verdict recomputed from the bundled versions.
    pub chain: VerificationResult,
    /// Ids of events whose payload no longer hashes to `payload_hash`.
    pub event_mismatches: Vec<String>,
    pub signature: SignatureStatus,
    /// The recomputed verdict equals the exporter's embedded verdict.
    pub verdict_matches: bool,
}

impl ProofVerification {
    pub fn valid(&self) -> bool {
        self.format_supported
            && self.etag_matches
            && self.chain.valid
            && self.event_mismatches.is_empty()
            && self.verdict_matches
            && self.signature.is_acceptable()
    }
}

/// Check a proof bundle with no access to the live store.
///
/// When `trusted_key` is given, the bundle must carry a valid attestation
/// made with that key.
pub fn verify_proof(
    proof: &ProofBundle,
    trusted_key: Option<&VerifyingKey>,
) -> Result<ProofVerification, LedgerError> {
    let body = &proof.bundle;
    let format_supported = body.format == PROOF_FORMAT
        && body.algorithm == hasher::CHAIN_ALGORITHM
        && body.genesis_chain_hash == hasher::GENESIS_CHAIN_HASH;
    let etag_matches = compute_etag(body)? == proof.etag;
    let chain = verify::verify_chain(&body.document_id, &body.versions);
    let event_mismatches = body
        .events
        .iter()
        .filter(|e| hasher::hash_payload(&e.payload) != e.payload_hash)
        .map(|e| e.id.clone())
        .collect();
    let verdict_matches = chain.valid == body.verification.valid;
    let signature = check_attestation(&proof.etag, proof.trust.as_ref(), trusted_key);

    Ok(ProofVerification {
        document_id: body.document_id.clone(),
        format_supported,
        etag_matches,
        chain,
        event_mismatches,
        signature,
        verdict_matches,
    })
}

fn check_attestation(
    etag: &str,
    trust: Option<&Attestation>,
    trusted_key: Option<&VerifyingKey>,
) -> SignatureStatus {
    let Some(trust) = trust else {
        return match trusted_key {
            Some(_) => SignatureStatus::Missing,
            None => SignatureStatus::Unsigned,
        };
    };
    let invalid = |reason: String| SignatureStatus::Invalid { reason };

    if trust.attestation_format != ATTESTATION_FORMAT {
        return invalid(format!(
            "unsupported attestation format '{}'",
            trust.attestation_format
        ));
    }
    let key_bytes = match BASE64.decode(trust.signer_public_key.trim()) {
        Ok(b) => b,
        Err(e) => return invalid(format!("error decoding signer public key: {e}")),
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
        return invalid("signer public key must be 32 bytes".to_string());
    };
    let signer = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(k) => k,
        Err(e) => return invalid(format!("invalid signer public key: {e}")),
    };
    let sig_bytes = match BASE64.decode(trust.bundle_attestation.trim()) {
        Ok(b) => b,
        Err(e) => return invalid(format!("error decoding signature: {e}")),
    };
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(s) => s,
        Err(e) => return invalid(format!("malformed signature: {e}")),
    };
    if let Err(e) = signer.verify(etag.as_bytes(), &signature) {
        return invalid(format!("signature does not match etag: {e}"));
    }

    let fingerprint = key_fingerprint(&signer);
    match trusted_key {
        Some(expected) if expected != &signer => SignatureStatus::UntrustedSigner { fingerprint },
        _ => SignatureStatus::Valid { fingerprint },
    }
}

impl<S: LedgerStorage> DocumentLedger<S> {
    /// Export a self-contained proof bundle, signed when `signer` is given.
    pub async fn export_proof(
        &self,
        document_id: &str,
        signer: Option<&SigningKey>,
    ) -> Result<ProofBundle, LedgerError> {
        let trail = self.get_audit_trail(document_id).await?;
        let body = ProofBody {
            format: PROOF_FORMAT.to_string(),
            document_id: trail.document_id,
            object_type: trail.object_type,
            algorithm: hasher::CHAIN_ALGORITHM.to_string(),
            genesis_chain_hash: hasher::GENESIS_CHAIN_HASH.to_string(),
            review: trail.review,
            versions: trail.versions,
            events: trail.events,
            verification: trail.verification,
            exported_at: trail.generated_at,
        };
        let etag = compute_etag(&body)?;
        let trust = signer.map(|key| attest(&etag, key));
        tracing::info!(
            document_id,
            versions = body.versions.len(),
            signed = trust.is_some(),
            "exported proof"
        );
        Ok(ProofBundle {
            bundle: body,
            etag,
            trust,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docledger_storage::{ChangeType, DocumentSnapshot, MemoryStorage};
    use serde_json::json;

    use super::*;
    use crate::chain::AppendRequest;

    fn snap(v: serde_json::Value) -> DocumentSnapshot {
        serde_json::from_value(v).unwrap()
    }

    fn signing_key() -> SigningKey {
        SigningKey::generate(&mut rand::rngs::OsRng)
    }

    async fn exported(signer: Option<&SigningKey>) -> ProofBundle {
        let l = DocumentLedger::new(Arc::new(MemoryStorage::new()));
        l.append_version(AppendRequest::new(
            "inv-1",
            "invoice",
            ChangeType::Created,
            "alice",
            snap(json!({"amount": 100})),
        ))
        .await
        .unwrap();
        l.append_version(AppendRequest::new(
            "inv-1",
            "invoice",
            ChangeType::Modified,
            "alice",
            snap(json!({"amount": 150, "notes": "n"})),
        ))
        .await
        .unwrap();
        l.export_proof("inv-1", signer).await.unwrap()
    }

    #[tokio::test]
    async fn unsigned_proof_verifies() {
        let proof = exported(None).await;
        assert!(proof.trust.is_none());
        let report = verify_proof(&proof, None).unwrap();
        assert!(report.valid());
        assert_eq!(report.signature, SignatureStatus::Unsigned);
        assert_eq!(report.chain.version_count, 2);
    }

    #[tokio::test]
    async fn signed_proof_survives_json_round_trip() {
        let key = signing_key();
        let proof = exported(Some(&key)).await;
        let reparsed = ProofBundle::from_json(&proof.to_json_pretty().unwrap()).unwrap();
        let report = verify_proof(&reparsed, Some(&key.verifying_key())).unwrap();
        assert!(report.valid(), "{report:?}");
        assert_eq!(
            report.signature,
            SignatureStatus::Valid {
                fingerprint: key_fingerprint(&key.verifying_key())
            }
        );
    }

    #[tokio::test]
    async fn tampered_snapshot_is_caught_offline() {
        let mut proof = exported(None).await;
        proof.bundle.versions[0]
            .snapshot
            .insert("amount".to_string(), json!(1));
        let report = verify_proof(&proof, None).unwrap();
        assert!(!report.valid());
        assert!(!report.etag_matches);
        assert!(!report.chain.valid);
        assert!(!report.verdict_matches);
        assert_eq!(report.chain.offending_versions(), vec![1]);
    }

    #[tokio::test]
    async fn tampered_event_payload_is_caught() {
        let mut proof = exported(None).await;
        proof.bundle.events[0].payload = json!({"forged": true});
        proof.etag = compute_etag(&proof.bundle).unwrap();
        let report = verify_proof(&proof, None).unwrap();
        assert_eq!(report.event_mismatches, vec![proof.bundle.events[0].id.clone()]);
        assert!(!report.valid());
    }

    #[tokio::test]
    async fn wrong_or_missing_signer_is_reported() {
        let key = signing_key();
        let other = signing_key();
        let signed = exported(Some(&key)).await;
        let report = verify_proof(&signed, Some(&other.verifying_key())).unwrap();
        assert!(matches!(report.signature, SignatureStatus::UntrustedSigner { .. }));
        assert!(!report.valid());

        let unsigned = exported(None).await;
        let report = verify_proof(&unsigned, Some(&key.verifying_key())).unwrap();
        assert_eq!(report.signature, SignatureStatus::Missing);
    }

    #[tokio::test]
    async fn re_etagged_bundle_breaks_signature() {
        let key = signing_key();
        let mut proof = exported(Some(&key)).await;
        proof.bundle.review.review_comment = Some("edited".to_string());
        proof.etag = compute_etag(&proof.bundle).unwrap();
        let report = verify_proof(&proof, None).unwrap();
        assert!(report.etag_matches);
        assert!(matches!(report.signature, SignatureStatus::Invalid { .. }));
    }

    #[test]
    fn malformed_json_is_a_proof_error() {
        let err = ProofBundle::from_json("{\"bundle\": 3}").unwrap_err();
        assert!(matches!(err, LedgerError::Proof(_)));
    }
}
