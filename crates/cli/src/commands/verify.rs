use std::path::Path;
use std::process;

use docledger_ledger::{verify_proof, ProofVerification, SignatureStatus};

use super::load_proof;
use crate::keys;
use crate::{print_json, report_error, OutputFormat};

/// Verify a proof bundle without access to the ledger that produced it.
///
/// Re-runs the chain algorithm over the bundled versions, checks event
/// payload hashes, the etag, and the attestation. Exits 0 when the proof is
/// sound, 1 otherwise.
pub(crate) fn cmd_verify(
    proof_path: &Path,
    pubkey_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let proof = load_proof(proof_path, output, quiet);

    let trusted_key = match pubkey_path.map(keys::read_public_key).transpose() {
        Ok(k) => k,
        Err(e) => {
            report_error(&format!("Verification failed: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let report = match verify_proof(&proof, trusted_key.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("Verification failed: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "valid": report.valid(),
                "report": report,
            })),
            OutputFormat::Text => print_text(&report),
        }
    }
    if !report.valid() {
        process::exit(1);
    }
}

fn print_text(report: &ProofVerification) {
    if report.valid() {
        println!(
            "Proof OK: document {} ({} version(s))",
            report.document_id, report.chain.version_count
        );
    } else {
        println!("Verification failed: document {}", report.document_id);
    }
    if !report.format_supported {
        println!("  unsupported proof format or chain algorithm");
    }
    if !report.etag_matches {
        println!("  etag mismatch: bundle content was modified after export");
    }
    for finding in &report.chain.errors {
        println!("  version {}: {}", finding.version_number, finding.message);
    }
    for id in &report.event_mismatches {
        println!("  event {}: payload hash mismatch", id);
    }
    if !report.verdict_matches {
        println!("  embedded verification verdict disagrees with recomputation");
    }
    match &report.signature {
        SignatureStatus::Unsigned => println!("  unsigned"),
        SignatureStatus::Missing => println!("  signature required but missing"),
        SignatureStatus::Valid { fingerprint } => println!("  signed by {}", fingerprint),
        SignatureStatus::UntrustedSigner { fingerprint } => {
            println!("  signed by untrusted key {}", fingerprint)
        }
        SignatureStatus::Invalid { reason } => println!("  invalid signature: {}", reason),
    }
}
