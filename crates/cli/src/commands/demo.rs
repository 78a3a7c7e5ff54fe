//! Scripted invoice review walk-through against the in-memory backend.

use std::path::Path;
use std::process;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use serde_json::json;

use docledger_ledger::{
    AppendRequest, ChangeType, DocumentLedger, DocumentSnapshot, LedgerConfig, LedgerError,
    ProofBundle,
};
use docledger_storage::MemoryStorage;

use super::load_config;
use crate::keys;
use crate::{print_json, report_error, OutputFormat};

const DOCUMENT_ID: &str = "INV-DEMO-1";

pub(crate) struct DemoOptions<'a> {
    pub out: &'a Path,
    pub key: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub tamper: bool,
    pub output: OutputFormat,
    pub quiet: bool,
}

fn snapshot(v: serde_json::Value) -> DocumentSnapshot {
    match v {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => DocumentSnapshot::new(),
    }
}

pub(crate) fn cmd_demo(opts: DemoOptions<'_>) {
    let config = load_config(opts.config, opts.output, opts.quiet);
    let signing_key = match opts.key.map(keys::read_secret_key).transpose() {
        Ok(k) => k,
        Err(e) => {
            report_error(&e, opts.output, opts.quiet);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), opts.output, opts.quiet);
            process::exit(1);
        }
    };
    let proof = match rt.block_on(run_scenario(config, signing_key.as_ref(), opts.tamper)) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("demo failed: {}", e), opts.output, opts.quiet);
            process::exit(1);
        }
    };

    let written = proof
        .to_json_pretty()
        .map_err(|e| e.to_string())
        .and_then(|s| std::fs::write(opts.out, s).map_err(|e| e.to_string()));
    if let Err(e) = written {
        let msg = format!("error writing '{}': {}", opts.out.display(), e);
        report_error(&msg, opts.output, opts.quiet);
        process::exit(1);
    }

    if opts.quiet {
        return;
    }
    let body = &proof.bundle;
    match opts.output {
        OutputFormat::Json => print_json(&json!({
            "document_id": body.document_id,
            "proof": opts.out.display().to_string(),
            "versions": body.versions.len(),
            "review_status": body.review.review_status,
            "valid": body.verification.valid,
            "signed": proof.trust.is_some(),
        })),
        OutputFormat::Text => {
            for v in &body.versions {
                println!(
                    "v{} {:<10} {:<14} {}",
                    v.version_number,
                    v.change_type.as_str(),
                    v.change_severity.to_string(),
                    v.chain_hash.get(..16).unwrap_or(&v.chain_hash)
                );
            }
            println!(
                "review: {} ({} required action(s))",
                body.review.review_status,
                body.review.required_actions.len()
            );
            println!(
                "chain: {}",
                if body.verification.valid {
                    "valid"
                } else {
                    "INVALID"
                }
            );
            println!("Wrote proof to {}", opts.out.display());
        }
    }
}

/// Create, edit, review, and re-edit one invoice, then export its proof.
async fn run_scenario(
    config: LedgerConfig,
    signer: Option<&SigningKey>,
    tamper: bool,
) -> Result<ProofBundle, LedgerError> {
    let storage = Arc::new(MemoryStorage::new());
    let ledger = DocumentLedger::new(storage.clone()).with_config(config);
    let save = |change_type, v| {
        AppendRequest::new(DOCUMENT_ID, "invoice", change_type, "demo-clerk", snapshot(v))
    };

    ledger
        .append_version(save(
            ChangeType::Created,
            json!({"amount": 100, "currency": "EUR"}),
        ))
        .await?;
    let v2 = ledger
        .append_version(
            save(
                ChangeType::Modified,
                json!({"amount": 150, "currency": "EUR"}),
            )
            .with_reason("price agreed with customer"),
        )
        .await?;
    ledger
        .submit_for_review(DOCUMENT_ID, &v2.id, "demo-clerk")
        .await?;
    ledger
        .accept(DOCUMENT_ID, &v2.id, "demo-controller", Some("matches order"))
        .await?;
    ledger
        .append_version(save(
            ChangeType::Issued,
            json!({"amount": 150, "currency": "EUR", "notes": "thanks"}),
        ))
        .await?;
    ledger
        .append_version(
            save(
                ChangeType::Corrected,
                json!({"amount": 200, "currency": "EUR", "notes": "thanks"}),
            )
            .with_reason("late surcharge"),
        )
        .await?;

    if tamper {
        let mut victim = ledger.get_version(&v2.id).await?;
        victim.snapshot.insert("amount".to_string(), json!(15));
        storage.overwrite_version(victim)?;
        tracing::warn!(document_id = DOCUMENT_ID, "version 2 corrupted out of band");
    }

    ledger.export_proof(DOCUMENT_ID, signer).await
}
