use std::path::Path;
use std::process;

use docledger_ledger::{diff_snapshots, VersionDiff};

use super::{load_config, load_proof};
use crate::{print_json, report_error, OutputFormat};

/// Diff two versions of the document held in a proof bundle.
pub(crate) fn cmd_diff(
    proof_path: &Path,
    from: i64,
    to: i64,
    config_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let proof = load_proof(proof_path, output, quiet);
    let config = load_config(config_path, output, quiet);
    let versions = &proof.bundle.versions;

    let find = |n: i64| match versions.iter().find(|v| v.version_number == n) {
        Some(v) => v,
        None => {
            let msg = format!(
                "version {} not found in proof for document {}",
                n, proof.bundle.document_id
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let old = find(from);
    let new = find(to);

    let (changes, severity) =
        diff_snapshots(&config.registry, &new.object_type, &old.snapshot, &new.snapshot);
    let diff = VersionDiff {
        document_id: proof.bundle.document_id.clone(),
        from_version: from,
        to_version: to,
        changes,
        severity,
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&diff),
        OutputFormat::Text => {
            if diff.changes.is_empty() {
                println!("no differences");
                return;
            }
            println!(
                "{} change(s) from version {} to {}: {}",
                diff.changes.len(),
                from,
                to,
                diff.severity
            );
            for change in &diff.changes {
                let show = |v: &Option<serde_json::Value>| {
                    v.as_ref()
                        .map_or_else(|| "<absent>".to_string(), |v| v.to_string())
                };
                println!(
                    "  {}{}: {} -> {}",
                    if change.accounting { "*" } else { " " },
                    change.field,
                    show(&change.old),
                    show(&change.new)
                );
            }
        }
    }
}
