use std::process;

use docledger_ledger::key_fingerprint;

use crate::keys;
use crate::{print_json, report_error, OutputFormat};

pub(crate) fn cmd_keygen(algorithm: &str, prefix: &str, output: OutputFormat, quiet: bool) {
    if algorithm != "ed25519" {
        let msg = format!(
            "error: unsupported algorithm '{}'; only 'ed25519' is supported",
            algorithm
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    let (secret_path, pub_path, verifying_key) = match keys::write_keypair(prefix) {
        Ok(k) => k,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    let fingerprint = key_fingerprint(&verifying_key);
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "secret": secret_path,
            "public": pub_path,
            "fingerprint": fingerprint,
        })),
        OutputFormat::Text => println!(
            "Generated Ed25519 keypair: {}, {} (fingerprint {})",
            secret_path, pub_path, fingerprint
        ),
    }
}
