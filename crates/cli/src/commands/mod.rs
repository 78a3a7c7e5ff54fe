pub(crate) mod classify;
pub(crate) mod demo;
pub(crate) mod diff;
pub(crate) mod keygen;
pub(crate) mod verify;

use std::path::Path;
use std::process;

use docledger_ledger::{LedgerConfig, ProofBundle};

use crate::{report_error, OutputFormat};

/// Read and parse a proof bundle, exiting with status 1 on failure.
pub(crate) fn load_proof(path: &Path, output: OutputFormat, quiet: bool) -> ProofBundle {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match ProofBundle::from_json(&source) {
        Ok(p) => p,
        Err(e) => {
            let msg = format!("error in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Load the ledger configuration, or the defaults when no path is given.
pub(crate) fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> LedgerConfig {
    let Some(path) = path else {
        return LedgerConfig::default();
    };
    match LedgerConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}
