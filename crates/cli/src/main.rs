mod commands;
mod keys;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Tamper-evident document ledger tooling.
#[derive(Parser)]
#[command(name = "docledger", version, about = "Tamper-evident document ledger tooling")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 keypair for signing proof bundles
    Keygen {
        /// Signing algorithm (only ed25519 is supported)
        #[arg(long, default_value = "ed25519")]
        algorithm: String,
        /// Output file prefix; writes <prefix>.secret and <prefix>.pub
        #[arg(long, default_value = "docledger-key")]
        prefix: String,
    },

    /// Verify a proof bundle offline
    Verify {
        /// Path to the proof bundle JSON
        proof: PathBuf,
        /// Require a signature by this public key (.pub file)
        #[arg(long)]
        pubkey: Option<PathBuf>,
    },

    /// Show field-level changes between two versions in a proof bundle
    Diff {
        /// Path to the proof bundle JSON
        proof: PathBuf,
        /// Version number to diff from
        from: i64,
        /// Version number to diff to
        to: i64,
        /// Ledger configuration (TOML) supplying the field registry
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Classify a set of changed fields
    Classify {
        /// Object type whose registry entries apply
        #[arg(long, default_value = "invoice")]
        object_type: String,
        /// Changed field names
        #[arg(required = true)]
        fields: Vec<String>,
        /// Ledger configuration (TOML) supplying the field registry
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the scripted invoice review scenario in memory and export its proof
    Demo {
        /// Where to write the proof bundle
        #[arg(long, default_value = "docledger-proof.json")]
        out: PathBuf,
        /// Sign the proof with this secret key (.secret file)
        #[arg(long)]
        key: Option<PathBuf>,
        /// Ledger configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Corrupt version 2 out of band before exporting
        #[arg(long)]
        tamper: bool,
    },
}

fn init_tracing(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Keygen { algorithm, prefix } => {
            commands::keygen::cmd_keygen(&algorithm, &prefix, cli.output, cli.quiet);
        }
        Commands::Verify { proof, pubkey } => {
            commands::verify::cmd_verify(&proof, pubkey.as_deref(), cli.output, cli.quiet);
        }
        Commands::Diff {
            proof,
            from,
            to,
            config,
        } => {
            commands::diff::cmd_diff(&proof, from, to, config.as_deref(), cli.output, cli.quiet);
        }
        Commands::Classify {
            object_type,
            fields,
            config,
        } => {
            commands::classify::cmd_classify(
                &object_type,
                &fields,
                config.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Demo {
            out,
            key,
            config,
            tamper,
        } => {
            commands::demo::cmd_demo(commands::demo::DemoOptions {
                out: &out,
                key: key.as_deref(),
                config: config.as_deref(),
                tamper,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

/// Print an error to stderr in the selected format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a serializable value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("serialization error: {}", e),
    }
}
