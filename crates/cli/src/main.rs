// assignrec CLI - snapshot comparison and norms-based quantity derivation

mod commands;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assignrec_recon::ReconError;
use exit_codes::{recon_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "assignrec")]
#[command(about = "Compare resource-assignment snapshots and derive equipment quantities from norms")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition two snapshots into only-before, only-after and in-both
    #[command(after_help = "\
Examples:
  assignrec compare weekly.toml
  assignrec compare weekly.toml --json

Writes the [compare.output] only_before, only_after and both tables.
Paths in the config are relative to the config file.")]
    Compare {
        /// Path to the run config (.toml) with a [compare] section
        config: PathBuf,

        /// Print the run summary as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Report in-both pairs whose tracked quantities changed
    #[command(after_help = "\
Examples:
  assignrec changes weekly.toml
  assignrec changes weekly.toml --json | jq '.changed[].key'

Writes the [compare.output] changed table, one row per changed pair with a
changed_fields column listing the fields that differ.")]
    Changes {
        /// Path to the run config (.toml) with a [compare] section
        config: PathBuf,

        /// Print the run summary (including changed fields) as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Derive equipment quantities from material quantities and norms
    #[command(after_help = "\
Examples:
  assignrec derive plan.toml
  assignrec derive plan.toml --dry-run --json

Overwrites target/actual/remaining quantities of equipment rows in the
activity table (or adds calc_* columns with mode = \"annotate\").
Without [derive] output the activity file itself is rewritten.")]
    Derive {
        /// Path to the run config (.toml) with a [derive] section
        config: PathBuf,

        /// Print the run summary as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Run the derivation but do not write the output table
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and validate a run config without reading any table
    #[command(after_help = "\
Examples:
  assignrec validate plan.toml")]
    Validate {
        /// Path to the run config (.toml)
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  assignrec-recon ", env!("CARGO_PKG_VERSION"),
    )
}

fn main() -> ExitCode {
    // Logs go to stderr so --json stdout stays a single JSON value
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare { config, json } => commands::cmd_compare(config, json),
        Commands::Changes { config, json } => commands::cmd_changes(config, json),
        Commands::Derive { config, json, dry_run } => commands::cmd_derive(config, json, dry_run),
        Commands::Validate { config } => commands::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::Schema { input, .. } if input == "norms" => {
                Some("map the column name under [columns.norms] in the config".to_string())
            }
            ReconError::Schema { .. } => {
                Some("map the column name under [columns.activity] in the config".to_string())
            }
            ReconError::EmptyKey { .. } => {
                Some("set empty_keys = \"warn\" to exclude such rows instead".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}
