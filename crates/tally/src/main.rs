// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tally - daily usage, cost, and productivity ingestion.
//!
//! This is the binary entry point. It loads configuration, resolves the
//! admin key, and dispatches to the ingest and query commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod allocate;
mod ingest;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tally_config::TallyConfig;
use tally_core::SourceKind;

/// Tally - daily usage, cost, and productivity ingestion.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest every configured source for one day.
    Ingest {
        /// Activity date (YYYY-MM-DD, UTC).
        #[arg(long)]
        date: NaiveDate,
        /// Re-run only these sources (repeatable).
        #[arg(long = "source")]
        sources: Vec<SourceKind>,
        #[arg(long)]
        json: bool,
    },
    /// Ingest each day from `--from` through `--to`, inclusive.
    Backfill {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        json: bool,
    },
    /// Approximate per-API-key cost by token share.
    Allocate {
        #[arg(long)]
        date: NaiveDate,
        /// Model to allocate; every model with spend when omitted.
        #[arg(long)]
        model: Option<String>,
        /// Workspace id; the default (null) workspace when omitted.
        #[arg(long, conflicts_with = "all_workspaces")]
        workspace: Option<String>,
        /// Allocate across every workspace instead of a single one.
        #[arg(long = "all-workspaces")]
        all_workspaces: bool,
        #[arg(long)]
        json: bool,
    },
    /// Compare loaded spend for one workspace with an external figure.
    Reconcile {
        #[arg(long)]
        date: NaiveDate,
        /// Reference spend in USD, e.g. from an invoice or the console.
        #[arg(long = "reference-usd")]
        reference_usd: Decimal,
        /// Workspace id; the default (null) workspace when omitted.
        #[arg(long)]
        workspace: Option<String>,
        /// Allowed difference in USD; `validation.reconcile_epsilon_usd` when omitted.
        #[arg(long = "epsilon-usd")]
        epsilon_usd: Option<Decimal>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tally_config::load_and_validate_path(path),
        None => tally_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tally_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.ingest.log_level);

    let result = run(cli.command, &config).await;
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("tally: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &TallyConfig) -> Result<ExitCode, tally_core::TallyError> {
    match command {
        Commands::Ingest {
            date,
            sources,
            json,
        } => ingest::run_ingest(config, date, &sources, json).await,
        Commands::Backfill { from, to, json } => {
            ingest::run_backfill(config, from, to, json).await
        }
        Commands::Allocate {
            date,
            model,
            workspace,
            all_workspaces,
            json,
        } => {
            let scope = if all_workspaces {
                allocate::WorkspaceScope::All
            } else {
                allocate::WorkspaceScope::One(workspace)
            };
            allocate::run_allocate(config, date, model.as_deref(), scope, json)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Reconcile {
            date,
            reference_usd,
            workspace,
            epsilon_usd,
            json,
        } => {
            allocate::run_reconcile(
                config,
                date,
                workspace.as_deref(),
                reference_usd,
                epsilon_usd,
                json,
            )
            .await
        }
    }
}

/// Initialize the tracing subscriber with an EnvFilter. Logs go to stderr so
/// `--json` output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tally={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
