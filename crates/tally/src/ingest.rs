// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally ingest` and `tally backfill`.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use secrecy::SecretString;
use tally_admin_api::{FetchClient, RetryPolicy};
use tally_config::TallyConfig;
use tally_core::{CredentialProvider, DateRange, EnvCredentials, SourceKind, TallyError};
use tally_ingest::IngestionOrchestrator;
use tally_storage::SqliteSink;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::output;

/// Exit status when the command ran but some source or date failed.
const PARTIAL_FAILURE: u8 = 2;

/// The admin key named by `admin_api.api_key_credential`.
pub fn resolve_api_key(
    provider: &dyn CredentialProvider,
    config: &TallyConfig,
) -> Result<SecretString, TallyError> {
    provider.get_credential(&config.admin_api.api_key_credential)
}

/// Cancelled on Ctrl+C. Running sources stop at their next page boundary.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling ingestion");
            trigger.cancel();
        }
    });
    token
}

async fn build_orchestrator(config: &TallyConfig) -> Result<IngestionOrchestrator, TallyError> {
    let api_key = resolve_api_key(&EnvCredentials, config)?;
    let sink = Arc::new(SqliteSink::open(&config.storage).await?);
    let client = FetchClient::new(&config.admin_api, api_key, RetryPolicy::from(&config.retry))?;
    debug!(client = ?client, "fetch client ready");

    Ok(IngestionOrchestrator::new(config, client, sink)?.with_cancellation(install_signal_handler()))
}

pub async fn run_ingest(
    config: &TallyConfig,
    date: NaiveDate,
    sources: &[SourceKind],
    json: bool,
) -> Result<ExitCode, TallyError> {
    let orchestrator = build_orchestrator(config).await?;
    let report = if sources.is_empty() {
        orchestrator.ingest(date).await
    } else {
        orchestrator.ingest_sources(date, sources).await
    };

    output::print_run(&report, json)?;
    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(PARTIAL_FAILURE)
    })
}

pub async fn run_backfill(
    config: &TallyConfig,
    from: NaiveDate,
    to: NaiveDate,
    json: bool,
) -> Result<ExitCode, TallyError> {
    let range = DateRange::inclusive(from, to)?;
    let orchestrator = build_orchestrator(config).await?;
    let report = orchestrator.backfill(range).await;

    output::print_backfill(&report, json)?;
    Ok(if report.failed_dates.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(PARTIAL_FAILURE)
    })
}
