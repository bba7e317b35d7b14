// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally allocate` and `tally reconcile`: read-only queries over the sink.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_config::TallyConfig;
use tally_core::TallyError;
use tally_cost::CostAllocationView;
use tally_ingest::{ValidationEngine, ValidationPolicy};
use tally_storage::SqliteSink;

use crate::output;

/// Which workspaces an allocation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceScope {
    All,
    /// `None` is the null workspace.
    One(Option<String>),
}

pub async fn run_allocate(
    config: &TallyConfig,
    date: NaiveDate,
    model: Option<&str>,
    scope: WorkspaceScope,
    json: bool,
) -> Result<(), TallyError> {
    let sink = Arc::new(SqliteSink::open(&config.storage).await?);
    let view = CostAllocationView::new(sink);

    let allocations = match (model, &scope) {
        (Some(model), WorkspaceScope::One(workspace)) => {
            vec![view.allocate(date, workspace.as_deref(), model).await?]
        }
        _ => view
            .allocate_day(date)
            .await?
            .into_iter()
            .filter(|a| model.is_none_or(|m| a.model == m))
            .filter(|a| match &scope {
                WorkspaceScope::All => true,
                WorkspaceScope::One(workspace) => a.workspace_id == *workspace,
            })
            .collect(),
    };

    output::print_allocations(&allocations, json)
}

pub async fn run_reconcile(
    config: &TallyConfig,
    date: NaiveDate,
    workspace: Option<&str>,
    reference_usd: Decimal,
    epsilon_usd: Option<Decimal>,
    json: bool,
) -> Result<ExitCode, TallyError> {
    let sink = Arc::new(SqliteSink::open(&config.storage).await?);
    let engine = ValidationEngine::new(sink, ValidationPolicy::from_config(&config.validation)?);
    let epsilon = epsilon_usd.unwrap_or(engine.policy().reconcile_epsilon_usd);

    let reconciliation = engine
        .reconcile(date, workspace, reference_usd, epsilon)
        .await?;
    output::print_reconciliation(&reconciliation, json)?;

    Ok(if reconciliation.within_tolerance {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
