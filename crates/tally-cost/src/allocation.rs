// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approximate per-API-key cost by proportional token share.
//!
//! The cost report cannot be grouped by API key, so exact per-key spend is
//! not available. This view spreads the (date, workspace, model) cost total
//! across keys in proportion to each key's total token count, which assumes
//! one uniform price per token across input, output, and cache token types.
//! Results are an approximation and are labelled as such; they are computed
//! on demand and never written back to the sink.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::{AnalyticalSink, CostRecord, TallyError, UsageRecord};
use tracing::debug;

/// Key used for usage rows that carry no API key (console or workbench use).
pub const UNATTRIBUTED_KEY: &str = "unattributed";

/// Decimal places kept on allocated amounts.
pub const ALLOCATION_SCALE: u32 = 6;

/// One key's estimated slice of a cost total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyAllocation {
    pub api_key_id: String,
    pub tokens: u64,
    pub approximate_cost_usd: Decimal,
}

/// Estimated split of one (date, workspace, model) cost total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub date: NaiveDate,
    pub workspace_id: Option<String>,
    pub model: String,
    pub total_cost_usd: Decimal,
    pub total_tokens: u64,
    pub keys: Vec<KeyAllocation>,
    /// Part of the total not assigned to any key: everything when there is
    /// no usage, otherwise the rounding remainder.
    pub unallocated_usd: Decimal,
}

impl Allocation {
    /// `api_key_id -> approximate_cost_usd`.
    pub fn by_key(&self) -> BTreeMap<String, Decimal> {
        self.keys
            .iter()
            .map(|k| (k.api_key_id.clone(), k.approximate_cost_usd))
            .collect()
    }

    /// Proportional split computed from already loaded rows. Rows for other
    /// dates, workspaces, or models are ignored.
    pub fn compute(
        date: NaiveDate,
        workspace: Option<&str>,
        model: &str,
        costs: &[CostRecord],
        usage: &[UsageRecord],
    ) -> Result<Self, TallyError> {
        let total_cost_usd: Decimal = costs
            .iter()
            .filter(|c| {
                c.activity_date == date
                    && c.workspace_id.as_deref() == workspace
                    && c.model.as_deref() == Some(model)
            })
            .map(|c| c.amount_usd)
            .sum();

        let mut tokens_by_key: BTreeMap<String, u64> = BTreeMap::new();
        for row in usage.iter().filter(|u| {
            u.activity_date == date
                && u.workspace_id.as_deref() == workspace
                && u.model.as_deref() == Some(model)
        }) {
            let key = row
                .api_key_id
                .clone()
                .unwrap_or_else(|| UNATTRIBUTED_KEY.to_string());
            let entry = tokens_by_key.entry(key).or_default();
            *entry = entry.saturating_add(row.total_tokens());
        }
        tokens_by_key.retain(|_, tokens| *tokens > 0);

        let total_tokens = tokens_by_key
            .values()
            .fold(0u64, |acc, t| acc.saturating_add(*t));

        let mut keys = Vec::with_capacity(tokens_by_key.len());
        if total_tokens > 0 {
            let denominator = Decimal::from(total_tokens);
            for (api_key_id, tokens) in tokens_by_key {
                let cost = total_cost_usd
                    .checked_mul(Decimal::from(tokens))
                    .and_then(|scaled| scaled.checked_div(denominator))
                    .ok_or_else(|| {
                        TallyError::Internal(format!(
                            "allocation overflow for {api_key_id} on {date}"
                        ))
                    })?;
                keys.push(KeyAllocation {
                    api_key_id,
                    tokens,
                    approximate_cost_usd: cost.round_dp(ALLOCATION_SCALE),
                });
            }
        }

        let allocated: Decimal = keys.iter().map(|k| k.approximate_cost_usd).sum();
        Ok(Self {
            date,
            workspace_id: workspace.map(String::from),
            model: model.to_string(),
            total_cost_usd,
            total_tokens,
            keys,
            unallocated_usd: total_cost_usd - allocated,
        })
    }
}

/// On-demand allocation queries against the sink.
#[derive(Clone)]
pub struct CostAllocationView {
    sink: Arc<dyn AnalyticalSink>,
}

impl CostAllocationView {
    pub fn new(sink: Arc<dyn AnalyticalSink>) -> Self {
        Self { sink }
    }

    /// Split the cost of `model` in `workspace` on `date` across API keys.
    /// `workspace = None` selects the null workspace, not all workspaces.
    pub async fn allocate(
        &self,
        date: NaiveDate,
        workspace: Option<&str>,
        model: &str,
    ) -> Result<Allocation, TallyError> {
        let costs = self.sink.cost_records(date).await?;
        let usage = self.sink.usage_records(date).await?;
        let allocation = Allocation::compute(date, workspace, model, &costs, &usage)?;
        debug!(
            date = %date,
            workspace = workspace.unwrap_or("null"),
            model,
            keys = allocation.keys.len(),
            total_cost_usd = %allocation.total_cost_usd,
            "cost allocated"
        );
        Ok(allocation)
    }

    /// Allocations for every (workspace, model) pair with model-attributed
    /// spend on `date`, ordered by workspace then model.
    pub async fn allocate_day(&self, date: NaiveDate) -> Result<Vec<Allocation>, TallyError> {
        let costs = self.sink.cost_records(date).await?;
        let usage = self.sink.usage_records(date).await?;

        let pairs: BTreeSet<(Option<String>, String)> = costs
            .iter()
            .filter_map(|c| c.model.clone().map(|m| (c.workspace_id.clone(), m)))
            .collect();

        pairs
            .iter()
            .map(|(workspace, model)| {
                Allocation::compute(date, workspace.as_deref(), model, &costs, &usage)
            })
            .collect()
    }
}
