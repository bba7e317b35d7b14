// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend totals for one day.
//!
//! Totals are computed from the cost relation only. Usage and productivity
//! rows never contribute money.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::{AnalyticalSink, CostRecord, TallyError};

/// Daily spend, overall and split by workspace and by model. A `None` key is
/// the null workspace (or model-less line items), kept as its own bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRollup {
    pub date: NaiveDate,
    pub total_usd: Decimal,
    pub by_workspace: BTreeMap<Option<String>, Decimal>,
    pub by_model: BTreeMap<Option<String>, Decimal>,
}

impl SpendRollup {
    pub fn from_records(date: NaiveDate, records: &[CostRecord]) -> Self {
        let mut total_usd = Decimal::ZERO;
        let mut by_workspace: BTreeMap<Option<String>, Decimal> = BTreeMap::new();
        let mut by_model: BTreeMap<Option<String>, Decimal> = BTreeMap::new();

        for record in records.iter().filter(|r| r.activity_date == date) {
            total_usd += record.amount_usd;
            *by_workspace.entry(record.workspace_id.clone()).or_default() += record.amount_usd;
            *by_model.entry(record.model.clone()).or_default() += record.amount_usd;
        }

        Self {
            date,
            total_usd,
            by_workspace,
            by_model,
        }
    }

    pub async fn load(sink: &dyn AnalyticalSink, date: NaiveDate) -> Result<Self, TallyError> {
        let records = sink.cost_records(date).await?;
        Ok(Self::from_records(date, &records))
    }

    /// Spend of one workspace; `None` is the null workspace.
    pub fn workspace_total(&self, workspace: Option<&str>) -> Decimal {
        self.by_workspace
            .get(&workspace.map(String::from))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
