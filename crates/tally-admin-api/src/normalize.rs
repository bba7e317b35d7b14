// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw payload to canonical record conversion.
//!
//! Normalization is pure: the same raw record always produces the same
//! canonical record. Amounts arrive in cents as decimal strings and leave as
//! exact dollars; nothing passes through floating point.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tally_core::{
    ActorType, CanonicalRecord, CostRecord, NaturalKey, ProductivityRecord, Relation, SourceKind,
    TallyError, UsageRecord,
};

use crate::types::{Actor, Bucket, ClaudeCodeRecord, CostResult, UsageResult};

const DEFAULT_CURRENCY: &str = "USD";
const UNKNOWN_TERMINAL: &str = "unknown";

/// One item of one endpoint, with the context needed to normalize it.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Cost {
        bucket_start: DateTime<Utc>,
        result: CostResult,
    },
    Usage {
        bucket_start: DateTime<Utc>,
        result: UsageResult,
    },
    ClaudeCode(ClaudeCodeRecord),
}

impl RawRecord {
    pub fn source(&self) -> SourceKind {
        match self {
            RawRecord::Cost { .. } => SourceKind::CostReport,
            RawRecord::Usage { .. } => SourceKind::MessagesUsage,
            RawRecord::ClaudeCode(_) => SourceKind::ClaudeCode,
        }
    }
}

/// A page item type of one endpoint.
pub trait PageItem: DeserializeOwned + Send + 'static {
    const SOURCE: SourceKind;

    /// Flattens the item into raw records. Buckets yield one per result.
    fn into_raw_records(self) -> Vec<RawRecord>;
}

impl PageItem for Bucket<CostResult> {
    const SOURCE: SourceKind = SourceKind::CostReport;

    fn into_raw_records(self) -> Vec<RawRecord> {
        let bucket_start = self.starting_at;
        self.results
            .into_iter()
            .map(|result| RawRecord::Cost {
                bucket_start,
                result,
            })
            .collect()
    }
}

impl PageItem for Bucket<UsageResult> {
    const SOURCE: SourceKind = SourceKind::MessagesUsage;

    fn into_raw_records(self) -> Vec<RawRecord> {
        let bucket_start = self.starting_at;
        self.results
            .into_iter()
            .map(|result| RawRecord::Usage {
                bucket_start,
                result,
            })
            .collect()
    }
}

impl PageItem for ClaudeCodeRecord {
    const SOURCE: SourceKind = SourceKind::ClaudeCode;

    fn into_raw_records(self) -> Vec<RawRecord> {
        vec![RawRecord::ClaudeCode(self)]
    }
}

/// Converts raw endpoint records into canonical records.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    org_id: String,
}

impl RecordNormalizer {
    /// `org_id` is stamped on records whose payload does not name one.
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
        }
    }

    pub fn normalize(&self, raw: RawRecord) -> Result<CanonicalRecord, TallyError> {
        match raw {
            RawRecord::Cost {
                bucket_start,
                result,
            } => self
                .normalize_cost(bucket_start, result)
                .map(CanonicalRecord::Cost),
            RawRecord::Usage {
                bucket_start,
                result,
            } => Ok(CanonicalRecord::Usage(
                self.normalize_usage(bucket_start, result),
            )),
            RawRecord::ClaudeCode(record) => self
                .normalize_productivity(record)
                .map(CanonicalRecord::Productivity),
        }
    }

    pub fn normalize_cost(
        &self,
        bucket_start: DateTime<Utc>,
        result: CostResult,
    ) -> Result<CostRecord, TallyError> {
        let currency = result
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        if !currency.eq_ignore_ascii_case(DEFAULT_CURRENCY) {
            return Err(normalize_error(
                SourceKind::CostReport,
                format!("unsupported currency `{currency}`"),
            ));
        }

        Ok(CostRecord {
            activity_date: bucket_start.date_naive(),
            org_id: self.org_id.clone(),
            workspace_id: result.workspace_id,
            model: result.model,
            token_type: result.token_type,
            cost_type: result.cost_type,
            amount_usd: cents_to_dollars(&result.amount)?,
            currency: DEFAULT_CURRENCY.to_string(),
            description: result.description,
            service_tier: result.service_tier,
            context_window: result.context_window,
        })
    }

    pub fn normalize_usage(&self, bucket_start: DateTime<Utc>, result: UsageResult) -> UsageRecord {
        UsageRecord {
            activity_date: bucket_start.date_naive(),
            org_id: self.org_id.clone(),
            api_key_id: result.api_key_id,
            workspace_id: result.workspace_id,
            model: result.model,
            uncached_input_tokens: result.uncached_input_tokens,
            cache_creation_1h_tokens: result.cache_creation.ephemeral_1h_input_tokens,
            cache_creation_5m_tokens: result.cache_creation.ephemeral_5m_input_tokens,
            cache_read_tokens: result.cache_read_input_tokens,
            output_tokens: result.output_tokens,
            web_search_requests: result.server_tool_use.web_search_requests,
            service_tier: result.service_tier,
            context_window: result.context_window,
        }
    }

    /// Reads only activity fields. The estimated cost the endpoint reports
    /// per actor is already counted in the cost relation.
    pub fn normalize_productivity(
        &self,
        record: ClaudeCodeRecord,
    ) -> Result<ProductivityRecord, TallyError> {
        let activity_date = parse_activity_date(&record.date)?;
        let (actor_type, user_email, api_key_name) = match record.actor {
            Actor::UserActor { email_address } => (ActorType::User, Some(email_address), None),
            Actor::ApiActor { api_key_name } => (ActorType::ApiKey, None, Some(api_key_name)),
        };
        let core = record.core_metrics;
        let tools = record.tool_actions;

        Ok(ProductivityRecord {
            activity_date,
            org_id: record
                .organization_id
                .unwrap_or_else(|| self.org_id.clone()),
            actor_type,
            user_email,
            api_key_name,
            terminal_type: record
                .terminal_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNKNOWN_TERMINAL.to_string()),
            customer_type: record.customer_type,
            sessions: core.num_sessions,
            lines_added: core.lines_of_code.added,
            lines_removed: core.lines_of_code.removed,
            commits: core.commits_by_claude_code,
            pull_requests: core.pull_requests_by_claude_code,
            edit_tool_accepted: tools.edit_tool.accepted,
            edit_tool_rejected: tools.edit_tool.rejected,
            multi_edit_tool_accepted: tools.multi_edit_tool.accepted,
            multi_edit_tool_rejected: tools.multi_edit_tool.rejected,
            write_tool_accepted: tools.write_tool.accepted,
            write_tool_rejected: tools.write_tool.rejected,
            notebook_edit_tool_accepted: tools.notebook_edit_tool.accepted,
            notebook_edit_tool_rejected: tools.notebook_edit_tool.rejected,
        })
    }
}

/// Merges cost rows that share a natural key into one row.
///
/// The cost report splits a key's spend by fields outside the key (context
/// window, service tier, description), so one key can arrive as several rows.
/// Amounts are summed; descriptive fields are kept when every merged row
/// agrees and cleared otherwise. Usage and productivity records pass through
/// unchanged. Output keeps the order in which keys first appear.
pub fn fold_cost_records(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut folded: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<NaturalKey, usize> = HashMap::new();

    for record in records {
        let CanonicalRecord::Cost(cost) = record else {
            folded.push(record);
            continue;
        };
        match index.get(&cost.natural_key()) {
            Some(&at) => {
                if let CanonicalRecord::Cost(existing) = &mut folded[at] {
                    merge_cost(existing, cost);
                }
            }
            None => {
                index.insert(cost.natural_key(), folded.len());
                folded.push(CanonicalRecord::Cost(cost));
            }
        }
    }
    folded
}

fn merge_cost(into: &mut CostRecord, other: CostRecord) {
    into.amount_usd += other.amount_usd;
    keep_if_equal(&mut into.description, other.description);
    keep_if_equal(&mut into.service_tier, other.service_tier);
    keep_if_equal(&mut into.context_window, other.context_window);
}

fn keep_if_equal(field: &mut Option<String>, other: Option<String>) {
    if *field != other {
        *field = None;
    }
}

/// Converts a minor-unit (cents) decimal string to exact major units.
pub fn cents_to_dollars(raw: &str) -> Result<Decimal, TallyError> {
    let trimmed = raw.trim();
    let cents = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| {
            normalize_error(
                SourceKind::CostReport,
                format!("amount `{raw}` is not a decimal: {e}"),
            )
        })?;
    cents
        .checked_div(Decimal::ONE_HUNDRED)
        .map(|dollars| dollars.normalize())
        .ok_or_else(|| {
            normalize_error(
                SourceKind::CostReport,
                format!("amount `{raw}` is out of range"),
            )
        })
}

fn parse_activity_date(raw: &str) -> Result<NaiveDate, TallyError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.with_timezone(&Utc).date_naive()))
        .map_err(|e| {
            normalize_error(
                SourceKind::ClaudeCode,
                format!("activity date `{raw}` is not a date: {e}"),
            )
        })
}

fn normalize_error(source: SourceKind, message: String) -> TallyError {
    TallyError::Normalize {
        endpoint: source.to_string(),
        message,
    }
}
