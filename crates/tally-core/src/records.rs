// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical records for the three ingested relations.
//!
//! Money lives only in [`CostRecord`]. Token counts live only in
//! [`UsageRecord`]. [`ProductivityRecord`] carries neither; its source reports
//! an estimated cost per actor that is already contained in the cost relation,
//! so it has no field to hold one.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TallyError;

/// One of the three target relations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    #[strum(serialize = "cost_records")]
    Cost,
    #[strum(serialize = "usage_records")]
    Usage,
    #[strum(serialize = "productivity_records")]
    Productivity,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Cost,
        RelationKind::Usage,
        RelationKind::Productivity,
    ];

    /// Sink table name.
    pub fn table(self) -> &'static str {
        match self {
            RelationKind::Cost => CostRecord::TABLE,
            RelationKind::Usage => UsageRecord::TABLE,
            RelationKind::Productivity => ProductivityRecord::TABLE,
        }
    }

    /// Declared column set, in storage order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            RelationKind::Cost => CostRecord::COLUMNS,
            RelationKind::Usage => UsageRecord::COLUMNS,
            RelationKind::Productivity => ProductivityRecord::COLUMNS,
        }
    }

    /// Columns forming the natural key, `activity_date` first.
    pub fn natural_key_columns(self) -> &'static [&'static str] {
        match self {
            RelationKind::Cost => CostRecord::NATURAL_KEY,
            RelationKind::Usage => UsageRecord::NATURAL_KEY,
            RelationKind::Productivity => ProductivityRecord::NATURAL_KEY,
        }
    }
}

/// Natural-key values of one row. `None` is a real key component: a null
/// workspace is its own bucket, distinct from every named workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey(pub Vec<Option<String>>);

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|part| part.as_deref().unwrap_or("null"))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Static schema metadata shared by the sink, the validator, and tests.
pub trait Relation {
    const KIND: RelationKind;
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const NATURAL_KEY: &'static [&'static str];

    fn activity_date(&self) -> NaiveDate;
    fn natural_key(&self) -> NaturalKey;
}

/// A single cost line item for one day, in major currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRecord {
    pub activity_date: NaiveDate,
    pub org_id: String,
    pub workspace_id: Option<String>,
    pub model: Option<String>,
    pub token_type: Option<String>,
    pub cost_type: Option<String>,
    /// Dollars, never cents.
    pub amount_usd: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub service_tier: Option<String>,
    pub context_window: Option<String>,
}

impl Relation for CostRecord {
    const KIND: RelationKind = RelationKind::Cost;
    const TABLE: &'static str = "cost_records";
    const COLUMNS: &'static [&'static str] = &[
        "activity_date",
        "org_id",
        "workspace_id",
        "model",
        "token_type",
        "cost_type",
        "amount_usd",
        "currency",
        "description",
        "service_tier",
        "context_window",
    ];
    const NATURAL_KEY: &'static [&'static str] = &[
        "activity_date",
        "workspace_id",
        "model",
        "token_type",
        "cost_type",
    ];

    fn activity_date(&self) -> NaiveDate {
        self.activity_date
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey(vec![
            Some(self.activity_date.to_string()),
            self.workspace_id.clone(),
            self.model.clone(),
            self.token_type.clone(),
            self.cost_type.clone(),
        ])
    }
}

/// Token and tool-use counts for one (key, workspace, model) on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub activity_date: NaiveDate,
    pub org_id: String,
    pub api_key_id: Option<String>,
    pub workspace_id: Option<String>,
    pub model: Option<String>,
    pub uncached_input_tokens: u64,
    pub cache_creation_1h_tokens: u64,
    pub cache_creation_5m_tokens: u64,
    pub cache_read_tokens: u64,
    pub output_tokens: u64,
    pub web_search_requests: u64,
    pub service_tier: Option<String>,
    pub context_window: Option<String>,
}

impl UsageRecord {
    /// Sum of every token counter. Tool-use requests are not tokens and are
    /// left out.
    pub fn total_tokens(&self) -> u64 {
        self.uncached_input_tokens
            .saturating_add(self.cache_creation_1h_tokens)
            .saturating_add(self.cache_creation_5m_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.output_tokens)
    }
}

impl Relation for UsageRecord {
    const KIND: RelationKind = RelationKind::Usage;
    const TABLE: &'static str = "usage_records";
    const COLUMNS: &'static [&'static str] = &[
        "activity_date",
        "org_id",
        "api_key_id",
        "workspace_id",
        "model",
        "uncached_input_tokens",
        "cache_creation_1h_tokens",
        "cache_creation_5m_tokens",
        "cache_read_tokens",
        "output_tokens",
        "web_search_requests",
        "service_tier",
        "context_window",
    ];
    const NATURAL_KEY: &'static [&'static str] =
        &["activity_date", "api_key_id", "workspace_id", "model"];

    fn activity_date(&self) -> NaiveDate {
        self.activity_date
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey(vec![
            Some(self.activity_date.to_string()),
            self.api_key_id.clone(),
            self.workspace_id.clone(),
            self.model.clone(),
        ])
    }
}

/// Who a productivity row is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorType {
    User,
    ApiKey,
}

/// Per-actor, per-terminal development activity for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductivityRecord {
    pub activity_date: NaiveDate,
    pub org_id: String,
    pub actor_type: ActorType,
    pub user_email: Option<String>,
    pub api_key_name: Option<String>,
    pub terminal_type: String,
    pub customer_type: Option<String>,
    pub sessions: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub commits: u64,
    pub pull_requests: u64,
    pub edit_tool_accepted: u64,
    pub edit_tool_rejected: u64,
    pub multi_edit_tool_accepted: u64,
    pub multi_edit_tool_rejected: u64,
    pub write_tool_accepted: u64,
    pub write_tool_rejected: u64,
    pub notebook_edit_tool_accepted: u64,
    pub notebook_edit_tool_rejected: u64,
}

impl Relation for ProductivityRecord {
    const KIND: RelationKind = RelationKind::Productivity;
    const TABLE: &'static str = "productivity_records";
    const COLUMNS: &'static [&'static str] = &[
        "activity_date",
        "org_id",
        "actor_type",
        "user_email",
        "api_key_name",
        "terminal_type",
        "customer_type",
        "sessions",
        "lines_added",
        "lines_removed",
        "commits",
        "pull_requests",
        "edit_tool_accepted",
        "edit_tool_rejected",
        "multi_edit_tool_accepted",
        "multi_edit_tool_rejected",
        "write_tool_accepted",
        "write_tool_rejected",
        "notebook_edit_tool_accepted",
        "notebook_edit_tool_rejected",
    ];
    const NATURAL_KEY: &'static [&'static str] = &[
        "activity_date",
        "actor_type",
        "user_email",
        "api_key_name",
        "terminal_type",
    ];

    fn activity_date(&self) -> NaiveDate {
        self.activity_date
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey(vec![
            Some(self.activity_date.to_string()),
            Some(self.actor_type.to_string()),
            self.user_email.clone(),
            self.api_key_name.clone(),
            Some(self.terminal_type.clone()),
        ])
    }
}

/// Output of the normalizer: one record of one of the three relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalRecord {
    Cost(CostRecord),
    Usage(UsageRecord),
    Productivity(ProductivityRecord),
}

impl CanonicalRecord {
    pub fn relation(&self) -> RelationKind {
        match self {
            CanonicalRecord::Cost(_) => RelationKind::Cost,
            CanonicalRecord::Usage(_) => RelationKind::Usage,
            CanonicalRecord::Productivity(_) => RelationKind::Productivity,
        }
    }

    pub fn activity_date(&self) -> NaiveDate {
        match self {
            CanonicalRecord::Cost(r) => r.activity_date,
            CanonicalRecord::Usage(r) => r.activity_date,
            CanonicalRecord::Productivity(r) => r.activity_date,
        }
    }
}

/// All records for one relation and one date partition, ready to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalBatch {
    Cost(Vec<CostRecord>),
    Usage(Vec<UsageRecord>),
    Productivity(Vec<ProductivityRecord>),
}

impl CanonicalBatch {
    pub fn empty(relation: RelationKind) -> Self {
        match relation {
            RelationKind::Cost => CanonicalBatch::Cost(Vec::new()),
            RelationKind::Usage => CanonicalBatch::Usage(Vec::new()),
            RelationKind::Productivity => CanonicalBatch::Productivity(Vec::new()),
        }
    }

    /// Group normalized records into a single-relation batch for `date`.
    ///
    /// Fails if a record belongs to another relation or another date, so a
    /// load can never write outside its own partition.
    pub fn from_records(
        relation: RelationKind,
        date: NaiveDate,
        records: Vec<CanonicalRecord>,
    ) -> Result<Self, TallyError> {
        let mut batch = Self::empty(relation);
        for record in records {
            if record.activity_date() != date {
                return Err(TallyError::PartitionMismatch {
                    expected: date,
                    found: record.activity_date(),
                });
            }
            match (&mut batch, record) {
                (CanonicalBatch::Cost(rows), CanonicalRecord::Cost(r)) => rows.push(r),
                (CanonicalBatch::Usage(rows), CanonicalRecord::Usage(r)) => rows.push(r),
                (CanonicalBatch::Productivity(rows), CanonicalRecord::Productivity(r)) => {
                    rows.push(r)
                }
                (_, other) => {
                    return Err(TallyError::Internal(format!(
                        "{} record routed to {relation} batch",
                        other.relation()
                    )));
                }
            }
        }
        Ok(batch)
    }

    pub fn relation(&self) -> RelationKind {
        match self {
            CanonicalBatch::Cost(_) => RelationKind::Cost,
            CanonicalBatch::Usage(_) => RelationKind::Usage,
            CanonicalBatch::Productivity(_) => RelationKind::Productivity,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CanonicalBatch::Cost(rows) => rows.len(),
            CanonicalBatch::Usage(rows) => rows.len(),
            CanonicalBatch::Productivity(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
