// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-level types: sources, date ranges, per-source states and reports.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TallyError;
use crate::records::RelationKind;

/// One of the vendor reporting endpoints ingested each day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    CostReport,
    MessagesUsage,
    ClaudeCode,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::CostReport,
        SourceKind::MessagesUsage,
        SourceKind::ClaudeCode,
    ];

    /// The relation this source writes. Each relation has exactly one source.
    pub fn relation(self) -> RelationKind {
        match self {
            SourceKind::CostReport => RelationKind::Cost,
            SourceKind::MessagesUsage => RelationKind::Usage,
            SourceKind::ClaudeCode => RelationKind::Productivity,
        }
    }
}

/// Half-open range of calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// A range covering exactly `date`.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date + Days::new(1),
        }
    }

    /// A range covering `from` through `to`, both included.
    pub fn inclusive(from: NaiveDate, to: NaiveDate) -> Result<Self, TallyError> {
        if to < from {
            return Err(TallyError::Config(format!(
                "date range end {to} is before start {from}"
            )));
        }
        Ok(Self {
            start: from,
            end: to + Days::new(1),
        })
    }

    pub fn num_days(&self) -> u64 {
        (self.end - self.start).num_days().max(0) as u64
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start
            .iter_days()
            .take_while(move |day| *day < self.end)
    }
}

/// Per-source state within one run.
///
/// `Pending -> Fetching -> Normalizing -> Loading -> Validating -> Complete`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceState {
    Pending,
    Fetching,
    Normalizing,
    Loading,
    Validating,
    Complete,
    Failed,
}

impl SourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SourceState::Complete | SourceState::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: SourceState) -> bool {
        use SourceState::*;
        match (self, next) {
            (Pending, Fetching)
            | (Fetching, Normalizing)
            | (Normalizing, Loading)
            | (Loading, Validating)
            | (Validating, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Validation checks run after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckKind {
    DuplicateKeys,
    SchemaInvariant,
    SanityBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One validation result attached to a source report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub check: CheckKind,
    pub severity: Severity,
    pub relation: RelationKind,
    pub message: String,
    /// Offending natural keys, field names, or workspaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
}

impl Finding {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Outcome of one source within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub status: SourceState,
    pub record_count: usize,
    pub page_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// State the source was in when it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<SourceState>,
    /// Cursor to resume a failed fetch from, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_cursor: Option<String>,
}

impl SourceReport {
    pub fn is_complete(&self) -> bool {
        self.status == SourceState::Complete
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }
}

/// Aggregated outcome of one ingestion run for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn source(&self, source: SourceKind) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// True when every source reached `Complete`.
    pub fn is_complete(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(SourceReport::is_complete)
    }

    pub fn failed_sources(&self) -> Vec<SourceKind> {
        self.sources
            .iter()
            .filter(|s| s.status == SourceState::Failed)
            .map(|s| s.source)
            .collect()
    }

    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.record_count).sum()
    }
}

/// Outcome of a backfill: one report per date plus the dates that need a
/// targeted re-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub range: DateRange,
    pub reports: Vec<RunReport>,
    pub failed_dates: Vec<NaiveDate>,
}

impl BackfillReport {
    pub fn from_reports(range: DateRange, reports: Vec<RunReport>) -> Self {
        let failed_dates = reports
            .iter()
            .filter(|r| !r.is_complete())
            .map(|r| r.date)
            .collect();
        Self {
            range,
            reports,
            failed_dates,
        }
    }
}
