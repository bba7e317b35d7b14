// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-source request shapes: path, time window, grouping, and page size.

use tally_config::model::AdminApiConfig;
use tally_core::{DateRange, SourceKind, TallyError};

pub const COST_REPORT_PATH: &str = "/v1/organizations/cost_report";
pub const MESSAGES_USAGE_PATH: &str = "/v1/organizations/usage_report/messages";
pub const CLAUDE_CODE_PATH: &str = "/v1/organizations/usage_report/claude_code";

/// How an endpoint expresses the requested dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestWindow {
    /// `starting_at`/`ending_at` RFC 3339 bounds with daily buckets.
    DailyBuckets,
    /// A single `starting_at=YYYY-MM-DD`; the endpoint has no range form.
    SingleDay,
}

/// Everything needed to turn a date range into page requests for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub source: SourceKind,
    pub path: &'static str,
    pub window: RequestWindow,
    pub group_by: Vec<String>,
    pub limit: u32,
}

impl EndpointSpec {
    pub fn cost_report(group_by: Vec<String>, limit: u32) -> Self {
        Self {
            source: SourceKind::CostReport,
            path: COST_REPORT_PATH,
            window: RequestWindow::DailyBuckets,
            group_by,
            limit,
        }
    }

    pub fn messages_usage(group_by: Vec<String>, limit: u32) -> Self {
        Self {
            source: SourceKind::MessagesUsage,
            path: MESSAGES_USAGE_PATH,
            window: RequestWindow::DailyBuckets,
            group_by,
            limit,
        }
    }

    pub fn claude_code(limit: u32) -> Self {
        Self {
            source: SourceKind::ClaudeCode,
            path: CLAUDE_CODE_PATH,
            window: RequestWindow::SingleDay,
            group_by: Vec::new(),
            limit,
        }
    }

    /// The configured request shape for `source`.
    pub fn for_source(source: SourceKind, config: &AdminApiConfig) -> Self {
        match source {
            SourceKind::CostReport => {
                Self::cost_report(config.cost_group_by.clone(), config.cost_page_limit)
            }
            SourceKind::MessagesUsage => {
                Self::messages_usage(config.usage_group_by.clone(), config.usage_page_limit)
            }
            SourceKind::ClaudeCode => Self::claude_code(config.claude_code_page_limit),
        }
    }

    /// Query parameters shared by every page of `range`. The pagination
    /// cursor is appended per request.
    pub fn query(&self, range: &DateRange) -> Result<Vec<(String, String)>, TallyError> {
        if range.num_days() == 0 {
            return Err(TallyError::Config(format!(
                "{}: empty date range {}..{}",
                self.source, range.start, range.end
            )));
        }

        let mut query = Vec::with_capacity(self.group_by.len() + 4);
        match self.window {
            RequestWindow::DailyBuckets => {
                query.push(("starting_at".to_string(), midnight_utc(range.start)));
                query.push(("ending_at".to_string(), midnight_utc(range.end)));
                query.push(("bucket_width".to_string(), "1d".to_string()));
            }
            RequestWindow::SingleDay => {
                if range.num_days() != 1 {
                    return Err(TallyError::Config(format!(
                        "{} accepts one day per request, got {} days",
                        self.source,
                        range.num_days()
                    )));
                }
                query.push(("starting_at".to_string(), range.start.format("%Y-%m-%d").to_string()));
            }
        }
        for dimension in &self.group_by {
            query.push(("group_by[]".to_string(), dimension.clone()));
        }
        query.push(("limit".to_string(), self.limit.to_string()));
        Ok(query)
    }
}

fn midnight_utc(date: chrono::NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}
