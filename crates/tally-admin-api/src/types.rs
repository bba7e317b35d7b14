// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin reporting API response types.
//!
//! Every nested object and counter is defaulted, so a missing or `null`
//! sub-field reads as zero instead of failing the whole page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// One page of any reporting endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// A time bucket of a bucketed report (cost, messages usage).
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Bucket<R> {
    pub starting_at: DateTime<Utc>,
    pub ending_at: DateTime<Utc>,
    #[serde(default = "Vec::new", deserialize_with = "default_if_null")]
    pub results: Vec<R>,
}

/// Treat an explicit JSON `null` the same as an absent field.
fn default_if_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// --- Cost report ---

/// One line of the cost report. `amount` is a decimal string in cents.
#[derive(Debug, Clone, Deserialize)]
pub struct CostResult {
    #[serde(default)]
    pub currency: Option<String>,
    pub amount: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost_type: Option<String>,
    #[serde(default)]
    pub context_window: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub service_tier: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

// --- Messages usage report ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheCreation {
    #[serde(default, deserialize_with = "default_if_null")]
    pub ephemeral_1h_input_tokens: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub ephemeral_5m_input_tokens: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerToolUse {
    #[serde(default, deserialize_with = "default_if_null")]
    pub web_search_requests: u64,
}

/// One (api key, workspace, model) row of the messages usage report.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageResult {
    #[serde(default, deserialize_with = "default_if_null")]
    pub uncached_input_tokens: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub cache_creation: CacheCreation,
    #[serde(default, deserialize_with = "default_if_null")]
    pub cache_read_input_tokens: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub server_tool_use: ServerToolUse,
    #[serde(default)]
    pub api_key_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub service_tier: Option<String>,
    #[serde(default)]
    pub context_window: Option<String>,
}

// --- Claude Code productivity report ---

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    UserActor { email_address: String },
    ApiActor { api_key_name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinesOfCode {
    #[serde(default, deserialize_with = "default_if_null")]
    pub added: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub removed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreMetrics {
    #[serde(default, deserialize_with = "default_if_null")]
    pub num_sessions: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub lines_of_code: LinesOfCode,
    #[serde(default, deserialize_with = "default_if_null")]
    pub commits_by_claude_code: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub pull_requests_by_claude_code: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCounts {
    #[serde(default, deserialize_with = "default_if_null")]
    pub accepted: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub rejected: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolActions {
    #[serde(default, deserialize_with = "default_if_null")]
    pub edit_tool: ToolCounts,
    #[serde(default, deserialize_with = "default_if_null")]
    pub multi_edit_tool: ToolCounts,
    #[serde(default, deserialize_with = "default_if_null")]
    pub write_tool: ToolCounts,
    #[serde(default, deserialize_with = "default_if_null")]
    pub notebook_edit_tool: ToolCounts,
}

/// One actor/terminal row of the Claude Code report.
///
/// The payload also carries a `model_breakdown` with token counts and an
/// estimated cost. That spend is already part of the cost report, so the
/// field is deliberately not declared here and serde discards it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeCodeRecord {
    /// `YYYY-MM-DD` or an RFC 3339 timestamp at UTC midnight.
    pub date: String,
    pub actor: Actor,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub terminal_type: Option<String>,
    #[serde(default, deserialize_with = "default_if_null")]
    pub core_metrics: CoreMetrics,
    #[serde(default, deserialize_with = "default_if_null")]
    pub tool_actions: ToolActions,
}

// --- Errors ---

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
