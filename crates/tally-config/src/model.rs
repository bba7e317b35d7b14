// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the tally ingestion engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use tally_core::SourceKind;

/// Top-level tally configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Run scheduling and logging.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Vendor reporting API settings.
    #[serde(default)]
    pub admin_api: AdminApiConfig,

    /// Backoff policy for retryable page failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Analytical sink settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Post-load validation thresholds.
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Ingestion run configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sources ingested on every run.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,

    /// How many dates a backfill ingests at once.
    #[serde(default = "default_backfill_concurrency")]
    pub backfill_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sources: default_sources(),
            backfill_concurrency: default_backfill_concurrency(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sources() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

fn default_backfill_concurrency() -> usize {
    1
}

/// Admin reporting API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminApiConfig {
    /// Scheme and host of the reporting API, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Anthropic API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Organization the ingested records are attributed to.
    #[serde(default)]
    pub organization_id: String,

    /// Name handed to the credential provider to obtain the admin key.
    #[serde(default = "default_api_key_credential")]
    pub api_key_credential: String,

    /// Per-request timeout. Exceeding it counts as a retryable failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Buckets per page for the cost report.
    #[serde(default = "default_bucket_page_limit")]
    pub cost_page_limit: u32,

    /// Buckets per page for the messages usage report.
    #[serde(default = "default_bucket_page_limit")]
    pub usage_page_limit: u32,

    /// Records per page for the Claude Code report.
    #[serde(default = "default_claude_code_page_limit")]
    pub claude_code_page_limit: u32,

    /// `group_by[]` dimensions for the cost report.
    #[serde(default = "default_cost_group_by")]
    pub cost_group_by: Vec<String>,

    /// `group_by[]` dimensions for the messages usage report.
    #[serde(default = "default_usage_group_by")]
    pub usage_group_by: Vec<String>,
}

impl Default for AdminApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            organization_id: String::new(),
            api_key_credential: default_api_key_credential(),
            request_timeout_secs: default_request_timeout_secs(),
            cost_page_limit: default_bucket_page_limit(),
            usage_page_limit: default_bucket_page_limit(),
            claude_code_page_limit: default_claude_code_page_limit(),
            cost_group_by: default_cost_group_by(),
            usage_group_by: default_usage_group_by(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_api_key_credential() -> String {
    "ANTHROPIC_ADMIN_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_bucket_page_limit() -> u32 {
    31
}

fn default_claude_code_page_limit() -> u32 {
    1000
}

fn default_cost_group_by() -> Vec<String> {
    vec!["workspace_id".to_string(), "description".to_string()]
}

fn default_usage_group_by() -> Vec<String> {
    vec![
        "api_key_id".to_string(),
        "workspace_id".to_string(),
        "model".to_string(),
    ]
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per page, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, including server retry-after hints.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tally").join("tally.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tally.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Validation thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Ceiling for the summed spend of one workspace on one day, in USD.
    /// A breach usually means a unit conversion regressed or rows doubled.
    #[serde(default = "default_workspace_daily_ceiling_usd")]
    pub workspace_daily_ceiling_usd: f64,

    /// Fail the cost source when the ceiling is exceeded instead of warning.
    #[serde(default)]
    pub fail_on_sanity_breach: bool,

    /// Allowed absolute difference against an external reference total, in USD.
    #[serde(default = "default_reconcile_epsilon_usd")]
    pub reconcile_epsilon_usd: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            workspace_daily_ceiling_usd: default_workspace_daily_ceiling_usd(),
            fail_on_sanity_breach: false,
            reconcile_epsilon_usd: default_reconcile_epsilon_usd(),
        }
    }
}

fn default_workspace_daily_ceiling_usd() -> f64 {
    10_000.0
}

fn default_reconcile_epsilon_usd() -> f64 {
    10.0
}
