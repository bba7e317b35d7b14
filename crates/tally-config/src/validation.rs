// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive ceilings, a non-empty source list, and a sane backoff policy.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::TallyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing fast.
pub fn validate_config(config: &TallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.ingest.sources.is_empty() {
        invalid("ingest.sources must name at least one source".to_string());
    }
    let mut seen = HashSet::new();
    for source in &config.ingest.sources {
        if !seen.insert(source) {
            invalid(format!("ingest.sources lists `{source}` more than once"));
        }
    }
    if config.ingest.backfill_concurrency == 0 {
        invalid("ingest.backfill_concurrency must be at least 1".to_string());
    }

    let api = &config.admin_api;
    if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
        invalid(format!(
            "admin_api.base_url `{}` must start with http:// or https://",
            api.base_url
        ));
    }
    if api.api_key_credential.trim().is_empty() {
        invalid("admin_api.api_key_credential must not be empty".to_string());
    }
    if api.request_timeout_secs == 0 {
        invalid("admin_api.request_timeout_secs must be at least 1".to_string());
    }
    for (name, limit) in [
        ("cost_page_limit", api.cost_page_limit),
        ("usage_page_limit", api.usage_page_limit),
        ("claude_code_page_limit", api.claude_code_page_limit),
    ] {
        if limit == 0 {
            invalid(format!("admin_api.{name} must be at least 1"));
        }
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        invalid("retry.max_attempts must be at least 1".to_string());
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        invalid(format!(
            "retry.multiplier must be a finite number >= 1.0, got {}",
            retry.multiplier
        ));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        invalid(format!(
            "retry.initial_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
            retry.initial_delay_ms, retry.max_delay_ms
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    let validation = &config.validation;
    if !validation.workspace_daily_ceiling_usd.is_finite()
        || validation.workspace_daily_ceiling_usd <= 0.0
    {
        invalid(format!(
            "validation.workspace_daily_ceiling_usd must be positive, got {}",
            validation.workspace_daily_ceiling_usd
        ));
    }
    if !validation.reconcile_epsilon_usd.is_finite() || validation.reconcile_epsilon_usd < 0.0 {
        invalid(format!(
            "validation.reconcile_epsilon_usd must be non-negative, got {}",
            validation.reconcile_epsilon_usd
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
