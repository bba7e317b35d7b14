// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the tally configuration system.

use tally_config::diagnostic::ConfigError;
use tally_config::model::TallyConfig;
use tally_config::{load_and_validate_str, load_config_from_str};
use tally_core::SourceKind;

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tally_config() {
    let toml = r#"
[ingest]
log_level = "debug"
sources = ["cost_report", "claude_code"]
backfill_concurrency = 4

[admin_api]
base_url = "http://localhost:9000"
organization_id = "org-123"
api_key_credential = "MY_ADMIN_KEY"
request_timeout_secs = 15
cost_group_by = ["workspace_id"]

[retry]
max_attempts = 3
initial_delay_ms = 10
max_delay_ms = 100
multiplier = 3.0

[storage]
database_path = "/tmp/tally-test.db"
wal_mode = false

[validation]
workspace_daily_ceiling_usd = 500.0
fail_on_sanity_breach = true
reconcile_epsilon_usd = 2.5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.ingest.log_level, "debug");
    assert_eq!(
        config.ingest.sources,
        vec![SourceKind::CostReport, SourceKind::ClaudeCode]
    );
    assert_eq!(config.ingest.backfill_concurrency, 4);
    assert_eq!(config.admin_api.base_url, "http://localhost:9000");
    assert_eq!(config.admin_api.organization_id, "org-123");
    assert_eq!(config.admin_api.api_key_credential, "MY_ADMIN_KEY");
    assert_eq!(config.admin_api.request_timeout_secs, 15);
    assert_eq!(config.admin_api.cost_group_by, vec!["workspace_id"]);
    assert_eq!(
        config.admin_api.usage_group_by,
        vec!["api_key_id", "workspace_id", "model"]
    );
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.multiplier, 3.0);
    assert_eq!(config.storage.database_path, "/tmp/tally-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.validation.workspace_daily_ceiling_usd, 500.0);
    assert!(config.validation.fail_on_sanity_breach);
    assert_eq!(config.validation.reconcile_epsilon_usd, 2.5);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.ingest.log_level, "info");
    assert_eq!(config.ingest.sources, SourceKind::ALL.to_vec());
    assert_eq!(config.ingest.backfill_concurrency, 1);
    assert_eq!(config.admin_api.base_url, "https://api.anthropic.com");
    assert_eq!(config.admin_api.api_version, "2023-06-01");
    assert_eq!(config.admin_api.api_key_credential, "ANTHROPIC_ADMIN_KEY");
    assert_eq!(config.admin_api.cost_page_limit, 31);
    assert_eq!(config.admin_api.claude_code_page_limit, 1000);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.initial_delay_ms, 1_000);
    assert_eq!(config.retry.max_delay_ms, 60_000);
    assert!(config.storage.database_path.ends_with("tally.db"));
    assert!(config.storage.wal_mode);
    assert!(!config.validation.fail_on_sanity_breach);
}

/// Unknown field in [retry] is rejected.
#[test]
fn unknown_field_in_retry_produces_error() {
    let toml = r#"
[retry]
max_atempts = 3
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_atempts"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unknown keys surface as diagnostics with a suggestion.
#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[retry]
max_atempts = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { suggestion, .. } => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("max_attempts"));
}

/// An unrecognised source name is rejected at parse time.
#[test]
fn unknown_source_name_is_rejected() {
    let toml = r#"
[ingest]
sources = ["cost_report", "invoices"]
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Semantic validation runs after a successful parse.
#[test]
fn semantic_errors_are_reported_after_parse() {
    let toml = r#"
[validation]
workspace_daily_ceiling_usd = -1.0
"#;

    let errors = load_and_validate_str(toml).expect_err("negative ceiling must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("workspace_daily_ceiling_usd")
    )));
}

/// Env-style dotted overrides land in the right section.
#[test]
fn dotted_override_sets_nested_field() {
    use figment::{providers::Serialized, Figment};

    let config: TallyConfig = Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(("admin_api.organization_id", "org-from-env"))
        .merge(("retry.max_attempts", 9))
        .extract()
        .expect("dotted keys should merge");

    assert_eq!(config.admin_api.organization_id, "org-from-env");
    assert_eq!(config.retry.max_attempts, 9);
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[dashboard]
theme = "dark"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("dashboard"),
        "got: {err_str}"
    );
}
