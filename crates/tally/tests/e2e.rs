// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end ingestion tests against the mock Admin API.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::{
    AnalyticalSink, CheckKind, DateRange, RelationKind, SourceKind, SourceState,
};
use tally_cost::SpendRollup;
use tally_ingest::forbidden_fields;
use tally_test_utils::fixtures::{claude_code_line, cost_line, usage_line};
use tally_test_utils::{MockAdminApi, TestHarness};

const OPUS: &str = "claude-opus-4-20250514";
const SONNET: &str = "claude-sonnet-4-20250514";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
}

fn usd(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn mount_typical_day(api: &MockAdminApi, date: NaiveDate) {
    api.mount_pages(
        SourceKind::CostReport,
        date,
        vec![vec![
            cost_line(Some("wrk_a"), OPUS, "output_tokens", "700"),
            cost_line(Some("wrk_a"), OPUS, "uncached_input_tokens", "300"),
            cost_line(None, SONNET, "output_tokens", "946.6"),
        ]],
    )
    .await;
    api.mount_pages(
        SourceKind::MessagesUsage,
        date,
        vec![vec![
            usage_line(Some("key_a"), Some("wrk_a"), OPUS, 400, 300),
            usage_line(Some("key_b"), Some("wrk_a"), OPUS, 100, 200),
        ]],
    )
    .await;
    api.mount_pages(
        SourceKind::ClaudeCode,
        date,
        vec![vec![
            claude_code_line(date, "ada@example.com", "vscode", 4),
            claude_code_line(date, "grace@example.com", "iTerm.app", 2),
        ]],
    )
    .await;
}

#[tokio::test]
async fn rerunning_a_date_replaces_instead_of_appending() {
    let harness = TestHarness::new().await.unwrap();
    mount_typical_day(&harness.api, day(1)).await;

    let first = harness.orchestrator.ingest(day(1)).await;
    assert!(first.is_complete(), "{first:?}");
    let first_spend = SpendRollup::load(harness.sink.as_ref(), day(1)).await.unwrap();

    let second = harness.orchestrator.ingest(day(1)).await;
    assert!(second.is_complete(), "{second:?}");
    let second_spend = SpendRollup::load(harness.sink.as_ref(), day(1)).await.unwrap();

    for relation in [RelationKind::Cost, RelationKind::Usage, RelationKind::Productivity] {
        let len = harness.sink.partition_len(relation, day(1)).await.unwrap();
        assert_eq!(len, expected_rows(relation), "{relation}");
    }
    assert_eq!(first.total_records(), second.total_records());
    assert_eq!(first_spend.total_usd, second_spend.total_usd);
    assert_eq!(second_spend.total_usd, usd("19.466"));
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(harness.sink.runs_for_date(day(1)).await.unwrap().len(), 2);
}

fn expected_rows(relation: RelationKind) -> usize {
    match relation {
        RelationKind::Cost => 3,
        RelationKind::Usage | RelationKind::Productivity => 2,
    }
}

#[tokio::test]
async fn minor_units_become_dollars_for_the_null_workspace() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::CostReport])
        .build()
        .await
        .unwrap();
    mount_typical_day(&harness.api, day(1)).await;

    assert!(harness.orchestrator.ingest(day(1)).await.is_complete());
    let spend = SpendRollup::load(harness.sink.as_ref(), day(1)).await.unwrap();
    assert_eq!(spend.workspace_total(None), usd("9.466"));
    assert_eq!(spend.workspace_total(Some("wrk_a")), usd("10"));
}

#[tokio::test]
async fn a_forbidden_source_does_not_stop_the_others() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .api
        .mount_failures(SourceKind::ClaudeCode, day(1), 403, 10)
        .await;
    mount_typical_day(&harness.api, day(1)).await;

    let report = harness.orchestrator.ingest(day(1)).await;

    assert_eq!(report.failed_sources(), vec![SourceKind::ClaudeCode]);
    let claude_code = report.source(SourceKind::ClaudeCode).unwrap();
    assert_eq!(claude_code.failed_in, Some(SourceState::Fetching));
    // 403 is not retried.
    assert!(harness.sleeper.delays().is_empty());
    assert_eq!(harness.api.requests_for(SourceKind::ClaudeCode).await.len(), 1);

    assert!(report.source(SourceKind::CostReport).unwrap().is_complete());
    assert!(report.source(SourceKind::MessagesUsage).unwrap().is_complete());
    assert_eq!(harness.sink.cost_records(day(1)).await.unwrap().len(), 3);
    assert!(harness.sink.productivity_records(day(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_natural_keys_fail_the_source_and_the_date() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::MessagesUsage])
        .build()
        .await
        .unwrap();
    let line = usage_line(Some("key_a"), Some("wrk_a"), OPUS, 400, 300);
    harness
        .api
        .mount_pages(SourceKind::MessagesUsage, day(1), vec![vec![line.clone(), line]])
        .await;

    let range = DateRange::single(day(1));
    let backfill = harness.orchestrator.backfill(range).await;

    assert_eq!(backfill.failed_dates, vec![day(1)]);
    let usage = backfill.reports[0].source(SourceKind::MessagesUsage).unwrap();
    assert_eq!(usage.status, SourceState::Failed);
    assert_eq!(usage.failed_in, Some(SourceState::Validating));
    assert_eq!(usage.findings[0].check, CheckKind::DuplicateKeys);
    assert!(usage.findings[0].is_fatal());
    assert!(usage.findings[0].subjects[0].contains("key_a"));
}

#[tokio::test]
async fn cost_lines_sharing_a_key_are_folded_before_loading() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::CostReport])
        .build()
        .await
        .unwrap();
    let mut long_context = cost_line(Some("wrk_a"), OPUS, "output_tokens", "50");
    long_context["context_window"] = "200k-1M".into();
    harness
        .api
        .mount_pages(
            SourceKind::CostReport,
            day(1),
            vec![vec![
                cost_line(Some("wrk_a"), OPUS, "output_tokens", "100"),
                long_context,
            ]],
        )
        .await;

    let report = harness.orchestrator.ingest(day(1)).await;

    assert!(report.is_complete(), "{report:?}");
    let rows = harness.sink.cost_records(day(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount_usd, usd("1.5"));
}

#[tokio::test]
async fn spend_is_split_by_token_share() {
    let harness = TestHarness::new().await.unwrap();
    mount_typical_day(&harness.api, day(1)).await;
    assert!(harness.orchestrator.ingest(day(1)).await.is_complete());

    let allocation = harness
        .allocation_view()
        .allocate(day(1), Some("wrk_a"), OPUS)
        .await
        .unwrap();

    assert_eq!(allocation.total_cost_usd, usd("10"));
    assert_eq!(allocation.total_tokens, 1_000);
    let by_key = allocation.by_key();
    assert_eq!(by_key["key_a"], usd("7"));
    assert_eq!(by_key["key_b"], usd("3"));
    assert!(allocation.unallocated_usd.is_zero());
}

#[tokio::test]
async fn transient_failures_are_retried_with_backoff() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::CostReport])
        .build()
        .await
        .unwrap();
    harness
        .api
        .mount_failures(SourceKind::CostReport, day(1), 503, 2)
        .await;
    mount_typical_day(&harness.api, day(1)).await;

    let report = harness.orchestrator.ingest(day(1)).await;

    assert!(report.is_complete(), "{report:?}");
    assert_eq!(
        harness.sleeper.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert_eq!(harness.api.requests_for(SourceKind::CostReport).await.len(), 3);
    assert_eq!(harness.sink.cost_records(day(1)).await.unwrap().len(), 3);
    let spend = SpendRollup::load(harness.sink.as_ref(), day(1)).await.unwrap();
    assert_eq!(spend.total_usd, usd("19.466"));
}

#[tokio::test]
async fn exhausted_retries_fail_the_source() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::MessagesUsage])
        .build()
        .await
        .unwrap();
    harness
        .api
        .mount_failures(SourceKind::MessagesUsage, day(1), 500, 3)
        .await;
    mount_typical_day(&harness.api, day(1)).await;

    let report = harness.orchestrator.ingest(day(1)).await;

    let usage = report.source(SourceKind::MessagesUsage).unwrap();
    assert_eq!(usage.status, SourceState::Failed);
    assert_eq!(usage.page_count, 0);
    assert!(usage.resume_cursor.is_none());
    assert_eq!(harness.sleeper.delays().len(), 2);
    assert!(harness.sink.usage_records(day(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn every_page_is_fetched_exactly_once() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::MessagesUsage])
        .build()
        .await
        .unwrap();
    harness
        .api
        .mount_pages(
            SourceKind::MessagesUsage,
            day(2),
            vec![
                vec![usage_line(Some("key_a"), Some("wrk_a"), OPUS, 10, 5)],
                vec![usage_line(Some("key_b"), Some("wrk_a"), OPUS, 20, 5)],
                vec![usage_line(None, None, SONNET, 30, 5)],
            ],
        )
        .await;

    let report = harness.orchestrator.ingest(day(2)).await;

    let usage = report.source(SourceKind::MessagesUsage).unwrap();
    assert!(usage.is_complete(), "{usage:?}");
    assert_eq!(usage.page_count, 3);
    assert_eq!(usage.record_count, 3);
    assert_eq!(
        harness.api.cursors_requested(SourceKind::MessagesUsage).await,
        vec![
            None,
            Some(MockAdminApi::cursor(SourceKind::MessagesUsage, day(2), 1)),
            Some(MockAdminApi::cursor(SourceKind::MessagesUsage, day(2), 2)),
        ]
    );
}

#[tokio::test]
async fn productivity_rows_carry_no_cost_or_model_fields() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::ClaudeCode])
        .build()
        .await
        .unwrap();
    mount_typical_day(&harness.api, day(1)).await;

    let report = harness.orchestrator.ingest(day(1)).await;
    assert!(report.is_complete(), "{report:?}");

    let columns = harness
        .sink
        .relation_columns(RelationKind::Productivity)
        .await
        .unwrap();
    assert!(forbidden_fields(&columns).is_empty(), "{columns:?}");

    let rows = harness.sink.productivity_records(day(1)).await.unwrap();
    assert_eq!(rows.len(), 2);
    let ada = rows
        .iter()
        .find(|r| r.user_email.as_deref() == Some("ada@example.com"))
        .unwrap();
    assert_eq!(ada.sessions, 4);
    assert_eq!(ada.lines_added, 120);
    assert_eq!(ada.terminal_type, "vscode");
}

#[tokio::test]
async fn reconciliation_tolerates_small_differences() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::CostReport])
        .build()
        .await
        .unwrap();
    mount_typical_day(&harness.api, day(1)).await;
    assert!(harness.orchestrator.ingest(day(1)).await.is_complete());

    let validator = harness.orchestrator.validator();
    let close = validator
        .reconcile(day(1), Some("wrk_a"), usd("12.50"), usd("10"))
        .await
        .unwrap();
    assert!(close.within_tolerance);
    assert_eq!(close.loaded_usd, usd("10"));
    assert_eq!(close.difference_usd, usd("2.50"));

    let far = validator
        .reconcile(day(1), None, usd("100"), usd("10"))
        .await
        .unwrap();
    assert!(!far.within_tolerance);
}

#[tokio::test]
async fn sanity_breach_can_be_made_fatal() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::CostReport])
        .with_ceiling(5.0, true)
        .build()
        .await
        .unwrap();
    mount_typical_day(&harness.api, day(1)).await;

    let report = harness.orchestrator.ingest(day(1)).await;

    let cost = report.source(SourceKind::CostReport).unwrap();
    assert_eq!(cost.status, SourceState::Failed);
    assert!(cost.findings.iter().any(|f| f.check == CheckKind::SanityBound));
    // Loaded rows stay for inspection.
    assert_eq!(harness.sink.cost_records(day(1)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn backfill_reports_only_the_failed_dates() {
    let harness = TestHarness::builder()
        .with_sources(&[SourceKind::ClaudeCode])
        .with_backfill_concurrency(3)
        .build()
        .await
        .unwrap();
    harness
        .api
        .mount_failures(SourceKind::ClaudeCode, day(3), 401, 10)
        .await;
    for d in 1..=4 {
        mount_typical_day(&harness.api, day(d)).await;
    }

    let report = harness
        .orchestrator
        .backfill(DateRange::inclusive(day(1), day(4)).unwrap())
        .await;

    assert_eq!(report.reports.len(), 4);
    assert_eq!(report.failed_dates, vec![day(3)]);
    for d in [1, 2, 4] {
        assert_eq!(
            harness.sink.productivity_records(day(d)).await.unwrap().len(),
            2
        );
    }

    let rerun = harness
        .orchestrator
        .ingest_sources(day(3), &report.reports[2].failed_sources())
        .await;
    assert!(!rerun.is_complete());
    assert_eq!(rerun.sources.len(), 1);
}
