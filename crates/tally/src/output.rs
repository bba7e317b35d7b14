// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human and JSON rendering of command results.

use serde::Serialize;
use tally_core::{BackfillReport, RunReport, TallyError};
use tally_cost::Allocation;
use tally_ingest::Reconciliation;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TallyError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| TallyError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub fn print_run(report: &RunReport, json: bool) -> Result<(), TallyError> {
    if json {
        return print_json(report);
    }
    println!("run {} for {}", report.run_id, report.date);
    for source in &report.sources {
        println!(
            "  {:<15} {:<11} records={} pages={}",
            source.source.to_string(),
            source.status.to_string(),
            source.record_count,
            source.page_count
        );
        for finding in &source.findings {
            println!("    [{}] {}", finding.severity, finding.message);
        }
        if let Some(error) = &source.error {
            println!("    error: {error}");
        }
        if let Some(cursor) = &source.resume_cursor {
            println!("    resume cursor: {cursor}");
        }
    }
    Ok(())
}

pub fn print_backfill(report: &BackfillReport, json: bool) -> Result<(), TallyError> {
    if json {
        return print_json(report);
    }
    for run in &report.reports {
        let status = if run.is_complete() { "complete" } else { "failed" };
        println!(
            "{}  {:<8} records={}",
            run.date,
            status,
            run.total_records()
        );
    }
    if !report.failed_dates.is_empty() {
        let dates: Vec<String> = report.failed_dates.iter().map(ToString::to_string).collect();
        println!("failed dates: {}", dates.join(", "));
    }
    Ok(())
}

pub fn print_allocations(allocations: &[Allocation], json: bool) -> Result<(), TallyError> {
    if json {
        return print_json(allocations);
    }
    if allocations.is_empty() {
        println!("no model-attributed spend found");
        return Ok(());
    }
    for allocation in allocations {
        println!(
            "{} workspace={} model={} total=${} (approximate, by token share)",
            allocation.date,
            allocation.workspace_id.as_deref().unwrap_or("null"),
            allocation.model,
            allocation.total_cost_usd
        );
        for key in &allocation.keys {
            println!(
                "  {:<40} tokens={:<12} ~${}",
                key.api_key_id, key.tokens, key.approximate_cost_usd
            );
        }
        if !allocation.unallocated_usd.is_zero() {
            println!("  unallocated ${}", allocation.unallocated_usd);
        }
    }
    Ok(())
}

pub fn print_reconciliation(reconciliation: &Reconciliation, json: bool) -> Result<(), TallyError> {
    if json {
        return print_json(reconciliation);
    }
    println!(
        "{} workspace={} loaded=${} reference=${} difference=${} epsilon=${} {}",
        reconciliation.date,
        reconciliation.workspace_id.as_deref().unwrap_or("null"),
        reconciliation.loaded_usd,
        reconciliation.reference_usd,
        reconciliation.difference_usd,
        reconciliation.epsilon_usd,
        if reconciliation.within_tolerance {
            "ok"
        } else {
            "MISMATCH"
        }
    );
    Ok(())
}
