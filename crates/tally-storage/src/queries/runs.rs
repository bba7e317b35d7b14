// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run history: one row per orchestrator run, with the full report as JSON.

use chrono::NaiveDate;
use rusqlite::params;
use tally_core::{RunReport, TallyError};

use super::date_value;
use crate::database::Database;

/// Appends `report` to `ingestion_runs`. Re-recording the same run id
/// overwrites the earlier row.
pub async fn insert_run(db: &Database, report: &RunReport) -> Result<(), TallyError> {
    let json = serde_json::to_string(report).map_err(|e| TallyError::Storage {
        source: Box::new(e),
    })?;
    let run_id = report.run_id.clone();
    let day = date_value(report.date);
    let started_at = report.started_at.to_rfc3339();
    let finished_at = report.finished_at.to_rfc3339();
    let status = if report.is_complete() {
        "complete"
    } else {
        "failed"
    };

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO ingestion_runs \
                 (run_id, activity_date, started_at, finished_at, status, report) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![run_id, day, started_at, finished_at, status, json],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every recorded run for `date`, oldest first.
pub async fn runs_for_date(db: &Database, date: NaiveDate) -> Result<Vec<RunReport>, TallyError> {
    let day = date_value(date);
    let raw: Vec<String> = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT report FROM ingestion_runs WHERE activity_date = ?1 \
                 ORDER BY started_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([day], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    raw.iter()
        .map(|json| {
            serde_json::from_str(json).map_err(|e| TallyError::Storage {
                source: Box::new(e),
            })
        })
        .collect()
}
