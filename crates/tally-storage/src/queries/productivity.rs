// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Productivity relation rows.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::Value;
use tally_core::{ProductivityRecord, RelationKind, TallyError};

use super::{count_value, date_value, get_count, get_date, get_parsed, select_sql, text_value};
use crate::database::Database;

pub(crate) fn to_row(record: &ProductivityRecord) -> Vec<Value> {
    vec![
        date_value(record.activity_date),
        Value::Text(record.org_id.clone()),
        Value::Text(record.actor_type.to_string()),
        text_value(&record.user_email),
        text_value(&record.api_key_name),
        Value::Text(record.terminal_type.clone()),
        text_value(&record.customer_type),
        count_value(record.sessions),
        count_value(record.lines_added),
        count_value(record.lines_removed),
        count_value(record.commits),
        count_value(record.pull_requests),
        count_value(record.edit_tool_accepted),
        count_value(record.edit_tool_rejected),
        count_value(record.multi_edit_tool_accepted),
        count_value(record.multi_edit_tool_rejected),
        count_value(record.write_tool_accepted),
        count_value(record.write_tool_rejected),
        count_value(record.notebook_edit_tool_accepted),
        count_value(record.notebook_edit_tool_rejected),
    ]
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<ProductivityRecord> {
    Ok(ProductivityRecord {
        activity_date: get_date(row, 0)?,
        org_id: row.get(1)?,
        actor_type: get_parsed(row, 2)?,
        user_email: row.get(3)?,
        api_key_name: row.get(4)?,
        terminal_type: row.get(5)?,
        customer_type: row.get(6)?,
        sessions: get_count(row, 7)?,
        lines_added: get_count(row, 8)?,
        lines_removed: get_count(row, 9)?,
        commits: get_count(row, 10)?,
        pull_requests: get_count(row, 11)?,
        edit_tool_accepted: get_count(row, 12)?,
        edit_tool_rejected: get_count(row, 13)?,
        multi_edit_tool_accepted: get_count(row, 14)?,
        multi_edit_tool_rejected: get_count(row, 15)?,
        write_tool_accepted: get_count(row, 16)?,
        write_tool_rejected: get_count(row, 17)?,
        notebook_edit_tool_accepted: get_count(row, 18)?,
        notebook_edit_tool_rejected: get_count(row, 19)?,
    })
}

pub async fn productivity_records(
    db: &Database,
    date: NaiveDate,
) -> Result<Vec<ProductivityRecord>, TallyError> {
    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&select_sql(RelationKind::Productivity))?;
            let rows = stmt
                .query_map([day], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
