// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage relation rows.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::Value;
use tally_core::{RelationKind, TallyError, UsageRecord};

use super::{count_value, date_value, get_count, get_date, select_sql, text_value};
use crate::database::Database;

pub(crate) fn to_row(record: &UsageRecord) -> Vec<Value> {
    vec![
        date_value(record.activity_date),
        Value::Text(record.org_id.clone()),
        text_value(&record.api_key_id),
        text_value(&record.workspace_id),
        text_value(&record.model),
        count_value(record.uncached_input_tokens),
        count_value(record.cache_creation_1h_tokens),
        count_value(record.cache_creation_5m_tokens),
        count_value(record.cache_read_tokens),
        count_value(record.output_tokens),
        count_value(record.web_search_requests),
        text_value(&record.service_tier),
        text_value(&record.context_window),
    ]
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        activity_date: get_date(row, 0)?,
        org_id: row.get(1)?,
        api_key_id: row.get(2)?,
        workspace_id: row.get(3)?,
        model: row.get(4)?,
        uncached_input_tokens: get_count(row, 5)?,
        cache_creation_1h_tokens: get_count(row, 6)?,
        cache_creation_5m_tokens: get_count(row, 7)?,
        cache_read_tokens: get_count(row, 8)?,
        output_tokens: get_count(row, 9)?,
        web_search_requests: get_count(row, 10)?,
        service_tier: row.get(11)?,
        context_window: row.get(12)?,
    })
}

pub async fn usage_records(db: &Database, date: NaiveDate) -> Result<Vec<UsageRecord>, TallyError> {
    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&select_sql(RelationKind::Usage))?;
            let rows = stmt
                .query_map([day], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
