// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost relation rows. Amounts are stored as exact decimal TEXT.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::Value;
use tally_core::{CostRecord, RelationKind, TallyError};

use super::{date_value, get_date, get_parsed, select_sql, text_value};
use crate::database::Database;

pub(crate) fn to_row(record: &CostRecord) -> Vec<Value> {
    vec![
        date_value(record.activity_date),
        Value::Text(record.org_id.clone()),
        text_value(&record.workspace_id),
        text_value(&record.model),
        text_value(&record.token_type),
        text_value(&record.cost_type),
        Value::Text(record.amount_usd.to_string()),
        Value::Text(record.currency.clone()),
        text_value(&record.description),
        text_value(&record.service_tier),
        text_value(&record.context_window),
    ]
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<CostRecord> {
    Ok(CostRecord {
        activity_date: get_date(row, 0)?,
        org_id: row.get(1)?,
        workspace_id: row.get(2)?,
        model: row.get(3)?,
        token_type: row.get(4)?,
        cost_type: row.get(5)?,
        amount_usd: get_parsed(row, 6)?,
        currency: row.get(7)?,
        description: row.get(8)?,
        service_tier: row.get(9)?,
        context_window: row.get(10)?,
    })
}

/// Every cost row of one date, in load order.
pub async fn cost_records(db: &Database, date: NaiveDate) -> Result<Vec<CostRecord>, TallyError> {
    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&select_sql(RelationKind::Cost))?;
            let rows = stmt
                .query_map([day], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
