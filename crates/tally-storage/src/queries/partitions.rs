// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relation-agnostic partition operations: replace, count, duplicate scan,
//! and physical column listing.

use chrono::NaiveDate;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tally_core::{CanonicalBatch, NaturalKey, Relation, RelationKind, TallyError};

use super::{costs, date_value, insert_sql, productivity, usage};
use crate::database::Database;

/// Replaces all rows of `batch.relation()` dated `date` with `batch`, in one
/// transaction. Readers see either the old partition or the new one.
pub async fn replace_partition(
    db: &Database,
    date: NaiveDate,
    batch: CanonicalBatch,
) -> Result<usize, TallyError> {
    let relation = batch.relation();
    let rows: Vec<Vec<Value>> = match &batch {
        CanonicalBatch::Cost(records) => {
            check_partition(date, records)?;
            records.iter().map(costs::to_row).collect()
        }
        CanonicalBatch::Usage(records) => {
            check_partition(date, records)?;
            records.iter().map(usage::to_row).collect()
        }
        CanonicalBatch::Productivity(records) => {
            check_partition(date, records)?;
            records.iter().map(productivity::to_row).collect()
        }
    };

    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!("DELETE FROM {} WHERE activity_date = ?1", relation.table()),
                [&day],
            )?;
            {
                let mut stmt = tx.prepare(&insert_sql(relation))?;
                for row in &rows {
                    stmt.execute(params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn check_partition<R: Relation>(date: NaiveDate, records: &[R]) -> Result<(), TallyError> {
    match records.iter().find(|r| r.activity_date() != date) {
        Some(stray) => Err(TallyError::PartitionMismatch {
            expected: date,
            found: stray.activity_date(),
        }),
        None => Ok(()),
    }
}

pub async fn partition_len(
    db: &Database,
    relation: RelationKind,
    date: NaiveDate,
) -> Result<usize, TallyError> {
    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE activity_date = ?1",
                    relation.table()
                ),
                [day],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Natural keys appearing more than once in one partition. `GROUP BY` puts
/// NULLs in one group, so two rows with a null workspace collide.
pub async fn duplicate_keys(
    db: &Database,
    relation: RelationKind,
    date: NaiveDate,
) -> Result<Vec<NaturalKey>, TallyError> {
    let key_columns = relation.natural_key_columns().join(", ");
    let width = relation.natural_key_columns().len();
    let sql = format!(
        "SELECT {key_columns} FROM {} WHERE activity_date = ?1 \
         GROUP BY {key_columns} HAVING COUNT(*) > 1 ORDER BY {key_columns}",
        relation.table()
    );
    let day = date_value(date);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let keys = stmt
                .query_map([day], |row| {
                    (0..width)
                        .map(|i| row.get::<_, Option<String>>(i))
                        .collect::<Result<Vec<_>, _>>()
                        .map(NaturalKey)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Column names as SQLite stores them, in table order.
pub async fn relation_columns(
    db: &Database,
    relation: RelationKind,
) -> Result<Vec<String>, TallyError> {
    let table = relation.table();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let names = stmt
                .query_map([table], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
