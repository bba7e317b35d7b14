// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analytical sink trait for the keyed, date-partitioned record store.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::TallyError;
use crate::records::{
    CanonicalBatch, CostRecord, NaturalKey, ProductivityRecord, RelationKind, UsageRecord,
};
use crate::types::RunReport;

/// Keyed store partitioned by activity date.
///
/// Writes only ever happen through [`replace_partition`], which swaps out one
/// relation's rows for one date in a single transaction. Re-running a date is
/// therefore a replacement, never an append.
///
/// [`replace_partition`]: AnalyticalSink::replace_partition
#[async_trait]
pub trait AnalyticalSink: Send + Sync {
    /// Atomically replaces every row of `batch.relation()` dated `date` with
    /// the rows of `batch`. Returns the number of rows written.
    async fn replace_partition(
        &self,
        date: NaiveDate,
        batch: CanonicalBatch,
    ) -> Result<usize, TallyError>;

    /// Number of rows currently stored for one relation and date.
    async fn partition_len(
        &self,
        relation: RelationKind,
        date: NaiveDate,
    ) -> Result<usize, TallyError>;

    /// Natural keys that occur more than once in one relation and date.
    async fn duplicate_keys(
        &self,
        relation: RelationKind,
        date: NaiveDate,
    ) -> Result<Vec<NaturalKey>, TallyError>;

    /// Column names of the relation as the sink physically stores it.
    async fn relation_columns(&self, relation: RelationKind) -> Result<Vec<String>, TallyError>;

    async fn cost_records(&self, date: NaiveDate) -> Result<Vec<CostRecord>, TallyError>;

    async fn usage_records(&self, date: NaiveDate) -> Result<Vec<UsageRecord>, TallyError>;

    async fn productivity_records(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ProductivityRecord>, TallyError>;

    /// Appends a run report to the run history.
    async fn record_run(&self, report: &RunReport) -> Result<(), TallyError>;
}
