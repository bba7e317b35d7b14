// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the AnalyticalSink trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use tally_config::model::StorageConfig;
use tally_core::{
    AnalyticalSink, CanonicalBatch, CostRecord, NaturalKey, ProductivityRecord, RelationKind,
    RunReport, TallyError, UsageRecord,
};
use tracing::debug;

use crate::database::Database;
use crate::queries;

/// SQLite-backed analytical sink.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
#[derive(Clone)]
pub struct SqliteSink {
    db: Database,
}

impl SqliteSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the configured database file, applying migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, TallyError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self::new(db))
    }

    pub async fn open_in_memory() -> Result<Self, TallyError> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run history for one date, oldest first.
    pub async fn runs_for_date(&self, date: NaiveDate) -> Result<Vec<RunReport>, TallyError> {
        queries::runs::runs_for_date(&self.db, date).await
    }
}

#[async_trait]
impl AnalyticalSink for SqliteSink {
    async fn replace_partition(
        &self,
        date: NaiveDate,
        batch: CanonicalBatch,
    ) -> Result<usize, TallyError> {
        let relation = batch.relation();
        let written = queries::partitions::replace_partition(&self.db, date, batch).await?;
        debug!(relation = %relation, date = %date, records = written, "partition replaced");
        Ok(written)
    }

    async fn partition_len(
        &self,
        relation: RelationKind,
        date: NaiveDate,
    ) -> Result<usize, TallyError> {
        queries::partitions::partition_len(&self.db, relation, date).await
    }

    async fn duplicate_keys(
        &self,
        relation: RelationKind,
        date: NaiveDate,
    ) -> Result<Vec<NaturalKey>, TallyError> {
        queries::partitions::duplicate_keys(&self.db, relation, date).await
    }

    async fn relation_columns(&self, relation: RelationKind) -> Result<Vec<String>, TallyError> {
        queries::partitions::relation_columns(&self.db, relation).await
    }

    async fn cost_records(&self, date: NaiveDate) -> Result<Vec<CostRecord>, TallyError> {
        queries::costs::cost_records(&self.db, date).await
    }

    async fn usage_records(&self, date: NaiveDate) -> Result<Vec<UsageRecord>, TallyError> {
        queries::usage::usage_records(&self.db, date).await
    }

    async fn productivity_records(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ProductivityRecord>, TallyError> {
        queries::productivity::productivity_records(&self.db, date).await
    }

    async fn record_run(&self, report: &RunReport) -> Result<(), TallyError> {
        queries::runs::insert_run(&self.db, report).await
    }
}
