// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end ingestion tests.
//!
//! `TestHarness` assembles the full ingestion stack against a
//! [`MockAdminApi`]: a file-backed SQLite sink in a temp directory, a fetch
//! client whose backoff sleeps are recorded instead of waited out, and an
//! orchestrator built from a real `TallyConfig`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tally_admin_api::{FetchClient, RecordingSleeper, RetryPolicy};
use tally_config::TallyConfig;
use tally_config::model::StorageConfig;
use tally_core::{SourceKind, TallyError};
use tally_cost::CostAllocationView;
use tally_ingest::IngestionOrchestrator;
use tally_storage::SqliteSink;

use crate::mock_api::MockAdminApi;

pub const TEST_ORG_ID: &str = "org-test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: TallyConfig,
    retry: RetryPolicy,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = TallyConfig::default();
        config.admin_api.organization_id = TEST_ORG_ID.to_string();
        Self {
            config,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(2),
                multiplier: 2.0,
            },
        }
    }

    /// Restrict the run to `sources`.
    pub fn with_sources(mut self, sources: &[SourceKind]) -> Self {
        self.config.ingest.sources = sources.to_vec();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-(date, workspace) spend ceiling.
    pub fn with_ceiling(mut self, ceiling_usd: f64, fatal: bool) -> Self {
        self.config.validation.workspace_daily_ceiling_usd = ceiling_usd;
        self.config.validation.fail_on_sanity_breach = fatal;
        self
    }

    pub fn with_backfill_concurrency(mut self, concurrency: usize) -> Self {
        self.config.ingest.backfill_concurrency = concurrency;
        self
    }

    /// Build the harness, starting the mock API and opening the sink.
    pub async fn build(self) -> Result<TestHarness, TallyError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| TallyError::Storage {
            source: Box::new(e),
        })?;
        let api = MockAdminApi::start().await;

        let mut config = self.config;
        config.admin_api.base_url = api.uri();
        config.storage = StorageConfig {
            database_path: temp_dir
                .path()
                .join("tally.db")
                .to_string_lossy()
                .into_owned(),
            wal_mode: true,
        };

        let sink = Arc::new(SqliteSink::open(&config.storage).await?);
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = FetchClient::new(
            &config.admin_api,
            SecretString::from("sk-ant-admin-test"),
            self.retry,
        )?
        .with_sleeper(sleeper.clone());
        let orchestrator = IngestionOrchestrator::new(&config, client, sink.clone())?;

        Ok(TestHarness {
            api,
            sink,
            orchestrator,
            sleeper,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// Complete ingestion environment for integration tests.
pub struct TestHarness {
    pub api: MockAdminApi,
    pub sink: Arc<SqliteSink>,
    pub orchestrator: IngestionOrchestrator,
    /// Backoff delays the client asked for, in order.
    pub sleeper: Arc<RecordingSleeper>,
    pub config: TallyConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings and all three sources enabled.
    pub async fn new() -> Result<Self, TallyError> {
        Self::builder().build().await
    }

    pub fn allocation_view(&self) -> CostAllocationView {
        CostAllocationView::new(self.sink.clone())
    }
}
