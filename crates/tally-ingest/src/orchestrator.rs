// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion runs: one date, every configured source, one report.
//!
//! Each source is its own pipeline
//! (`Pending -> Fetching -> Normalizing -> Loading -> Validating -> Complete`)
//! and fails on its own: a source that ends `Failed` does not stop the
//! others. Runs for the same date are serialized; runs for different dates
//! touch disjoint partitions and may overlap.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tally_admin_api::{
    Bucket, ClaudeCodeRecord, CostResult, EndpointSpec, FetchClient, PageItem, RawRecord,
    RecordNormalizer, UsageResult, fold_cost_records,
};
use tally_config::TallyConfig;
use tally_core::{
    AnalyticalSink, BackfillReport, CanonicalBatch, DateRange, Finding, RunReport, SourceKind,
    SourceReport, SourceState, TallyError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::validation::{ValidationEngine, ValidationPolicy};

/// Coordinates fetch, normalize, load, and validate for each source.
pub struct IngestionOrchestrator {
    client: Arc<FetchClient>,
    sink: Arc<dyn AnalyticalSink>,
    normalizer: RecordNormalizer,
    validator: ValidationEngine,
    endpoints: BTreeMap<SourceKind, EndpointSpec>,
    sources: Vec<SourceKind>,
    backfill_concurrency: usize,
    cancel: CancellationToken,
    date_locks: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl IngestionOrchestrator {
    pub fn new(
        config: &TallyConfig,
        client: FetchClient,
        sink: Arc<dyn AnalyticalSink>,
    ) -> Result<Self, TallyError> {
        let policy = ValidationPolicy::from_config(&config.validation)?;
        let endpoints = SourceKind::ALL
            .into_iter()
            .map(|source| (source, EndpointSpec::for_source(source, &config.admin_api)))
            .collect();

        let mut sources = config.ingest.sources.clone();
        sources.sort();
        sources.dedup();

        Ok(Self {
            client: Arc::new(client),
            validator: ValidationEngine::new(sink.clone(), policy),
            sink,
            normalizer: RecordNormalizer::new(config.admin_api.organization_id.clone()),
            endpoints,
            sources,
            backfill_concurrency: config.ingest.backfill_concurrency.max(1),
            cancel: CancellationToken::new(),
            date_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Stops runs at their next page boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn sources(&self) -> &[SourceKind] {
        &self.sources
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    /// Ingests every configured source for `date`.
    pub async fn ingest(&self, date: NaiveDate) -> RunReport {
        self.ingest_sources(date, &self.sources).await
    }

    /// Ingests only `sources` for `date`, for targeted re-runs of the
    /// sources a previous report listed as failed. Repeated sources run once.
    pub async fn ingest_sources(&self, date: NaiveDate, sources: &[SourceKind]) -> RunReport {
        let mut sources = sources.to_vec();
        sources.sort();
        sources.dedup();

        let lock = self.date_lock(date);
        let guard = lock.lock().await;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            date = %date,
            sources = sources.len(),
            "ingestion run started"
        );

        let reports = join_all(sources.iter().map(|source| self.run_source(*source, date))).await;
        let report = RunReport {
            run_id,
            date,
            started_at,
            finished_at: Utc::now(),
            sources: reports,
        };

        if let Err(e) = self.sink.record_run(&report).await {
            error!(run_id = %report.run_id, date = %date, error = %e, "failed to record run history");
        }

        drop(guard);
        self.release_date_lock(date, lock);

        if report.is_complete() {
            info!(
                run_id = %report.run_id,
                date = %date,
                records = report.total_records(),
                "ingestion run complete"
            );
        } else {
            let failed: Vec<String> = report
                .failed_sources()
                .iter()
                .map(ToString::to_string)
                .collect();
            warn!(
                run_id = %report.run_id,
                date = %date,
                failed = ?failed,
                "ingestion run finished with failed sources"
            );
        }
        report
    }

    /// Ingests every day in `range`, continuing past failed dates.
    pub async fn backfill(&self, range: DateRange) -> BackfillReport {
        let days: Vec<NaiveDate> = range.days().collect();
        info!(
            start = %range.start,
            days = days.len(),
            concurrency = self.backfill_concurrency,
            "backfill started"
        );

        let reports: Vec<RunReport> = stream::iter(days)
            .map(|date| self.ingest(date))
            .buffered(self.backfill_concurrency)
            .collect()
            .await;

        let report = BackfillReport::from_reports(range, reports);
        if report.failed_dates.is_empty() {
            info!(days = report.reports.len(), "backfill complete");
        } else {
            warn!(
                days = report.reports.len(),
                failed = report.failed_dates.len(),
                "backfill finished with failed dates"
            );
        }
        report
    }

    async fn run_source(&self, source: SourceKind, date: NaiveDate) -> SourceReport {
        let mut run = SourceRun::new(source, date);
        if let Err(e) = self.drive(&mut run).await {
            run.fail(e);
        }
        run.into_report()
    }

    async fn drive(&self, run: &mut SourceRun) -> Result<(), TallyError> {
        let endpoint = self.endpoints.get(&run.source).ok_or_else(|| {
            TallyError::Internal(format!("no endpoint configured for {}", run.source))
        })?;

        run.advance(SourceState::Fetching)?;
        let raw = match run.source {
            SourceKind::CostReport => self.collect::<Bucket<CostResult>>(endpoint, run).await?,
            SourceKind::MessagesUsage => {
                self.collect::<Bucket<UsageResult>>(endpoint, run).await?
            }
            SourceKind::ClaudeCode => self.collect::<ClaudeCodeRecord>(endpoint, run).await?,
        };

        run.advance(SourceState::Normalizing)?;
        let records = raw
            .into_iter()
            .map(|record| self.normalizer.normalize(record))
            .collect::<Result<Vec<_>, _>>()?;
        let records = fold_cost_records(records);
        let batch = CanonicalBatch::from_records(run.source.relation(), run.date, records)?;

        if self.cancel.is_cancelled() {
            return Err(TallyError::Cancelled {
                stage: "loading".into(),
            });
        }
        run.advance(SourceState::Loading)?;
        run.record_count = self.sink.replace_partition(run.date, batch).await?;

        run.advance(SourceState::Validating)?;
        let report = self
            .validator
            .validate(run.source.relation(), run.date)
            .await?;
        for finding in report.findings.iter().filter(|f| !f.is_fatal()) {
            warn!(
                source = %run.source,
                date = %run.date,
                check = %finding.check,
                "{}",
                finding.message
            );
        }
        run.findings = report.findings;
        if let Some(violation) = report.violation {
            return Err(violation);
        }

        run.advance(SourceState::Complete)
    }

    /// Drains every page of `endpoint` for the run's date into raw records.
    async fn collect<T: PageItem>(
        &self,
        endpoint: &EndpointSpec,
        run: &mut SourceRun,
    ) -> Result<Vec<RawRecord>, TallyError> {
        let mut pages = self
            .client
            .fetch_all::<T>(endpoint, DateRange::single(run.date))?;
        let mut raw = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                return Err(TallyError::Cancelled {
                    stage: "fetching".into(),
                });
            }
            let Some(page) = pages.next().await else {
                break;
            };
            let page = page?;
            run.page_count += 1;
            raw.extend(page.data.into_iter().flat_map(T::into_raw_records));
            debug!(
                source = %run.source,
                date = %run.date,
                page = run.page_count,
                records = raw.len(),
                "page fetched"
            );
        }
        Ok(raw)
    }

    fn date_lock(&self, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .date_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(date).or_default().clone()
    }

    /// Drops the map entry once no other run holds or waits on it.
    fn release_date_lock(&self, date: NaiveDate, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .date_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&date);
        }
    }
}

/// Mutable state of one source within one run.
#[derive(Debug)]
struct SourceRun {
    source: SourceKind,
    date: NaiveDate,
    state: SourceState,
    record_count: usize,
    page_count: usize,
    findings: Vec<Finding>,
    error: Option<String>,
    failed_in: Option<SourceState>,
    resume_cursor: Option<String>,
}

impl SourceRun {
    fn new(source: SourceKind, date: NaiveDate) -> Self {
        Self {
            source,
            date,
            state: SourceState::Pending,
            record_count: 0,
            page_count: 0,
            findings: Vec::new(),
            error: None,
            failed_in: None,
            resume_cursor: None,
        }
    }

    fn advance(&mut self, next: SourceState) -> Result<(), TallyError> {
        if !self.state.can_transition_to(next) {
            return Err(TallyError::Internal(format!(
                "{} cannot move from {} to {next}",
                self.source, self.state
            )));
        }
        debug!(
            source = %self.source,
            date = %self.date,
            from = %self.state,
            to = %next,
            "source state changed"
        );
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: TallyError) {
        error!(
            source = %self.source,
            date = %self.date,
            state = %self.state,
            cursor = err.resume_cursor().unwrap_or(""),
            error = %err,
            "source failed"
        );
        self.failed_in = Some(self.state);
        self.resume_cursor = err.resume_cursor().map(String::from);
        self.error = Some(err.to_string());
        self.state = SourceState::Failed;
    }

    fn into_report(self) -> SourceReport {
        SourceReport {
            source: self.source,
            status: self.state,
            record_count: self.record_count,
            page_count: self.page_count,
            findings: self.findings,
            error: self.error,
            failed_in: self.failed_in,
            resume_cursor: self.resume_cursor,
        }
    }
}
