// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-load checks for a freshly written date partition.
//!
//! Three checks run after a relation is loaded:
//!
//! 1. Duplicate keys: no natural key may appear twice in the partition.
//! 2. Productivity schema: neither the declared nor the stored column set of
//!    the productivity relation may name money or token quantities.
//! 3. Sanity bound: no (date, workspace) spend may exceed the configured
//!    ceiling. Reported as a warning unless policy makes it fatal.
//!
//! Checks 1 and 2 are always fatal. The first fatal finding is also returned
//! as a [`TallyError`] so the orchestrator can fail the source with it.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use tally_config::model::ValidationConfig;
use tally_core::{
    AnalyticalSink, CheckKind, Finding, ProductivityRecord, Relation, RelationKind, Severity,
    TallyError,
};
use tally_cost::SpendRollup;
use tracing::{debug, warn};

/// Column-name segments that denote money, token quantities, or the
/// per-model breakdown those are reported under.
pub const FORBIDDEN_PRODUCTIVITY_TERMS: &[&str] = &[
    "cost", "usd", "amount", "price", "spend", "currency", "token", "billing", "model",
];

/// Columns whose `_`-separated segments start with a forbidden term.
pub fn forbidden_fields<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    columns
        .iter()
        .map(AsRef::as_ref)
        .filter(|column| {
            column.to_ascii_lowercase().split('_').any(|segment| {
                FORBIDDEN_PRODUCTIVITY_TERMS
                    .iter()
                    .any(|term| segment.starts_with(term))
            })
        })
        .map(String::from)
        .collect()
}

/// Validation thresholds in exact decimal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub workspace_daily_ceiling_usd: Decimal,
    pub fail_on_sanity_breach: bool,
    pub reconcile_epsilon_usd: Decimal,
}

impl ValidationPolicy {
    pub fn from_config(config: &ValidationConfig) -> Result<Self, TallyError> {
        let to_decimal = |name: &str, value: f64| {
            Decimal::from_f64(value).ok_or_else(|| {
                TallyError::Config(format!("validation.{name} = {value} is not a decimal amount"))
            })
        };
        Ok(Self {
            workspace_daily_ceiling_usd: to_decimal(
                "workspace_daily_ceiling_usd",
                config.workspace_daily_ceiling_usd,
            )?,
            fail_on_sanity_breach: config.fail_on_sanity_breach,
            reconcile_epsilon_usd: to_decimal(
                "reconcile_epsilon_usd",
                config.reconcile_epsilon_usd,
            )?,
        })
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            workspace_daily_ceiling_usd: Decimal::from(10_000),
            fail_on_sanity_breach: false,
            reconcile_epsilon_usd: Decimal::from(10),
        }
    }
}

/// Findings for one relation and date.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// The first fatal finding, as the error the source fails with.
    pub violation: Option<TallyError>,
}

impl ValidationReport {
    fn push(&mut self, finding: Finding, error: TallyError) {
        if finding.is_fatal() && self.violation.is_none() {
            self.violation = Some(error);
        }
        self.findings.push(finding);
    }

    pub fn is_fatal(&self) -> bool {
        self.violation.is_some()
    }
}

/// Loaded spend for a (date, workspace) compared with an external figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub date: NaiveDate,
    pub workspace_id: Option<String>,
    pub loaded_usd: Decimal,
    pub reference_usd: Decimal,
    pub difference_usd: Decimal,
    pub epsilon_usd: Decimal,
    pub within_tolerance: bool,
}

/// Runs the post-load checks against the sink.
#[derive(Clone)]
pub struct ValidationEngine {
    sink: Arc<dyn AnalyticalSink>,
    policy: ValidationPolicy,
}

impl ValidationEngine {
    pub fn new(sink: Arc<dyn AnalyticalSink>, policy: ValidationPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Every check that applies to `relation`, against the `date` partition.
    pub async fn validate(
        &self,
        relation: RelationKind,
        date: NaiveDate,
    ) -> Result<ValidationReport, TallyError> {
        let mut report = ValidationReport::default();

        self.check_duplicates(relation, date, &mut report).await?;
        if relation == RelationKind::Productivity {
            self.check_productivity_schema(&mut report).await?;
        }
        if relation == RelationKind::Cost {
            self.check_sanity_bounds(date, &mut report).await?;
        }

        debug!(
            relation = %relation,
            date = %date,
            findings = report.findings.len(),
            fatal = report.is_fatal(),
            "validation finished"
        );
        Ok(report)
    }

    async fn check_duplicates(
        &self,
        relation: RelationKind,
        date: NaiveDate,
        report: &mut ValidationReport,
    ) -> Result<(), TallyError> {
        let keys = self.sink.duplicate_keys(relation, date).await?;
        if keys.is_empty() {
            return Ok(());
        }
        let subjects: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let error = TallyError::DuplicateDetected {
            relation,
            keys: subjects.clone(),
        };
        report.push(
            Finding {
                check: CheckKind::DuplicateKeys,
                severity: Severity::Error,
                relation,
                message: error.to_string(),
                subjects,
            },
            error,
        );
        Ok(())
    }

    async fn check_productivity_schema(
        &self,
        report: &mut ValidationReport,
    ) -> Result<(), TallyError> {
        let mut fields = forbidden_fields(ProductivityRecord::COLUMNS);
        let stored = self
            .sink
            .relation_columns(RelationKind::Productivity)
            .await?;
        for field in forbidden_fields(&stored) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            return Ok(());
        }

        let error = TallyError::SchemaViolation {
            relation: RelationKind::Productivity,
            fields: fields.clone(),
        };
        report.push(
            Finding {
                check: CheckKind::SchemaInvariant,
                severity: Severity::Error,
                relation: RelationKind::Productivity,
                message: error.to_string(),
                subjects: fields,
            },
            error,
        );
        Ok(())
    }

    async fn check_sanity_bounds(
        &self,
        date: NaiveDate,
        report: &mut ValidationReport,
    ) -> Result<(), TallyError> {
        let rollup = SpendRollup::load(self.sink.as_ref(), date).await?;
        let ceiling = self.policy.workspace_daily_ceiling_usd;
        let severity = if self.policy.fail_on_sanity_breach {
            Severity::Error
        } else {
            Severity::Warning
        };

        for (workspace, amount) in &rollup.by_workspace {
            if *amount <= ceiling {
                continue;
            }
            let workspace = workspace.as_deref().unwrap_or("null").to_string();
            warn!(
                date = %date,
                workspace = %workspace,
                amount_usd = %amount,
                ceiling_usd = %ceiling,
                "workspace spend above sanity ceiling"
            );
            let error = TallyError::SanityThresholdExceeded {
                workspace: workspace.clone(),
                amount_usd: *amount,
                ceiling_usd: ceiling,
            };
            report.push(
                Finding {
                    check: CheckKind::SanityBound,
                    severity,
                    relation: RelationKind::Cost,
                    message: error.to_string(),
                    subjects: vec![workspace],
                },
                error,
            );
        }
        Ok(())
    }

    /// Compares loaded spend for `(date, workspace)` against `reference_usd`.
    /// `workspace = None` is the null workspace.
    pub async fn reconcile(
        &self,
        date: NaiveDate,
        workspace: Option<&str>,
        reference_usd: Decimal,
        epsilon_usd: Decimal,
    ) -> Result<Reconciliation, TallyError> {
        let rollup = SpendRollup::load(self.sink.as_ref(), date).await?;
        let loaded_usd = rollup.workspace_total(workspace);
        let difference_usd = (loaded_usd - reference_usd).abs();
        Ok(Reconciliation {
            date,
            workspace_id: workspace.map(String::from),
            loaded_usd,
            reference_usd,
            difference_usd,
            epsilon_usd,
            within_tolerance: difference_usd <= epsilon_usd,
        })
    }
}
