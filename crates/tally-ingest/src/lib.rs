// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion runs for tally.
//!
//! [`IngestionOrchestrator`] drives each source from fetch to validation for
//! one date or a backfill range. [`ValidationEngine`] holds the post-load
//! checks and the reconciliation against external spend figures.

pub mod orchestrator;
pub mod validation;

pub use orchestrator::IngestionOrchestrator;
pub use validation::{
    FORBIDDEN_PRODUCTIVITY_TERMS, Reconciliation, ValidationEngine, ValidationPolicy,
    ValidationReport, forbidden_fields,
};
