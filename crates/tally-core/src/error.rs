// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tally ingestion engine.
//!
//! [`FetchError`] classifies a single failed page request; [`TallyError`] is
//! what crosses component boundaries and ends up in a run report.

use std::time::Duration;

use thiserror::Error;

use crate::records::RelationKind;

/// Outcome of one failed page request, before the retry policy is applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection failure, request timeout, or a truncated body.
    #[error("transient network error: {message}")]
    TransientNetwork { message: String },

    /// The endpoint answered 429.
    #[error("rate limited (retry-after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The endpoint answered with a 5xx status.
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Any 4xx other than 429. Retrying cannot help.
    #[error("request rejected with {status}: {message}")]
    FatalClient { status: u16, message: String },

    /// A 2xx response whose body did not match the endpoint shape.
    #[error("malformed response body: {message}")]
    Decode { message: String },
}

impl FetchError {
    /// Whether the same page request may be issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::TransientNetwork { .. }
                | FetchError::RateLimited { .. }
                | FetchError::ServerError { .. }
        )
    }

    /// Server-provided minimum wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// The primary error type used across all tally crates.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Configuration errors (invalid values, unusable endpoint settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// A credential could not be resolved by the credential provider.
    #[error("credential `{name}` unavailable: {reason}")]
    Credential { name: String, reason: String },

    /// Analytical sink errors (connection, migration, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A non-retryable page request failure.
    ///
    /// `resume_cursor` is the `next_page` cursor returned by the last page that
    /// was fetched successfully, `None` if the first page failed.
    #[error("fetch from {endpoint} failed after {attempts} attempt(s): {source}")]
    Fetch {
        endpoint: String,
        attempts: u32,
        resume_cursor: Option<String>,
        source: FetchError,
    },

    /// A retryable failure that persisted through every allowed attempt.
    #[error("fetch from {endpoint} exhausted {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        resume_cursor: Option<String>,
        source: FetchError,
    },

    /// A raw record could not be converted to its canonical form.
    #[error("cannot normalize {endpoint} record: {message}")]
    Normalize { endpoint: String, message: String },

    /// A normalized record fell outside the date partition being written.
    #[error("record for {found} does not belong to partition {expected}")]
    PartitionMismatch {
        expected: chrono::NaiveDate,
        found: chrono::NaiveDate,
    },

    /// A relation declares a field that denotes money or token counts where
    /// none is allowed.
    #[error("schema violation in {relation}: forbidden field(s) {fields:?}")]
    SchemaViolation {
        relation: RelationKind,
        fields: Vec<String>,
    },

    /// Two rows in a freshly written partition share a natural key.
    #[error("duplicate natural keys in {relation}: {keys:?}")]
    DuplicateDetected {
        relation: RelationKind,
        keys: Vec<String>,
    },

    /// A (date, workspace) spend aggregate exceeded the configured ceiling.
    #[error("workspace {workspace} spent {amount_usd} USD, above ceiling {ceiling_usd}")]
    SanityThresholdExceeded {
        workspace: String,
        amount_usd: rust_decimal::Decimal,
        ceiling_usd: rust_decimal::Decimal,
    },

    /// The run was cancelled between page fetches.
    #[error("cancelled before {stage} completed")]
    Cancelled { stage: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// The cursor an operator can hand back to resume a failed fetch.
    pub fn resume_cursor(&self) -> Option<&str> {
        match self {
            TallyError::Fetch { resume_cursor, .. }
            | TallyError::RetriesExhausted { resume_cursor, .. } => resume_cursor.as_deref(),
            _ => None,
        }
    }
}
