// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tally usage and cost ingestion engine.
//!
//! This crate provides the canonical record types for the three ingested
//! relations, the error taxonomy, run report types, and the boundary traits
//! for the analytical sink and credential lookup.

pub mod error;
pub mod records;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{FetchError, TallyError};
pub use records::{
    ActorType, CanonicalBatch, CanonicalRecord, CostRecord, NaturalKey, ProductivityRecord,
    Relation, RelationKind, UsageRecord,
};
pub use traits::{AnalyticalSink, CredentialProvider, EnvCredentials, StaticCredentials};
pub use types::{
    BackfillReport, CheckKind, DateRange, Finding, RunReport, Severity, SourceKind, SourceReport,
    SourceState,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fetch_error_retry_classification() {
        let retryable = [
            FetchError::TransientNetwork {
                message: "timed out".into(),
            },
            FetchError::RateLimited { retry_after: None },
            FetchError::ServerError {
                status: 503,
                message: "overloaded".into(),
            },
        ];
        for err in &retryable {
            assert!(err.is_retryable(), "{err} should be retryable");
        }

        let fatal = [
            FetchError::FatalClient {
                status: 401,
                message: "bad key".into(),
            },
            FetchError::Decode {
                message: "missing field".into(),
            },
        ];
        for err in &fatal {
            assert!(!err.is_retryable(), "{err} should be fatal");
        }
    }

    #[test]
    fn retry_after_only_comes_from_rate_limits() {
        let limited = FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        let server = FetchError::ServerError {
            status: 500,
            message: String::new(),
        };
        assert_eq!(server.retry_after(), None);
    }

    #[test]
    fn fetch_errors_expose_resume_cursor() {
        let err = TallyError::Fetch {
            endpoint: "cost_report".into(),
            attempts: 1,
            resume_cursor: Some("page_2".into()),
            source: FetchError::FatalClient {
                status: 400,
                message: "bad".into(),
            },
        };
        assert_eq!(err.resume_cursor(), Some("page_2"));
        assert!(err.to_string().contains("cost_report"));
        assert_eq!(TallyError::Internal("x".into()).resume_cursor(), None);
    }
}
