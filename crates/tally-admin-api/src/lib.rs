// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin reporting API access for tally.
//!
//! [`FetchClient`] pages through the cost, messages usage, and Claude Code
//! reports with bounded retry. [`RecordNormalizer`] turns what it returns
//! into the canonical records of `tally-core`.

pub mod client;
pub mod endpoint;
pub mod normalize;
pub mod retry;
pub mod types;

pub use client::{FetchClient, PageStream};
pub use endpoint::{EndpointSpec, RequestWindow};
pub use normalize::{PageItem, RawRecord, RecordNormalizer, cents_to_dollars, fold_cost_records};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use types::{Bucket, ClaudeCodeRecord, CostResult, RawPage, UsageResult};
