// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tally integration tests.
//!
//! Provides a mock Admin reporting API and a harness wiring it to a real
//! orchestrator and a temp SQLite sink, so tests run without network access.
//!
//! # Components
//!
//! - [`MockAdminApi`] - wiremock server serving paginated report fixtures
//! - [`fixtures`] - JSON builders for report lines and pages
//! - [`TestHarness`] - config, mock API, sink, and orchestrator in one place

pub mod fixtures;
pub mod harness;
pub mod mock_api;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_api::MockAdminApi;
