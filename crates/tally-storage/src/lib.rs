// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite analytical sink for tally.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and transactional per-date
//! partition replacement for the cost, usage, and productivity relations.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod sink;

pub use database::Database;
pub use sink::SqliteSink;
