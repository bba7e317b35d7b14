// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits for the collaborators the ingestion engine does not own.

pub mod credentials;
pub mod sink;

pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use sink::AnalyticalSink;
