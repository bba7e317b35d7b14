// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Admin reporting API for deterministic testing.
//!
//! `MockAdminApi` serves fixture pages for the three report endpoints,
//! chained by `next_page` cursors, and can inject failing responses ahead of
//! them. wiremock answers with the first mounted mock that matches, so
//! failures must be mounted before the pages they precede.

use chrono::NaiveDate;
use serde_json::Value;
use tally_admin_api::endpoint::{CLAUDE_CODE_PATH, COST_REPORT_PATH, MESSAGES_USAGE_PATH};
use tally_core::SourceKind;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::fixtures::{bucket_page, flat_page};

/// A wiremock server speaking the reporting API's page protocol.
pub struct MockAdminApi {
    server: MockServer,
}

impl MockAdminApi {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to put in `admin_api.base_url`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn path_for(source: SourceKind) -> &'static str {
        match source {
            SourceKind::CostReport => COST_REPORT_PATH,
            SourceKind::MessagesUsage => MESSAGES_USAGE_PATH,
            SourceKind::ClaudeCode => CLAUDE_CODE_PATH,
        }
    }

    /// The `starting_at` value the client sends for `date`.
    pub fn starting_at(source: SourceKind, date: NaiveDate) -> String {
        match source {
            SourceKind::ClaudeCode => date.format("%Y-%m-%d").to_string(),
            SourceKind::CostReport | SourceKind::MessagesUsage => {
                format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
            }
        }
    }

    /// Cursor that leads to page `index` (1-based beyond the first page).
    pub fn cursor(source: SourceKind, date: NaiveDate, index: usize) -> String {
        format!("{source}-{date}-{index}")
    }

    /// Serves `pages` for `source` on `date`. Each inner vector is one page of
    /// result lines; pages are chained with cursors and the last one ends with
    /// `has_more = false`. No pages serves a single empty page.
    pub async fn mount_pages(&self, source: SourceKind, date: NaiveDate, pages: Vec<Vec<Value>>) {
        let pages = if pages.is_empty() {
            vec![Vec::new()]
        } else {
            pages
        };
        let count = pages.len();

        for (index, items) in pages.into_iter().enumerate() {
            let next = (index + 1 < count).then(|| Self::cursor(source, date, index + 1));
            let body = match source {
                SourceKind::ClaudeCode => flat_page(items, next.as_deref()),
                SourceKind::CostReport | SourceKind::MessagesUsage => {
                    bucket_page(date, items, next.as_deref())
                }
            };

            let mock = Mock::given(method("GET"))
                .and(path(Self::path_for(source)))
                .and(query_param("starting_at", Self::starting_at(source, date)));
            let mock = if index == 0 {
                mock.and(query_param_is_missing("page"))
            } else {
                mock.and(query_param("page", Self::cursor(source, date, index)))
            };
            mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }
    }

    /// Answers the next `times` requests for `source` on `date` with `status`.
    pub async fn mount_failures(&self, source: SourceKind, date: NaiveDate, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::path_for(source)))
            .and(query_param("starting_at", Self::starting_at(source, date)))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "mock_error", "message": format!("injected {status}")}
            })))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Every request received for `source`, in arrival order.
    pub async fn requests_for(&self, source: SourceKind) -> Vec<Request> {
        let wanted = Self::path_for(source);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == wanted)
            .collect()
    }

    /// The `page` cursor of every request received for `source`, `None` for
    /// first-page requests.
    pub async fn cursors_requested(&self, source: SourceKind) -> Vec<Option<String>> {
        self.requests_for(source)
            .await
            .iter()
            .map(|request| {
                request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "page")
                    .map(|(_, value)| value.into_owned())
            })
            .collect()
    }
}
