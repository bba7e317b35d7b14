// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Admin reporting endpoints.
//!
//! Provides [`FetchClient`], which handles authentication, cursor pagination,
//! and bounded retry of transient page failures. Pages come out as a lazy
//! stream; dropping it early issues no further requests.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tally_config::model::AdminApiConfig;
use tally_core::{DateRange, FetchError, TallyError};
use tracing::{debug, warn};

use crate::endpoint::EndpointSpec;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::types::{ApiErrorResponse, RawPage};

/// Lazy sequence of pages for one endpoint and date range.
pub type PageStream<'a, T> = BoxStream<'a, Result<RawPage<T>, TallyError>>;

/// Paginating, retrying client for the reporting API.
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// Creates a client for `config.base_url` authenticated with `api_key`.
    pub fn new(
        config: &AdminApiConfig,
        api_key: SecretString,
        retry: RetryPolicy,
    ) -> Result<Self, TallyError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            TallyError::Config(format!("invalid admin_api.base_url `{base_url}`: {e}"))
        })?;

        let mut key = HeaderValue::from_str(api_key.expose_secret()).map_err(|_| {
            TallyError::Credential {
                name: config.api_key_credential.clone(),
                reason: "not a valid HTTP header value".into(),
            }
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&config.api_version).map_err(|e| {
                TallyError::Config(format!("invalid API version header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TallyError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces how the client waits between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Every page of `endpoint` for `range`, starting from the first.
    pub fn fetch_all<'a, T>(
        &'a self,
        endpoint: &'a EndpointSpec,
        range: DateRange,
    ) -> Result<PageStream<'a, T>, TallyError>
    where
        T: DeserializeOwned + Send + 'a,
    {
        self.pages_from(endpoint, range, None)
    }

    /// Every page of `endpoint` for `range`, starting at `resume_cursor`
    /// when one is given.
    ///
    /// Invalid request shapes (such as a multi-day range for a single-day
    /// endpoint) fail here, before anything is sent. Each page is retried on
    /// its own; a page that fails for good ends the stream with an error
    /// carrying the cursor it was requested with.
    pub fn pages_from<'a, T>(
        &'a self,
        endpoint: &'a EndpointSpec,
        range: DateRange,
        resume_cursor: Option<String>,
    ) -> Result<PageStream<'a, T>, TallyError>
    where
        T: DeserializeOwned + Send + 'a,
    {
        let query = endpoint.query(&range)?;
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint.path))
            .map_err(|e| TallyError::Config(format!("invalid endpoint URL: {e}")))?;
        url.query_pairs_mut().extend_pairs(&query);

        debug!(
            source = %endpoint.source,
            start = %range.start,
            days = range.num_days(),
            cursor = resume_cursor.as_deref().unwrap_or(""),
            "starting page stream"
        );

        // `None` once the last page has been yielded. The set holds every
        // cursor already requested so a cycle cannot loop forever.
        let seen: HashSet<String> = resume_cursor.iter().cloned().collect();
        let initial: Option<(Option<String>, HashSet<String>)> = Some((resume_cursor, seen));
        let pages = stream::try_unfold(initial, move |state| {
            let url = url.clone();
            async move {
                let Some((cursor, mut seen)) = state else {
                    return Ok(None);
                };
                let page: RawPage<T> = self.fetch_page(endpoint, &url, cursor.as_deref()).await?;

                let next = match (page.has_more, page.next_page.as_deref()) {
                    (false, _) => None,
                    (true, Some(next)) if seen.insert(next.to_string()) => {
                        Some((Some(next.to_string()), seen))
                    }
                    (true, Some(next)) => {
                        return Err(failure(
                            endpoint,
                            1,
                            cursor.as_deref(),
                            FetchError::Decode {
                                message: format!(
                                    "next_page cursor did not advance: `{next}` was already requested"
                                ),
                            },
                        ));
                    }
                    (true, None) => {
                        return Err(failure(
                            endpoint,
                            1,
                            cursor.as_deref(),
                            FetchError::Decode {
                                message: "has_more set without a next_page cursor".into(),
                            },
                        ));
                    }
                };
                Ok(Some((page, next)))
            }
        });

        Ok(pages.boxed())
    }

    /// One page, retried per the policy.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &EndpointSpec,
        url: &Url,
        cursor: Option<&str>,
    ) -> Result<RawPage<T>, TallyError> {
        let mut url = url.clone();
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("page", cursor);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&url).await {
                Ok(page) => {
                    if attempt > 1 {
                        debug!(
                            source = %endpoint.source,
                            attempt,
                            cursor = cursor.unwrap_or(""),
                            "page fetched after retry"
                        );
                    }
                    return Ok(page);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt, error.retry_after());
                    warn!(
                        source = %endpoint.source,
                        error = %error,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        cursor = cursor.unwrap_or(""),
                        "retryable page failure, will retry after delay"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(error) => {
                    if attempt > 1 {
                        warn!(
                            source = %endpoint.source,
                            error = %error,
                            attempts = attempt,
                            "page failed after all retry attempts"
                        );
                    }
                    return Err(failure(endpoint, attempt, cursor, error));
                }
            }
        }
    }

    /// A single HTTP round trip, classified.
    async fn send_once<T: DeserializeOwned>(&self, url: &Url) -> Result<RawPage<T>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = %status, path = url.path(), "page response received");

        if status.is_success() {
            let body = response.text().await.map_err(transport_error)?;
            return serde_json::from_str(&body).map_err(|e| FetchError::Decode {
                message: e.to_string(),
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!("{}: {}", api_err.error.type_, api_err.error.message),
            Err(_) => body,
        };
        Err(status_error(status, retry_after, message))
    }
}

fn failure(
    endpoint: &EndpointSpec,
    attempts: u32,
    cursor: Option<&str>,
    source: FetchError,
) -> TallyError {
    let endpoint = endpoint.source.to_string();
    let resume_cursor = cursor.map(String::from);
    if source.is_retryable() {
        TallyError::RetriesExhausted {
            endpoint,
            attempts,
            resume_cursor,
            source,
        }
    } else {
        TallyError::Fetch {
            endpoint,
            attempts,
            resume_cursor,
            source,
        }
    }
}

fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_builder() || error.is_redirect() {
        return FetchError::FatalClient {
            status: error.status().map(|s| s.as_u16()).unwrap_or_default(),
            message: error.to_string(),
        };
    }
    if error.is_decode() {
        return FetchError::Decode {
            message: error.to_string(),
        };
    }
    // Connect, timeout, request, and truncated bodies.
    FetchError::TransientNetwork {
        message: error.to_string(),
    }
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, message: String) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited { retry_after }
    } else if status.is_server_error() {
        FetchError::ServerError {
            status: status.as_u16(),
            message,
        }
    } else {
        FetchError::FatalClient {
            status: status.as_u16(),
            message,
        }
    }
}

/// `retry-after` in (possibly fractional) seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use chrono::NaiveDate;
    use futures::TryStreamExt;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COST: &str = "/v1/organizations/cost_report";

    fn day() -> DateRange {
        DateRange::single(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
    }

    fn client_for(server: &MockServer, max_attempts: u32) -> (FetchClient, Arc<RecordingSleeper>) {
        let config = AdminApiConfig {
            base_url: server.uri(),
            request_timeout_secs: 1,
            ..AdminApiConfig::default()
        };
        let retry = RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            multiplier: 2.0,
        };
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = FetchClient::new(&config, SecretString::from("sk-admin-test".to_string()), retry)
            .unwrap()
            .with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    fn page(items: Value, next: Option<&str>) -> Value {
        json!({ "data": items, "has_more": next.is_some(), "next_page": next })
    }

    async fn collect(
        client: &FetchClient,
        spec: &EndpointSpec,
        resume: Option<String>,
    ) -> Result<Vec<RawPage<Value>>, TallyError> {
        client.pages_from::<Value>(spec, day(), resume)?.try_collect().await
    }

    #[tokio::test]
    async fn follows_cursors_until_has_more_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1, 2]), Some("p2"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([3]), Some("p3"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([4]), None)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 3);
        let spec = EndpointSpec::cost_report(vec!["workspace_id".into()], 31);
        let pages = collect(&client, &spec, None).await.unwrap();

        let items: Vec<Value> = pages.into_iter().flat_map(|p| p.data).collect();
        assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4)]);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn sends_auth_version_and_window_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(header("x-api-key", "sk-admin-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(query_param("starting_at", "2025-09-01T00:00:00Z"))
            .and(query_param("ending_at", "2025-09-02T00:00:00Z"))
            .and(query_param("bucket_width", "1d"))
            .and(query_param("group_by[]", "workspace_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]), None)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::cost_report(vec!["workspace_id".into()], 31);
        let pages = collect(&client, &spec, None).await.unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_with_backoff_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!(["ok"]), None)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 3);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let pages = collect(&client, &spec, None).await.unwrap();

        assert_eq!(pages[0].data, vec![json!("ok")]);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn rate_limit_retry_after_raises_the_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0.5"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]), None)))
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 2);
        let spec = EndpointSpec::cost_report(vec![], 31);
        collect(&client, &spec, None).await.unwrap();
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn client_errors_are_fatal_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": { "type": "authentication_error", "message": "invalid x-api-key" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 5);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, None).await.unwrap_err();

        match err {
            TallyError::Fetch {
                attempts,
                resume_cursor,
                source: FetchError::FatalClient { status, message },
                ..
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(status, 401);
                assert!(message.contains("authentication_error"));
                assert!(resume_cursor.is_none());
            }
            other => panic!("expected fatal fetch error, got {other}"),
        }
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn fatal_failure_mid_stream_reports_resume_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1]), Some("p2"))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad cursor"))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 3);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, None).await.unwrap_err();
        assert_eq!(err.resume_cursor(), Some("p2"));
    }

    #[tokio::test]
    async fn persistent_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 3);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, None).await.unwrap_err();

        assert!(
            matches!(err, TallyError::RetriesExhausted { attempts: 3, .. }),
            "got: {err}"
        );
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn request_timeout_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page(json!([]), None))
                    .set_delay(Duration::from_secs(3)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!(["late"]), None)))
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 2);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let pages = collect(&client, &spec, None).await.unwrap();
        assert_eq!(pages[0].data, vec![json!("late")]);
        assert_eq!(sleeper.delays().len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"nope\": true}"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 4);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, None).await.unwrap_err();
        assert!(matches!(
            err,
            TallyError::Fetch {
                source: FetchError::Decode { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn resumes_from_supplied_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1]), Some("p2"))))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([2]), None)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let pages = collect(&client, &spec, Some("p2".into())).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].data, vec![json!(2)]);
    }

    #[tokio::test]
    async fn consumer_can_stop_after_first_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1]), Some("p2"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([2]), None)))
            .expect(0)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let mut pages = client.fetch_all::<Value>(&spec, day()).unwrap();
        let first = pages.try_next().await.unwrap().unwrap();
        assert_eq!(first.data, vec![json!(1)]);
        drop(pages);
    }

    #[tokio::test]
    async fn cursor_that_does_not_advance_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "same"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([]), Some("same"))))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, Some("same".into())).await.unwrap_err();
        assert!(err.to_string().contains("did not advance"), "got: {err}");
    }

    #[tokio::test]
    async fn cursor_cycle_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1]), Some("a"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([2]), Some("b"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([3]), Some("a"))))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let err = collect(&client, &spec, None).await.unwrap_err();
        assert!(err.to_string().contains("did not advance"), "got: {err}");
        assert_eq!(err.resume_cursor(), Some("b"));
    }

    #[tokio::test]
    async fn later_page_is_retried_with_its_own_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([1]), Some("p2"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COST))
            .and(query_param("page", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(json!([2]), None)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, 3);
        let spec = EndpointSpec::cost_report(vec![], 31);
        let pages = collect(&client, &spec, None).await.unwrap();

        let items: Vec<Value> = pages.into_iter().flat_map(|p| p.data).collect();
        assert_eq!(items, vec![json!(1), json!(2)]);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(100)]);

        let cursors: Vec<Option<String>> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "page")
                    .map(|(_, v)| v.into_owned())
            })
            .collect();
        assert_eq!(cursors, vec![None, Some("p2".into()), Some("p2".into())]);
    }

    #[tokio::test]
    async fn invalid_window_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, 1);
        let spec = EndpointSpec::claude_code(100);
        let range = DateRange::inclusive(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 3).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            client.fetch_all::<Value>(&spec, range),
            Err(TallyError::Config(_))
        ));
    }

    #[test]
    fn retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn status_classification() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, None, String::new()).is_retryable());
        assert!(status_error(StatusCode::BAD_GATEWAY, None, String::new()).is_retryable());
        assert!(
            status_error(StatusCode::from_u16(529).unwrap(), None, String::new()).is_retryable()
        );
        assert!(!status_error(StatusCode::FORBIDDEN, None, String::new()).is_retryable());
        assert!(!status_error(StatusCode::NOT_FOUND, None, String::new()).is_retryable());
    }

    #[test]
    fn debug_output_does_not_expose_the_key() {
        let config = AdminApiConfig::default();
        let client = FetchClient::new(
            &config,
            SecretString::from("sk-very-secret".to_string()),
            RetryPolicy::none(),
        )
        .unwrap();
        assert!(!format!("{client:?}").contains("sk-very-secret"));
    }
}
