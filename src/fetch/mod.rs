//! Fetch engine
//!
//! One [`FetchClient`] owns the outbound connection pool and the retry/batch
//! policy. It offers four levels of fetch:
//!
//! - [`FetchClient::fetch_page`]: one GET, classified into transient or client failure
//! - [`FetchClient::fetch_with_retry`]: the same under bounded exponential backoff
//! - [`FetchClient::fetch_paginated`]: walk `limit`/`offset` pages of an endpoint,
//!   returning whatever was collected when a page fails
//! - [`FetchClient::fetch_concurrent`]: batched concurrent fetches with a fixed
//!   pause between batches and one result per request

use std::error::Error as StdError;
use std::fmt::Display;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ApiConfig, BatchConfig, Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;

/// Envelope key wrapping every upstream response
pub const ENVELOPE: &str = "MRData";

/// Query parameters whose values never reach logs or error messages
const SECRET_PARAMS: &[&str] = &["key", "api_key", "apikey", "token"];

/// Replacement for a secret query value
const REDACTED: &str = "REDACTED";

/// HTTP client bound to one API base URL
#[derive(Clone, Debug)]
pub struct FetchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
    batch: BatchConfig,
}

/// One page of a paginated endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// Offset this page was requested at
    pub offset: usize,
    /// Total item count advertised by the server
    pub total: usize,
    /// Items of the endpoint's list on this page
    pub items: Vec<Value>,
}

/// Everything a pagination walk collected
#[derive(Debug, Default)]
pub struct Paginated {
    /// Items in page order
    pub items: Vec<Value>,
    /// Total advertised by the first page, if any page arrived
    pub total: Option<usize>,
    /// The failure that ended the walk early, if any
    pub failure: Option<Error>,
}

impl Paginated {
    /// True when the walk ended without a failure
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

impl FetchClient {
    /// Create a client for `api` with the default batch policy
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(api: &ApiConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(api.timeout)
            .user_agent(api.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            timeout: api.timeout,
            retry,
            batch: BatchConfig::default(),
        })
    }

    /// Create a client from the process configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(&config.api, config.retry.clone())?.with_batch(config.batch.clone()))
    }

    /// Replace the batch policy used by [`FetchClient::fetch_concurrent`]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Batch policy in effect
    pub fn batch(&self) -> &BatchConfig {
        &self.batch
    }

    /// `{base}/{path}`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `url` and parse the body as JSON
    ///
    /// # Errors
    /// - [`Error::TransientServer`] on HTTP 503 or a dropped/refused connection
    /// - [`Error::Client`] on any other non-2xx status, a timeout or a malformed body
    pub async fn fetch_page(&self, url: &str) -> Result<Value> {
        let body = self.fetch_text(url).await?;
        serde_json::from_str(&body).map_err(|e| Error::Client {
            url: redact_url(url),
            status: None,
            reason: format!("malformed JSON body: {e}"),
        })
    }

    /// GET `url` and return the body text, with the same failure classes as [`FetchClient::fetch_page`]
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let shown = redact_url(url);
        debug!(url = %shown, "GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(&shown, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(Error::TransientServer {
                url: shown,
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(Error::Client {
                url: shown,
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| self.classify(&shown, e))
    }

    /// [`FetchClient::fetch_page`] under the configured retry policy
    ///
    /// Only transient failures are retried. Once the attempts are exhausted the
    /// last transient error is returned to the caller.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Value> {
        with_retry(&self.retry, || self.fetch_page(url)).await
    }

    /// Lazy page sequence for `endpoint` (relative to the base URL, without `.json`)
    ///
    /// Ends after the advertised total has been fetched, after an empty page, or
    /// right after yielding the first error. The stream cannot be restarted.
    pub fn pages<'a>(
        &'a self,
        endpoint: &'a str,
        page_size: usize,
    ) -> impl Stream<Item = Result<Page>> + 'a {
        stream::unfold(PageCursor::default(), move |cursor| async move {
            if cursor.done {
                return None;
            }
            if let Some(total) = cursor.total {
                if cursor.offset >= total {
                    return None;
                }
            }
            if page_size == 0 {
                let err = Error::InvalidInput("page size must be positive".into());
                return Some((Err(err), cursor.finish()));
            }

            match self.fetch_one_page(endpoint, cursor.offset, page_size).await {
                Ok(page) => {
                    let next = PageCursor {
                        offset: cursor.offset + page_size,
                        total: cursor.total.or(Some(page.total)),
                        done: page.items.is_empty(),
                    };
                    Some((Ok(page), next))
                }
                Err(e) => Some((Err(e), cursor.finish())),
            }
        })
    }

    /// Collect every page of `endpoint`
    ///
    /// Never fails: a page failure is logged and returned in
    /// [`Paginated::failure`] next to the items collected before it.
    pub async fn fetch_paginated(&self, endpoint: &str, page_size: usize) -> Paginated {
        let mut result = Paginated::default();
        let mut pages = std::pin::pin!(self.pages(endpoint, page_size));

        while let Some(page) = pages.next().await {
            match page {
                Ok(page) => {
                    result.total.get_or_insert(page.total);
                    result.items.extend(page.items);
                    debug!(
                        endpoint = %endpoint,
                        fetched = result.items.len(),
                        total = page.total,
                        "Page fetched"
                    );
                }
                Err(e) => {
                    error!(
                        endpoint = %endpoint,
                        offset = result.items.len(),
                        error = %e,
                        "Pagination stopped early, keeping partial results"
                    );
                    result.failure = Some(e);
                    break;
                }
            }
        }

        info!(
            endpoint = %endpoint,
            items = result.items.len(),
            total = ?result.total,
            "Pagination finished"
        );
        result
    }

    /// Fetch every `(key, url)` pair in batches of `concurrency_limit`
    ///
    /// Requests inside a batch run concurrently; the next batch starts only after
    /// the previous one completed and the inter-batch delay elapsed. Every request
    /// yields exactly one `(key, result)`, in submission order.
    pub async fn fetch_concurrent<K: Display>(
        &self,
        requests: Vec<(K, String)>,
        concurrency_limit: usize,
    ) -> Vec<(K, Result<Value>)> {
        let limit = concurrency_limit.max(1);
        let batches = requests.len().div_ceil(limit);
        let mut results = Vec::with_capacity(requests.len());
        let mut pending = requests.into_iter().peekable();
        let mut batch_no = 0;

        while pending.peek().is_some() {
            let batch: Vec<(K, String)> = pending.by_ref().take(limit).collect();
            batch_no += 1;
            debug!(batch = batch_no, of = batches, size = batch.len(), "Issuing batch");

            let fetched = join_all(batch.into_iter().map(|(key, url)| async move {
                let result = self.fetch_with_retry(&url).await;
                if let Err(e) = &result {
                    warn!(key = %key, url = %redact_url(&url), kind = e.code(), error = %e, "Request failed");
                }
                (key, result)
            }))
            .await;
            results.extend(fetched);

            if pending.peek().is_some() && !self.batch.inter_batch_delay.is_zero() {
                info!(
                    batch = batch_no,
                    of = batches,
                    delay_ms = self.batch.inter_batch_delay.as_millis(),
                    "Batch complete, pausing"
                );
                tokio::time::sleep(self.batch.inter_batch_delay).await;
            }
        }

        results
    }

    async fn fetch_one_page(&self, endpoint: &str, offset: usize, limit: usize) -> Result<Page> {
        let url = self.page_url(endpoint, offset, limit)?;
        let body = self.fetch_with_retry(url.as_str()).await?;
        let (table, list) = table_keys(endpoint)?;

        let total = parse_count(json_at(&body, &[ENVELOPE, "total"], url.as_str())?)
            .ok_or_else(|| Error::schema(url.as_str(), "total"))?;
        let items = match json_at(&body, &[ENVELOPE, table, list], url.as_str())? {
            Value::Array(items) => items.clone(),
            _ => return Err(Error::schema(url.as_str(), list)),
        };

        Ok(Page {
            offset,
            total,
            items,
        })
    }

    fn page_url(&self, endpoint: &str, offset: usize, limit: usize) -> Result<Url> {
        let raw = format!("{}.json", self.url(endpoint));
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::InvalidInput(format!("invalid endpoint URL '{raw}': {e}")))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    /// `url` must already be redacted; the reqwest error's own copy is stripped
    fn classify(&self, url: &str, e: reqwest::Error) -> Error {
        let e = e.without_url();
        if e.is_timeout() {
            Error::Client {
                url: url.to_string(),
                status: None,
                reason: format!("timed out after {}s", self.timeout.as_secs_f64()),
            }
        } else if e.is_connect() || is_connection_drop(&e) {
            Error::TransientServer {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            Error::Client {
                url: url.to_string(),
                status: e.status().map(|s| s.as_u16()),
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct PageCursor {
    offset: usize,
    total: Option<usize>,
    done: bool,
}

impl PageCursor {
    fn finish(self) -> Self {
        Self { done: true, ..self }
    }
}

/// `(table, list)` keys under the envelope for an endpoint path
///
/// The last path segment decides: `drivers` → `DriverTable/Drivers`, a season or
/// `results`/`qualifying` → `RaceTable/Races`, standings → `StandingsTable/StandingsLists`.
pub fn table_keys(endpoint: &str) -> Result<(&'static str, &'static str)> {
    let last = endpoint
        .trim_end_matches(".json")
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let keys = match last {
        "drivers" => ("DriverTable", "Drivers"),
        "circuits" => ("CircuitTable", "Circuits"),
        "constructors" => ("ConstructorTable", "Constructors"),
        "seasons" => ("SeasonTable", "Seasons"),
        "races" | "results" | "qualifying" | "current" => ("RaceTable", "Races"),
        "driverStandings" | "constructorStandings" => ("StandingsTable", "StandingsLists"),
        s if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => ("RaceTable", "Races"),
        _ => {
            return Err(Error::InvalidInput(format!(
                "no known table for endpoint '{endpoint}'"
            )));
        }
    };
    Ok(keys)
}

/// Walk `path` through nested objects
///
/// # Errors
/// [`Error::SchemaMismatch`] naming the first missing key
pub fn json_at<'v>(value: &'v Value, path: &[&str], context: &str) -> Result<&'v Value> {
    let mut current = value;
    for key in path {
        current = current
            .get(*key)
            .ok_or_else(|| Error::schema(context, *key))?;
    }
    Ok(current)
}

/// `url` with the values of credential query parameters replaced
///
/// Text that does not parse as a URL loses its whole query string.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.split('?').next().unwrap_or_default().to_string();
    };
    let has_secret = parsed
        .query_pairs()
        .any(|(name, _)| SECRET_PARAMS.contains(&&*name));
    if !has_secret {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(name, value)| {
            let value = if SECRET_PARAMS.contains(&&*name) {
                REDACTED.to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.into()
}

/// Counts arrive as strings (`"858"`) from the API
fn parse_count(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    }
}

/// Reset, aborted or half-closed connections surface as I/O errors somewhere in the source chain
fn is_connection_drop(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = e.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if err.to_string().contains("connection closed before message completed") {
            return true;
        }
        source = err.source();
    }
    false
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
