//! Plain page fetches for strategies that need no browser.
//!
//! Redirects are followed (up to five). Server errors and 429s are retried
//! under a [`RetryPolicy`]; transport errors other than timeouts are retried
//! too. Any other status is returned to the caller as-is.

use anyhow::Result;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/131.0.0.0 Safari/537.36";

/// A fetched page.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    /// URL after redirects; relative links resolve against this.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// When and how long to wait before retrying a request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Backoff before retry `n` is `base_backoff * 2^(n-1)`.
    pub base_backoff: Duration,
    /// Wait used for a 429 without a usable `Retry-After`.
    pub default_retry_after: Duration,
    /// Upper bound on any `Retry-After` we honor.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            default_retry_after: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// The wait before retry number `attempt` (1-based) after receiving
    /// `status`, or `None` if the response should be returned.
    pub fn wait_for_status(
        &self,
        status: u16,
        retry_after: Option<&str>,
        attempt: u32,
    ) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }
        if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            let wait = retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.default_retry_after);
            return Some(wait.min(self.max_retry_after));
        }
        (status >= 500).then(|| self.backoff(attempt))
    }

    /// The wait before retry number `attempt` after a transport error.
    pub fn wait_for_error(&self, timed_out: bool, attempt: u32) -> Option<Duration> {
        (!timed_out && attempt <= self.max_retries).then(|| self.backoff(attempt))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// GET client shared by the HTTP strategies. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only twin for servers that break on HTTP/2.
    h1_client: reqwest::Client,
    retry: RetryPolicy,
}

fn build_client(timeout_ms: u64, user_agent: &str, http1_only: bool) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(user_agent);
    if http1_only {
        builder = builder.http1_only();
    }
    builder.build().unwrap_or_default()
}

impl HttpClient {
    /// A client with a desktop Chrome user agent unless one is given.
    pub fn new(timeout_ms: u64, user_agent: Option<&str>) -> Self {
        let ua = user_agent.unwrap_or(DEFAULT_USER_AGENT);
        Self {
            client: build_client(timeout_ms, ua, false),
            h1_client: build_client(timeout_ms, ua, true),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Single-shot mode for probes.
    pub fn without_retries(mut self) -> Self {
        self.retry.max_retries = 0;
        self
    }

    /// GET `url`, retrying per the policy and falling back to HTTP/1.1 when
    /// the first client fails at the protocol level.
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        match self.fetch(&self.client, url, timeout_ms).await {
            Err(e) if is_protocol_error(&e) => {
                debug!(url, "retrying over HTTP/1.1: {e}");
                Ok(self.fetch(&self.h1_client, url, timeout_ms).await?)
            }
            other => Ok(other?),
        }
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout_ms: u64,
    ) -> std::result::Result<HttpResponse, reqwest::Error> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let sent = client
                .get(url)
                .timeout(Duration::from_millis(timeout_ms))
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => match self.retry.wait_for_error(e.is_timeout(), attempt) {
                    Some(wait) => {
                        debug!(url, attempt, "request failed, retrying in {}ms: {e}", wait.as_millis());
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    None => return Err(e),
                },
            };

            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            if let Some(wait) = self.retry.wait_for_status(status, retry_after, attempt) {
                debug!(url, status, attempt, "retrying in {}ms", wait.as_millis());
                tokio::time::sleep(wait).await;
                continue;
            }

            let final_url = response.url().to_string();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();

            return Ok(HttpResponse {
                url: url.to_string(),
                final_url,
                status,
                content_type,
                body,
            });
        }
    }
}

fn is_protocol_error(e: &reqwest::Error) -> bool {
    let message = format!("{e:?}").to_ascii_lowercase();
    ["http2", "protocol", "connection closed"]
        .iter()
        .any(|needle| message.contains(needle))
}
