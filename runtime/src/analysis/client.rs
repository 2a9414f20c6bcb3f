//! HTTP client for the summarization backend.

use super::clock::Clock;
use super::rate_limit::RateLimiter;
use super::response::{interpret_response, AnalysisRequest, AnalysisResult, ResponseBody};
use super::{AnalysisError, Analyzer};
use crate::config::AnalysisConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rate-limited client posting `{ policyText }` to the configured endpoint.
///
/// Clients built on the same [`RateLimiter`] share one minimum interval.
pub struct AnalysisClient {
    http: reqwest::Client,
    config: AnalysisConfig,
    limiter: Arc<RateLimiter>,
}

/// A limiter spaced by `config.min_interval_ms`, for sharing between clients.
pub fn shared_limiter(config: &AnalysisConfig, clock: Arc<dyn Clock>) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(clock, Duration::from_millis(config.min_interval_ms)))
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig, limiter: Arc<RateLimiter>) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AnalysisError::Generic(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.endpoint.trim().is_empty()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(origin) = &self.config.origin {
            if let Ok(val) = HeaderValue::from_str(origin) {
                headers.insert(ORIGIN, val);
            }
        }
        headers
    }
}

/// Serialize the request body, truncating text to the character and byte limits.
pub fn build_body(
    text: &str,
    max_chars: usize,
    max_bytes: usize,
) -> Result<Vec<u8>, AnalysisError> {
    let mut text = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };

    let overhead = encode(&AnalysisRequest { policy_text: "" })?.len();
    loop {
        let body = encode(&AnalysisRequest { policy_text: text })?;
        if body.len() <= max_bytes {
            return Ok(body);
        }
        if max_bytes <= overhead || text.is_empty() {
            return Err(AnalysisError::PayloadTooLarge {
                bytes: body.len(),
                max: max_bytes,
            });
        }
        // Escaping inflates text unevenly; shrink proportionally and re-check.
        let keep = text.len() * (max_bytes - overhead) / (body.len() - overhead);
        text = truncate_to_char_boundary(text, keep.min(text.len() - 1));
    }
}

fn encode(request: &AnalysisRequest<'_>) -> Result<Vec<u8>, AnalysisError> {
    serde_json::to_vec(request).map_err(|e| AnalysisError::Generic(e.to_string()))
}

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalysisError> {
        if !self.is_configured() {
            return Err(AnalysisError::NotConfigured);
        }

        let body = build_body(text, self.config.max_text_chars, self.config.max_body_bytes)?;
        debug!(bytes = body.len(), "prepared analysis request");

        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            info!("waited {}ms for analysis rate limit", waited.as_millis());
        }

        let response = self
            .http
            .post(&self.config.endpoint)
            .headers(self.headers())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = AnalysisError::classify(status.as_u16(), &text);
            warn!("analysis request failed: {err}");
            return Err(err);
        }

        match interpret_response(&text) {
            ResponseBody::Result(result) => Ok(result),
            ResponseBody::Failure(message) => {
                let err = AnalysisError::classify(status.as_u16(), &message);
                warn!("analysis backend reported failure: {err}");
                Err(err)
            }
        }
    }
}
