//! Policy summarization: the remote analysis client, its rate limiter and
//! the tolerant response parser.
//!
//! Text goes out, a fixed-shape summary comes back. The backend is a
//! language-model service and does not always honor the requested format, so
//! every response is normalized into [`AnalysisResult`] and classified into a
//! small [`ErrorKind`] taxonomy on failure.

pub mod client;
pub mod clock;
pub mod rate_limit;
pub mod response;

pub use client::{shared_limiter, AnalysisClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::RateLimiter;
pub use response::{parse_response, AnalysisResult, EXPECTED_SUMMARY_POINTS};

use async_trait::async_trait;

/// Coarse error class surfaced to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Unavailable,
    Generic,
}

/// Errors from the summarization backend.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("payload too large: {bytes} bytes (max {max})")]
    PayloadTooLarge { bytes: usize, max: usize },

    #[error("analysis endpoint not configured (set POLICYSCOPE_ANALYSIS_URL)")]
    NotConfigured,

    #[error("{0}")]
    Generic(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Generic,
        }
    }

    /// Classify a failed backend response by status code and body text.
    pub fn classify(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        let message = format!("HTTP {status}: {}", snippet(body));

        if status == 429
            || lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("quota")
        {
            return Self::RateLimited(message);
        }
        if matches!(status, 502..=504)
            || lower.contains("overloaded")
            || lower.contains("unavailable")
        {
            return Self::Unavailable(message);
        }
        Self::Generic(message)
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Generic(err.to_string())
        }
    }
}

/// Anything that turns policy text into an [`AnalysisResult`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalysisError>;
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
