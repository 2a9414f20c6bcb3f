// Copyright 2026 Policyscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the discovery pipeline.

use crate::analysis::AnalysisError;
use crate::resolver::StrategyAttempt;

/// Result alias used throughout the discovery pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while discovering, extracting or analyzing a policy document.
///
/// Most variants are recovered locally (retry, fallback, next strategy). Only
/// `AllStrategiesExhausted` and the upstream variants reach the end user.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Timeouts, detached frames, network errors, non-success statuses.
    #[error("navigation failed for {url}: {reason}")]
    NavigationFailure { url: String, reason: String },

    /// Extraction succeeded but yielded too little text.
    #[error("content too short at {url}: {chars} chars (need more than {required})")]
    ContentTooShort {
        url: String,
        chars: usize,
        required: usize,
    },

    /// No candidate document could be found by a strategy.
    #[error("no policy candidate found: {0}")]
    NoCandidate(String),

    /// The known-dynamic page could not be rendered into usable text.
    #[error("dynamic content detected at {url}, manual navigation required")]
    DynamicContent { url: String },

    #[error("summarization backend is rate limiting requests: {0}")]
    UpstreamRateLimited(String),

    #[error("summarization backend is unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The analysis call failed for a non-retryable reason.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// The analysis returned, but not in the expected shape.
    #[error("analysis returned {points} summary points (expected {expected})")]
    IncompleteAnalysis { points: usize, expected: usize },

    /// Terminal failure, carrying every attempt for diagnostics.
    #[error("all {} discovery strategies failed", attempts.len())]
    AllStrategiesExhausted { attempts: Vec<StrategyAttempt> },

    #[error("browser unavailable: {0}")]
    Browser(String),
}

impl PipelineError {
    pub fn navigation(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::NavigationFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the whole request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited(_) | Self::UpstreamUnavailable(_)
        )
    }

    /// A short, actionable suggestion for the end user.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::UpstreamRateLimited(_) => "wait a minute and try again",
            Self::UpstreamUnavailable(_) => {
                "the summarization service is temporarily unavailable, try again later"
            }
            Self::DynamicContent { .. } => {
                "this site renders its policy client-side; open the policy page in a browser and re-run with its URL"
            }
            Self::Browser(_) => "install Chromium or set POLICYSCOPE_CHROMIUM_PATH, then retry with --render",
            _ => "navigate to the policy page directly and re-run with its URL",
        }
    }
}

impl From<AnalysisError> for PipelineError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::RateLimited(msg) => Self::UpstreamRateLimited(msg),
            AnalysisError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
            other => Self::Analysis(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_are_retryable() {
        let e: PipelineError = AnalysisError::RateLimited("429".into()).into();
        assert!(e.is_retryable());
        let e: PipelineError = AnalysisError::Unavailable("503".into()).into();
        assert!(e.is_retryable());
        let e: PipelineError = AnalysisError::Generic("boom".into()).into();
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_exhausted_has_hint() {
        let e = PipelineError::AllStrategiesExhausted { attempts: vec![] };
        assert!(e.hint().contains("policy page directly"));
        assert_eq!(e.to_string(), "all 0 discovery strategies failed");
    }
}
