//! Multi-strategy resolver: an ordered chain of independent discovery
//! strategies, stopping at the first that yields a usable analysis.
//!
//! A strategy only counts as successful when its document is long enough
//! and the analysis of that document is complete. Discovery and analysis are
//! deliberately coupled here: a page that looks like a policy but summarizes
//! to the wrong shape is treated as a miss and the next strategy runs.

pub mod strategies;

use crate::analysis::{AnalysisResult, Analyzer, EXPECTED_SUMMARY_POINTS};
use crate::discovery::site_overrides::normalize_host;
use crate::discovery::ExtractedDocument;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One recorded attempt. Immutable once pushed into an [`AttemptLog`].
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy_name: String,
    pub succeeded: bool,
    pub result_document: Option<ExtractedDocument>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StrategyAttempt {
    pub fn success(name: &str, document: ExtractedDocument, started: Instant) -> Self {
        Self::build(name, true, Some(document), None, started)
    }

    pub fn failure(name: &str, error: impl std::fmt::Display, started: Instant) -> Self {
        Self::build(name, false, None, Some(error.to_string()), started)
    }

    fn build(
        name: &str,
        succeeded: bool,
        result_document: Option<ExtractedDocument>,
        error: Option<String>,
        started: Instant,
    ) -> Self {
        let elapsed = started.elapsed();
        Self {
            strategy_name: name.to_string(),
            succeeded,
            result_document,
            error,
            started_at: Utc::now()
                - chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero()),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Append-only record of attempts for one resolution.
#[derive(Debug, Default)]
pub struct AttemptLog {
    entries: Vec<StrategyAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: StrategyAttempt) {
        debug!(
            strategy = %attempt.strategy_name,
            succeeded = attempt.succeeded,
            "attempt recorded"
        );
        self.entries.push(attempt);
    }

    pub fn extend(&mut self, attempts: impl IntoIterator<Item = StrategyAttempt>) {
        for attempt in attempts {
            self.record(attempt);
        }
    }

    pub fn entries(&self) -> &[StrategyAttempt] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<StrategyAttempt> {
        self.entries
    }
}

/// The page a resolution starts from.
#[derive(Debug, Clone)]
pub struct ResolveTarget {
    pub url: String,
    /// Hostname with `www.` stripped.
    pub domain: String,
    /// Already-loaded HTML of the page, when the caller has it.
    pub html: Option<String>,
}

impl ResolveTarget {
    pub fn new(url: &str, html: Option<String>) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| PipelineError::navigation(url, e))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| PipelineError::navigation(url, "URL has no host"))?;
        Ok(Self {
            url: url.to_string(),
            domain: normalize_host(host),
            html,
        })
    }

    /// Scheme and authority of the target, e.g. `https://acme.example`.
    pub fn origin(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| format!("https://{}", self.domain))
    }
}

/// One way of locating a policy document.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Locate and extract a candidate document.
    ///
    /// Sub-attempts (such as dynamic-content retries) go into `log`; the
    /// resolver records the strategy-level attempt itself.
    async fn discover(&self, target: &ResolveTarget, log: &mut AttemptLog)
        -> Result<ExtractedDocument>;
}

/// A successful resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub document: ExtractedDocument,
    pub analysis: AnalysisResult,
    pub strategy_used: String,
    pub attempts: Vec<StrategyAttempt>,
}

/// Runs strategies in order until one produces a complete analysis.
pub struct MultiStrategyResolver {
    strategies: Vec<Box<dyn Strategy>>,
    analyzer: Arc<dyn Analyzer>,
    min_chars: usize,
}

impl MultiStrategyResolver {
    pub fn new(
        strategies: Vec<Box<dyn Strategy>>,
        analyzer: Arc<dyn Analyzer>,
        min_chars: usize,
    ) -> Self {
        Self {
            strategies,
            analyzer,
            min_chars,
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order. Later strategies never run once one succeeds.
    ///
    /// Upstream rate-limit and availability errors stop the chain: retrying
    /// another strategy would only hit the same backend again.
    pub async fn resolve(&self, target: &ResolveTarget) -> Result<Resolution> {
        let mut log = AttemptLog::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            info!(strategy = name, url = %target.url, "trying strategy");
            let started = Instant::now();

            match self.attempt(strategy.as_ref(), target, &mut log).await {
                Ok((document, analysis)) => {
                    info!(
                        strategy = name,
                        chars = document.length_chars,
                        "strategy succeeded"
                    );
                    log.record(StrategyAttempt::success(name, document.clone(), started));
                    return Ok(Resolution {
                        document,
                        analysis,
                        strategy_used: name.to_string(),
                        attempts: log.into_entries(),
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(strategy = name, "stopping: {e}");
                    return Err(e);
                }
                Err(e) => {
                    info!(strategy = name, "strategy failed: {e}");
                    log.record(StrategyAttempt::failure(name, &e, started));
                }
            }
        }

        Err(PipelineError::AllStrategiesExhausted {
            attempts: log.into_entries(),
        })
    }

    async fn attempt(
        &self,
        strategy: &dyn Strategy,
        target: &ResolveTarget,
        log: &mut AttemptLog,
    ) -> Result<(ExtractedDocument, AnalysisResult)> {
        let document = strategy.discover(target, log).await?;
        if !document.is_adequate(self.min_chars) {
            return Err(PipelineError::ContentTooShort {
                url: document.origin_url,
                chars: document.length_chars,
                required: self.min_chars,
            });
        }

        let analysis = self.analyzer.analyze(&document.text).await?;
        if !analysis.is_complete() {
            return Err(PipelineError::IncompleteAnalysis {
                points: analysis.summary_points.len(),
                expected: EXPECTED_SUMMARY_POINTS,
            });
        }
        Ok((document, analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_domain() {
        let t = ResolveTarget::new("https://www.Acme.example/shop?x=1", None).unwrap();
        assert_eq!(t.domain, "acme.example");
        assert_eq!(t.origin(), "https://www.acme.example");
        assert!(ResolveTarget::new("not a url", None).is_err());
        assert!(ResolveTarget::new("data:text/plain,hi", None).is_err());
    }

    #[test]
    fn test_attempt_log_is_append_only() {
        let mut log = AttemptLog::new();
        let t = Instant::now();
        log.record(StrategyAttempt::failure("a", "nope", t));
        log.record(StrategyAttempt::success(
            "b",
            ExtractedDocument::new("text", "https://a.example/"),
            t,
        ));
        assert_eq!(log.len(), 2);
        assert!(!log.entries()[0].succeeded);
        assert_eq!(log.entries()[0].error.as_deref(), Some("nope"));
        assert!(log.entries()[1].result_document.is_some());
    }
}
