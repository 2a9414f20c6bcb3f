//! Dynamic-content fallback: render a known client-side site in a
//! background context and poll until the policy text appears.
//!
//! Triggered only for hosts on the dynamic-domain list whose plain fetch
//! produced too little text. Each poll is recorded as its own attempt, and
//! the context is closed on every exit path.

use super::{with_marker, ContextGuard, NavigateOptions, RenderContext, Renderer};
use crate::config::{FallbackConfig, ScoutConfig};
use crate::discovery::{extract_document, ExtractedDocument};
use crate::error::PipelineError;
use crate::patterns::PatternLibrary;
use crate::resolver::StrategyAttempt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const ATTEMPT_NAME: &str = "dynamic-fallback";

/// Result of a fallback run.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub document: Option<ExtractedDocument>,
    /// One entry per poll, in order.
    pub attempts: Vec<StrategyAttempt>,
}

impl FallbackOutcome {
    pub fn into_result(self, url: &str) -> Result<ExtractedDocument, PipelineError> {
        self.document.ok_or_else(|| PipelineError::DynamicContent {
            url: url.to_string(),
        })
    }
}

/// Renders known-dynamic pages in an isolated, marked background context.
#[derive(Clone)]
pub struct DynamicContentFallback {
    renderer: Arc<dyn Renderer>,
    patterns: Arc<PatternLibrary>,
    config: FallbackConfig,
    min_chars: usize,
}

impl DynamicContentFallback {
    pub fn new(renderer: Arc<dyn Renderer>, patterns: Arc<PatternLibrary>, config: &ScoutConfig) -> Self {
        Self {
            renderer,
            patterns,
            config: config.fallback.clone(),
            min_chars: config.adequacy.link_flow,
        }
    }

    /// Whether `url` is on a host known to render its content client-side.
    pub fn is_known_dynamic(&self, url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.patterns.is_dynamic_host(h)))
            .unwrap_or(false)
    }

    /// Whether a plain extraction of `url` should be retried through the fallback.
    pub fn should_trigger(&self, url: &str, document: Option<&ExtractedDocument>) -> bool {
        let inadequate = document.map_or(true, |d| !d.is_adequate(self.min_chars));
        inadequate && self.is_known_dynamic(url)
    }

    /// Render `url` and poll for adequate text.
    ///
    /// Never returns an error: failures are reflected in the attempts and a
    /// missing document.
    pub async fn recover(&self, url: &str) -> FallbackOutcome {
        let mut attempts = Vec::new();
        let started = Instant::now();

        let mut guard = match ContextGuard::open(self.renderer.as_ref()).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!("dynamic fallback unavailable for {url}: {e:#}");
                attempts.push(StrategyAttempt::failure(
                    ATTEMPT_NAME,
                    PipelineError::Browser(e.to_string()),
                    started,
                ));
                return FallbackOutcome {
                    document: None,
                    attempts,
                };
            }
        };

        let marked = with_marker(url, &self.config.marker_param);
        let mut navigated = false;
        let mut document = None;
        let max_attempts = self.config.max_attempts.max(1);

        for n in 1..=max_attempts {
            if n > 1 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
            let started = Instant::now();
            let name = format!("{ATTEMPT_NAME}#{n}");

            match self.poll(guard.context(), &marked, url, &mut navigated).await {
                Ok(doc) if doc.is_adequate(self.min_chars) => {
                    info!(url, attempt = n, chars = doc.length_chars, "dynamic content recovered");
                    attempts.push(StrategyAttempt::success(&name, doc.clone(), started));
                    document = Some(doc);
                    break;
                }
                Ok(doc) => {
                    debug!(url, attempt = n, chars = doc.length_chars, "still too short");
                    let err = PipelineError::ContentTooShort {
                        url: url.to_string(),
                        chars: doc.length_chars,
                        required: self.min_chars,
                    };
                    attempts.push(StrategyAttempt::failure(&name, err, started));
                }
                Err(e) => {
                    debug!(url, attempt = n, "fallback attempt failed: {e}");
                    attempts.push(StrategyAttempt::failure(&name, e, started));
                }
            }
        }

        guard.close().await;
        FallbackOutcome { document, attempts }
    }

    /// One poll: navigate if not yet loaded, then read and extract the page.
    async fn poll(
        &self,
        ctx: &mut dyn RenderContext,
        marked: &str,
        origin_url: &str,
        navigated: &mut bool,
    ) -> Result<ExtractedDocument, PipelineError> {
        if !*navigated {
            ctx.navigate(marked, NavigateOptions::new(self.config.navigation_timeout_ms))
                .await
                .map_err(|e| PipelineError::navigation(origin_url, format!("{e:#}")))?;
            *navigated = true;
            tokio::time::sleep(Duration::from_millis(self.config.initial_delay_ms)).await;
        }

        let html = ctx
            .get_html()
            .await
            .map_err(|e| PipelineError::navigation(origin_url, format!("{e:#}")))?;
        Ok(extract_document(&html, origin_url))
    }
}
