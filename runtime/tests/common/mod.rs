//! Shared test doubles: a scripted renderer and a canned analyzer.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use policyscope_runtime::analysis::{AnalysisError, AnalysisResult, Analyzer};
use policyscope_runtime::config::ScoutConfig;
use policyscope_runtime::renderer::{NavigateOptions, NavigationResult, RenderContext, Renderer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A long, policy-like HTML page.
pub fn policy_html(title: &str) -> String {
    let body = "We collect personal information you provide and share it with third parties \
                only as described here. You can request deletion of your data at any time. "
        .repeat(4);
    format!("<html><head><title>{title}</title></head><body><main><h1>{title}</h1><p>{body}</p></main></body></html>")
}

/// A client-side shell with almost no text.
pub fn shell_html() -> String {
    "<html><body><div id=\"root\">Loading...</div><script>boot()</script></body></html>".to_string()
}

/// Config with every delay zeroed and short timeouts.
pub fn fast_config() -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.fallback.initial_delay_ms = 0;
    config.fallback.retry_delay_ms = 0;
    config.resolver.fetch_timeout_ms = 3000;
    config.resolver.probe_timeout_ms = 1000;
    config.analysis.min_interval_ms = 0;
    config
}

/// Scripted browser: each `get_html` call pops the next page, repeating the last.
pub struct FakeRenderer {
    pages: Arc<Mutex<VecDeque<String>>>,
    fail_navigation: usize,
    open: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub navigations: Arc<Mutex<Vec<String>>>,
}

impl FakeRenderer {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages.into())),
            fail_navigation: 0,
            open: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the first `n` navigations.
    pub fn failing_navigations(mut self, n: usize) -> Self {
        self.fail_navigation = n;
        self
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            pages: Arc::clone(&self.pages),
            remaining_failures: self.fail_navigation,
            open: Arc::clone(&self.open),
            navigations: Arc::clone(&self.navigations),
            url: String::new(),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    pages: Arc<Mutex<VecDeque<String>>>,
    remaining_failures: usize,
    open: Arc<AtomicUsize>,
    navigations: Arc<Mutex<Vec<String>>>,
    url: String,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _options: NavigateOptions) -> Result<NavigationResult> {
        self.navigations.lock().unwrap().push(url.to_string());
        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            bail!("net::ERR_CONNECTION_RESET");
        }
        self.url = url.to_string();
        Ok(NavigationResult {
            final_url: url.to_string(),
            status: 200,
            load_time_ms: 1,
        })
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn get_html(&self) -> Result<String> {
        let mut pages = self.pages.lock().unwrap();
        let page = if pages.len() > 1 {
            pages.pop_front()
        } else {
            pages.front().cloned()
        };
        Ok(page.unwrap_or_default())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns a fixed result and counts calls.
pub struct CannedAnalyzer {
    points: usize,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl CannedAnalyzer {
    /// An analyzer returning `points` summary points.
    pub fn with_points(points: usize) -> Self {
        Self {
            points,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn complete() -> Self {
        Self::with_points(7)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for CannedAnalyzer {
    async fn analyze(&self, text: &str) -> std::result::Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        Ok(AnalysisResult {
            summary_points: (1..=self.points).map(|i| format!("point {i}")).collect(),
            risk_score: 4,
        })
    }
}

/// Always fails with the given error kind.
pub struct FailingAnalyzer(pub fn() -> AnalysisError);

#[async_trait]
impl Analyzer for FailingAnalyzer {
    async fn analyze(&self, _text: &str) -> std::result::Result<AnalysisResult, AnalysisError> {
        Err((self.0)())
    }
}
