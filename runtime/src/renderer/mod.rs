//! Renderer abstraction for headless, isolated page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide). A context is an
//! isolated background tab; it is never the user's tab and is never shared
//! across requests.

pub mod chromium;
pub mod fallback;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// When navigation counts as finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// The `load` event.
    #[default]
    Load,
    /// `DOMContentLoaded`; fastest, least complete.
    DomContentLoaded,
    /// Load, then wait for network activity to settle.
    NetworkIdle,
}

/// Options for a single navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait: WaitStrategy,
    pub timeout_ms: u64,
}

impl NavigateOptions {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            wait: WaitStrategy::Load,
            timeout_ms,
        }
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new isolated browser context (background tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL.
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Owns an open context and guarantees it is closed.
///
/// Call [`ContextGuard::close`] on every normal path. If the guard is dropped
/// instead (an early `?`, a panic unwinding, or the owning future being
/// cancelled) the context is closed on a spawned task.
pub struct ContextGuard {
    inner: Option<Box<dyn RenderContext>>,
}

impl ContextGuard {
    pub fn new(context: Box<dyn RenderContext>) -> Self {
        Self {
            inner: Some(context),
        }
    }

    /// Open a context from a renderer and wrap it.
    pub async fn open(renderer: &dyn Renderer) -> Result<Self> {
        Ok(Self::new(renderer.new_context().await?))
    }

    pub fn context(&mut self) -> &mut dyn RenderContext {
        // Only `close` and `drop` take the context out, and both consume the guard.
        match self.inner.as_mut() {
            Some(ctx) => ctx.as_mut(),
            None => unreachable!("context already closed"),
        }
    }

    /// Close the context now.
    pub async fn close(mut self) {
        if let Some(ctx) = self.inner.take() {
            if let Err(e) = ctx.close().await {
                warn!("failed to close browser context: {e:#}");
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(ctx) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("closing abandoned browser context");
                handle.spawn(async move {
                    let _ = ctx.close().await;
                });
            }
            Err(_) => warn!("browser context dropped outside a runtime; leaking it"),
        }
    }
}

/// A no-op renderer used when Chromium is unavailable.
///
/// HTTP-based strategies keep working; anything needing a browser context
/// fails fast with an error the resolver records as a failed attempt.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available, HTTP-only mode"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Append a marker query parameter so a background load is distinguishable
/// from the user's own visit to the same URL.
pub fn with_marker(url: &str, marker: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair(marker, "1");
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
