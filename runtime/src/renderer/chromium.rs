//! Headless Chromium backend.
//!
//! Each [`ChromiumRenderer`] owns its own browser process, launched for a
//! single top-level request. Contexts are background targets in that
//! process; nothing is pooled across requests.

use super::{NavigateOptions, NavigationResult, RenderContext, Renderer, WaitStrategy};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Quiet period after `load` for [`WaitStrategy::NetworkIdle`].
const NETWORK_IDLE_SETTLE_MS: u64 = 1500;

const SYSTEM_BINARIES: &[&str] = &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"];

/// Where a Chromium binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromiumSource {
    /// `POLICYSCOPE_CHROMIUM_PATH`.
    Env,
    /// A download under `~/.policyscope/chromium`.
    Managed,
    /// A browser on `PATH`.
    SystemPath,
    /// A well-known application bundle.
    Bundle,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChromiumLocation {
    pub path: PathBuf,
    pub source: ChromiumSource,
}

/// Binaries under a managed install root, most specific first.
fn managed_candidates(root: &Path) -> Vec<PathBuf> {
    let testing_app = "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
    if cfg!(target_os = "macos") {
        vec![
            root.join("chrome-mac-arm64").join(testing_app),
            root.join("chrome-mac-x64").join(testing_app),
            root.join("chrome"),
        ]
    } else {
        vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
    }
}

/// Find a Chromium binary: env override, managed install, `PATH`, then the
/// macOS application bundle.
pub fn locate_chromium() -> Option<ChromiumLocation> {
    let found = |path: PathBuf, source| Some(ChromiumLocation { path, source });

    if let Ok(raw) = std::env::var("POLICYSCOPE_CHROMIUM_PATH") {
        let path = PathBuf::from(raw);
        if path.exists() {
            return found(path, ChromiumSource::Env);
        }
        debug!(path = %path.display(), "POLICYSCOPE_CHROMIUM_PATH does not exist, searching");
    }

    if let Some(home) = dirs::home_dir() {
        let root = home.join(".policyscope").join("chromium");
        if let Some(path) = managed_candidates(&root).into_iter().find(|p| p.exists()) {
            return found(path, ChromiumSource::Managed);
        }
    }

    if let Some(path) = SYSTEM_BINARIES.iter().find_map(|name| which::which(name).ok()) {
        return found(path, ChromiumSource::SystemPath);
    }

    if cfg!(target_os = "macos") {
        let bundle = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if bundle.exists() {
            return found(bundle, ChromiumSource::Bundle);
        }
    }

    None
}

/// A browser process dedicated to one request.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
    open: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless, incognito Chromium.
    pub async fn new(user_agent: Option<&str>) -> Result<Self> {
        let location = locate_chromium()
            .context("Chromium not found. Set POLICYSCOPE_CHROMIUM_PATH or install Chrome.")?;
        info!(path = %location.path.display(), source = ?location.source, "launching Chromium");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&location.path)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-background-networking",
                "--mute-audio",
                "--incognito",
            ]);
        if let Some(ua) = user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // CDP events must be drained for the connection to make progress.
        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser: Mutex::new(browser),
            events,
            open: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .background(true)
            .build()
            .map_err(|e| anyhow!("invalid target params: {e}"))?;
        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .context("failed to open background tab")?;

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ChromiumContext {
            page,
            open: Arc::clone(&self.open),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.events.abort();
        closed.map(|_| ()).context("failed to close Chromium")
    }

    fn active_contexts(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// A background tab.
pub struct ChromiumContext {
    page: Page,
    open: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn load(&self, url: &str, wait: WaitStrategy) -> std::result::Result<(), chromiumoxide::error::CdpError> {
        self.page.goto(url).await?;
        match wait {
            WaitStrategy::DomContentLoaded => {}
            WaitStrategy::Load => {
                self.page.wait_for_navigation().await?;
            }
            WaitStrategy::NetworkIdle => {
                self.page.wait_for_navigation().await?;
                tokio::time::sleep(Duration::from_millis(NETWORK_IDLE_SETTLE_MS)).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<NavigationResult> {
        let started = Instant::now();
        match tokio::time::timeout(Duration::from_millis(options.timeout_ms), self.load(url, options.wait)).await {
            Err(_) => return Err(anyhow!("navigation timed out after {}ms", options.timeout_ms)),
            Ok(Err(e)) => return Err(anyhow!("navigation failed: {e}")),
            Ok(Ok(())) => {}
        }

        let final_url = self.get_url().await.unwrap_or_default();
        Ok(NavigationResult {
            final_url: if final_url.is_empty() { url.to_string() } else { final_url },
            // CDP page loads expose no response status here; a completed load counts as 200.
            status: 200,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.page
            .evaluate(script)
            .await
            .context("script evaluation failed")?
            .into_value()
            .map_err(|e| anyhow!("script returned a non-JSON value: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to read page HTML")
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("failed to read page URL")?
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.page.close().await.context("failed to close tab")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::extractor::extract_document;

    #[test]
    fn test_managed_candidates_end_with_generic_binary() {
        let root = PathBuf::from("/opt/ps/chromium");
        let candidates = managed_candidates(&root);
        assert!(candidates.len() >= 2);
        assert!(candidates.iter().all(|p| p.starts_with(&root)));
        assert_eq!(candidates.last(), Some(&root.join("chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_render_and_extract() {
        let renderer = ChromiumRenderer::new(None).await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        assert_eq!(renderer.active_contexts(), 1);

        ctx.navigate(
            "data:text/html,<main><h1>Privacy</h1><script>document.write('<p>We collect data</p>')</script></main>",
            NavigateOptions::new(10_000),
        )
        .await
        .unwrap();

        let html = ctx.get_html().await.unwrap();
        let doc = extract_document(&html, "data:");
        assert!(doc.text.contains("We collect data"));
        assert!(!doc.text.contains("document.write"));

        ctx.close().await.unwrap();
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.unwrap();
    }
}
