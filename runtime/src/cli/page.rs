//! Loading the page a command starts from, over HTTP or in a browser.

use crate::acquisition::HttpClient;
use crate::config::ScoutConfig;
use crate::pipeline::PageSnapshot;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{ContextGuard, NavigateOptions, NoopRenderer, Renderer};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Add `https://` when the argument has no scheme.
pub fn normalize_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = url::Url::parse(&candidate).with_context(|| format!("invalid URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("unsupported URL scheme: {}", url.scheme());
    }
    Ok(url.to_string())
}

/// Launch Chromium, or fall back to HTTP-only mode when it is unavailable.
pub async fn launch_renderer(config: &ScoutConfig) -> Arc<dyn Renderer> {
    match ChromiumRenderer::new(config.user_agent.as_deref()).await {
        Ok(r) => Arc::new(r),
        Err(e) => {
            warn!("browser unavailable, continuing HTTP-only: {e:#}");
            Arc::new(NoopRenderer)
        }
    }
}

/// Load the starting page, rendered when `render` is set.
pub async fn load(
    url: &str,
    render: bool,
    config: &ScoutConfig,
    renderer: &dyn Renderer,
) -> Result<PageSnapshot> {
    if render {
        let mut guard = ContextGuard::open(renderer)
            .await
            .context("--render needs a browser")?;
        let loaded = async {
            let ctx = guard.context();
            let nav = ctx
                .navigate(url, NavigateOptions::new(config.resolver.render_timeout_ms))
                .await?;
            let html = ctx.get_html().await?;
            Ok::<_, anyhow::Error>(PageSnapshot {
                url: nav.final_url,
                html,
            })
        }
        .await;
        guard.close().await;
        let page = loaded?;
        info!(url = %page.url, bytes = page.html.len(), "rendered page");
        return Ok(page);
    }

    let http = HttpClient::new(config.resolver.fetch_timeout_ms, config.user_agent.as_deref());
    let resp = http
        .get(url, config.resolver.fetch_timeout_ms)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    if !resp.is_success() {
        bail!("{url} returned HTTP {}", resp.status);
    }
    info!(url = %resp.final_url, bytes = resp.body.len(), "fetched page");
    Ok(PageSnapshot {
        url: resp.final_url,
        html: resp.body,
    })
}
