//! The built-in discovery strategies, in default resolver order:
//!
//! 1. `standard`: score the page's anchors and fetch the best candidates.
//! 2. `enhanced`: render the page in a browser with per-site hints.
//! 3. `direct-guess`: probe conventional policy paths.
//! 4. `search`: site-restricted web search.
//! 5. `sitemap`: text-match policy URLs in the site's sitemaps.

use super::{AttemptLog, ResolveTarget, Strategy};
use crate::acquisition::{search, sitemap, HttpClient};
use crate::config::ScoutConfig;
use crate::discovery::extractor::extract_document_with;
use crate::discovery::link_scorer::{rank_document, select_links};
use crate::discovery::site_overrides::{SiteOverride, SiteOverrides};
use crate::discovery::ExtractedDocument;
use crate::error::{PipelineError, Result};
use crate::patterns::PatternLibrary;
use crate::renderer::fallback::DynamicContentFallback;
use crate::renderer::{ContextGuard, NavigateOptions, RenderContext, Renderer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Paths probed by the direct-guess strategy, in priority order.
const GUESS_PATHS: &[&str] = &["/privacy", "/privacy-policy", "/legal", "/terms"];

/// Clicks every element matching the given selectors. `__SELECTORS__` is
/// replaced with a JSON array.
const DISMISS_JS: &str = r#"(() => {
  let clicked = 0;
  for (const sel of __SELECTORS__) {
    try {
      document.querySelectorAll(sel).forEach((el) => {
        if (el instanceof HTMLElement) { el.click(); clicked++; }
      });
    } catch (e) {}
  }
  return clicked;
})()"#;

const SCROLL_JS: &str = r#"(() => {
  window.scrollTo(0, document.body ? document.body.scrollHeight : 0);
  return document.body ? document.body.scrollHeight : 0;
})()"#;

/// Shared dependencies of every strategy.
#[derive(Clone)]
pub struct DiscoveryEnv {
    pub config: Arc<ScoutConfig>,
    pub http: HttpClient,
    pub renderer: Arc<dyn Renderer>,
    pub patterns: Arc<PatternLibrary>,
    pub overrides: Arc<SiteOverrides>,
}

impl DiscoveryEnv {
    pub fn new(config: ScoutConfig, renderer: Arc<dyn Renderer>) -> Self {
        let http = HttpClient::new(config.resolver.fetch_timeout_ms, config.user_agent.as_deref());
        Self {
            config: Arc::new(config),
            http,
            renderer,
            patterns: Arc::new(PatternLibrary::global().clone()),
            overrides: Arc::new(SiteOverrides::embedded()),
        }
    }

    pub fn fallback(&self) -> DynamicContentFallback {
        DynamicContentFallback::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.patterns),
            &self.config,
        )
    }

    fn min_chars(&self) -> usize {
        self.config.adequacy.link_flow
    }

    /// GET a page and extract its text. Non-2xx statuses are navigation failures.
    pub async fn fetch_document(
        &self,
        url: &str,
        timeout_ms: u64,
        preferred: &[String],
    ) -> Result<ExtractedDocument> {
        let resp = self
            .http
            .get(url, timeout_ms)
            .await
            .map_err(|e| PipelineError::navigation(url, format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(PipelineError::navigation(url, format!("HTTP {}", resp.status)));
        }
        Ok(extract_document_with(&resp.body, &resp.final_url, preferred))
    }

    /// GET a page's raw body, failing on non-2xx.
    async fn fetch_body(&self, url: &str, timeout_ms: u64) -> Result<String> {
        let resp = self
            .http
            .get(url, timeout_ms)
            .await
            .map_err(|e| PipelineError::navigation(url, format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(PipelineError::navigation(url, format!("HTTP {}", resp.status)));
        }
        Ok(resp.body)
    }

    /// Fetch a candidate, handing known-dynamic hosts to the fallback when
    /// the plain fetch fails or comes back short.
    pub async fn fetch_candidate(
        &self,
        url: &str,
        log: &mut AttemptLog,
    ) -> Result<ExtractedDocument> {
        let fetched = self
            .fetch_document(url, self.config.resolver.fetch_timeout_ms, &[])
            .await;

        let fallback = self.fallback();
        if fallback.should_trigger(url, fetched.as_ref().ok()) {
            info!(url, "known dynamic host, rendering in background context");
            let outcome = fallback.recover(url).await;
            log.extend(outcome.attempts.iter().cloned());
            return outcome.into_result(url);
        }

        let document = fetched?;
        if document.is_adequate(self.min_chars()) {
            Ok(document)
        } else {
            Err(PipelineError::ContentTooShort {
                url: url.to_string(),
                chars: document.length_chars,
                required: self.min_chars(),
            })
        }
    }
}

/// `www.` + domain, unless the domain is an IP address or a bare hostname.
fn www_variant(domain: &str) -> Option<String> {
    if domain.parse::<std::net::IpAddr>().is_ok() || !domain.contains('.') {
        return None;
    }
    Some(format!("www.{domain}"))
}

/// `url`'s origin with the host replaced; scheme and port are kept.
fn origin_with_host(url: &url::Url, host: &str) -> Option<String> {
    let mut swapped = url.clone();
    swapped.set_host(Some(host)).ok()?;
    Some(swapped.origin().ascii_serialization())
}

/// Origins to probe on the target's scheme and port: the bare domain, then
/// its `www.` variant when it has one.
fn host_origins(target: &ResolveTarget) -> Vec<String> {
    let Ok(base) = url::Url::parse(&target.url) else {
        return vec![target.origin()];
    };
    std::iter::once(target.domain.clone())
        .chain(www_variant(&target.domain))
        .filter_map(|host| origin_with_host(&base, &host))
        .collect()
}

/// The default strategy chain.
pub fn default_strategies(env: &Arc<DiscoveryEnv>) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(StandardStrategy::new(Arc::clone(env))),
        Box::new(EnhancedStrategy::new(Arc::clone(env))),
        Box::new(DirectGuessStrategy::new(Arc::clone(env))),
        Box::new(SearchEngineStrategy::new(Arc::clone(env))),
        Box::new(SitemapStrategy::new(Arc::clone(env))),
    ]
}

/// Ranks the page's anchors and fetches the top candidates over HTTP.
pub struct StandardStrategy {
    env: Arc<DiscoveryEnv>,
}

impl StandardStrategy {
    pub fn new(env: Arc<DiscoveryEnv>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Strategy for StandardStrategy {
    fn name(&self) -> &str {
        "standard"
    }

    async fn discover(&self, target: &ResolveTarget, log: &mut AttemptLog) -> Result<ExtractedDocument> {
        let html = match &target.html {
            Some(html) => html.clone(),
            None => {
                self.env
                    .fetch_body(&target.url, self.env.config.resolver.fetch_timeout_ms)
                    .await?
            }
        };

        let ranking = rank_document(&html, &target.url, &self.env.patterns, &self.env.config.links);
        if ranking.is_empty() {
            return Err(PipelineError::NoCandidate(format!(
                "no policy-like links on {}",
                target.url
            )));
        }

        let mut last_err = None;
        for candidate in ranking
            .candidates
            .iter()
            .take(self.env.config.resolver.max_candidates.max(1))
        {
            debug!(url = %candidate.url, score = candidate.score, "trying candidate");
            match self.env.fetch_candidate(&candidate.url, log).await {
                Ok(doc) => return Ok(doc),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| PipelineError::NoCandidate(target.url.clone())))
    }
}

/// Renders the page with per-site hints: dismiss banners, scroll, then
/// follow override selectors or scored links inside the browser.
pub struct EnhancedStrategy {
    env: Arc<DiscoveryEnv>,
}

impl EnhancedStrategy {
    pub fn new(env: Arc<DiscoveryEnv>) -> Self {
        Self { env }
    }

    async fn settle(&self, hints: &SiteOverride) {
        if hints.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(hints.settle_ms)).await;
        }
    }

    async fn load(
        &self,
        ctx: &mut dyn RenderContext,
        url: &str,
        hints: &SiteOverride,
    ) -> Result<String> {
        let options =
            NavigateOptions::new(self.env.config.resolver.render_timeout_ms).with_wait(hints.wait);
        ctx.navigate(url, options)
            .await
            .map_err(|e| PipelineError::navigation(url, format!("{e:#}")))?;
        self.settle(hints).await;

        if !hints.dismiss_selectors.is_empty() {
            let selectors = serde_json::to_string(&hints.dismiss_selectors).unwrap_or_else(|_| "[]".into());
            match ctx.execute_js(&DISMISS_JS.replace("__SELECTORS__", &selectors)).await {
                Ok(clicked) => debug!(url, %clicked, "dismissed overlays"),
                Err(e) => debug!(url, "dismiss script failed: {e:#}"),
            }
        }
        if hints.scroll_to_bottom {
            if let Err(e) = ctx.execute_js(SCROLL_JS).await {
                debug!(url, "scroll script failed: {e:#}");
            }
            self.settle(hints).await;
        }

        ctx.get_html()
            .await
            .map_err(|e| PipelineError::navigation(url, format!("{e:#}")))
    }

    async fn run(&self, ctx: &mut dyn RenderContext, target: &ResolveTarget) -> Result<ExtractedDocument> {
        let hints = self.env.overrides.lookup_url(&target.url);
        let html = self.load(ctx, &target.url, &hints).await?;

        let mut urls = select_links(&html, &target.url, &hints.policy_link_selectors);
        let ranking = rank_document(&html, &target.url, &self.env.patterns, &self.env.config.links);
        for candidate in ranking.candidates {
            if !urls.contains(&candidate.url) {
                urls.push(candidate.url);
            }
        }
        if urls.is_empty() {
            return Err(PipelineError::NoCandidate(format!(
                "no policy links on rendered {}",
                target.url
            )));
        }

        let min_chars = self.env.min_chars();
        let mut last_err = None;
        for url in urls.iter().take(self.env.config.resolver.max_candidates.max(1)) {
            let hints = self.env.overrides.lookup_url(url);
            let html = match self.load(ctx, url, &hints).await {
                Ok(html) => html,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            let doc = extract_document_with(&html, url, &hints.content_selectors);
            if doc.is_adequate(min_chars) {
                return Ok(doc);
            }
            last_err = Some(PipelineError::ContentTooShort {
                url: url.clone(),
                chars: doc.length_chars,
                required: min_chars,
            });
        }
        Err(last_err.unwrap_or_else(|| PipelineError::NoCandidate(target.url.clone())))
    }
}

#[async_trait]
impl Strategy for EnhancedStrategy {
    fn name(&self) -> &str {
        "enhanced"
    }

    async fn discover(&self, target: &ResolveTarget, _log: &mut AttemptLog) -> Result<ExtractedDocument> {
        let mut guard = ContextGuard::open(self.env.renderer.as_ref())
            .await
            .map_err(|e| PipelineError::Browser(format!("{e:#}")))?;
        let result = self.run(guard.context(), target).await;
        guard.close().await;
        result
    }
}

/// Probes conventional policy paths on the bare and `www.` host.
pub struct DirectGuessStrategy {
    env: Arc<DiscoveryEnv>,
}

impl DirectGuessStrategy {
    pub fn new(env: Arc<DiscoveryEnv>) -> Self {
        Self { env }
    }

    /// Candidate URLs in probe order: each path on both hosts before the next path.
    pub fn guesses(target: &ResolveTarget) -> Vec<String> {
        let origins = host_origins(target);
        GUESS_PATHS
            .iter()
            .flat_map(|path| origins.iter().map(move |origin| format!("{origin}{path}")))
            .collect()
    }
}

#[async_trait]
impl Strategy for DirectGuessStrategy {
    fn name(&self) -> &str {
        "direct-guess"
    }

    async fn discover(&self, target: &ResolveTarget, _log: &mut AttemptLog) -> Result<ExtractedDocument> {
        let probe = self.env.http.clone().without_retries();
        let timeout = self.env.config.resolver.probe_timeout_ms;
        let min_chars = self.env.min_chars();

        for url in Self::guesses(target) {
            let resp = match probe.get(&url, timeout).await {
                Ok(resp) if resp.is_success() => resp,
                Ok(resp) => {
                    debug!(%url, status = resp.status, "probe miss");
                    continue;
                }
                Err(e) => {
                    debug!(%url, "probe failed: {e:#}");
                    continue;
                }
            };
            let doc = extract_document_with(&resp.body, &resp.final_url, &[]);
            if doc.is_adequate(min_chars) {
                return Ok(doc);
            }
        }
        Err(PipelineError::NoCandidate(format!(
            "no conventional policy path on {}",
            target.domain
        )))
    }
}

/// Runs a site-restricted search and follows the first organic result.
pub struct SearchEngineStrategy {
    env: Arc<DiscoveryEnv>,
}

impl SearchEngineStrategy {
    pub fn new(env: Arc<DiscoveryEnv>) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Strategy for SearchEngineStrategy {
    fn name(&self) -> &str {
        "search"
    }

    async fn discover(&self, target: &ResolveTarget, log: &mut AttemptLog) -> Result<ExtractedDocument> {
        let endpoint = &self.env.config.resolver.search_url;
        let query = search::policy_query(&target.domain);
        let url = search::search_url(endpoint, &query)
            .ok_or_else(|| PipelineError::navigation(endpoint, "invalid search endpoint"))?;

        let resp = self
            .env
            .http
            .get(&url, self.env.config.resolver.fetch_timeout_ms)
            .await
            .map_err(|e| PipelineError::navigation(&url, format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(PipelineError::navigation(&url, format!("HTTP {}", resp.status)));
        }

        let first = search::parse_results(&resp.body, &resp.final_url)
            .into_iter()
            .find(|u| search::on_domain(u, &target.domain))
            .ok_or_else(|| {
                PipelineError::NoCandidate(format!("no search results for {}", target.domain))
            })?;

        info!(url = %first, "following first search result");
        self.env.fetch_candidate(&first, log).await
    }
}

/// `/sitemap.xml` and `/sitemap_index.xml` on the target's origin, then
/// `/sitemap.xml` on the bare and `www.` hosts. Duplicates are kept.
fn conventional_sitemaps(target: &ResolveTarget) -> Vec<String> {
    let origin = target.origin();
    [format!("{origin}/sitemap.xml"), format!("{origin}/sitemap_index.xml")]
        .into_iter()
        .chain(host_origins(target).into_iter().map(|o| format!("{o}/sitemap.xml")))
        .collect()
}

/// Text-matches policy-like URLs inside the site's sitemaps.
pub struct SitemapStrategy {
    env: Arc<DiscoveryEnv>,
}

impl SitemapStrategy {
    pub fn new(env: Arc<DiscoveryEnv>) -> Self {
        Self { env }
    }

    /// Sitemap locations: robots.txt hints first, then conventional paths.
    async fn locations(&self, target: &ResolveTarget) -> Vec<String> {
        let origin = target.origin();
        let timeout = self.env.config.resolver.probe_timeout_ms;
        let mut locations = Vec::new();

        if let Ok(robots) = self.env.fetch_body(&format!("{origin}/robots.txt"), timeout).await {
            locations.extend(sitemap::robots_sitemaps(&robots));
        }
        for loc in conventional_sitemaps(target) {
            if !locations.contains(&loc) {
                locations.push(loc);
            }
        }
        locations
    }

    /// Collect page URLs from all reachable sitemaps, following at most
    /// `max_nested_sitemaps` child sitemaps.
    async fn collect_urls(&self, target: &ResolveTarget) -> Vec<String> {
        let timeout = self.env.config.resolver.probe_timeout_ms;
        let mut queue: VecDeque<String> = self.locations(target).await.into();
        let mut seen: Vec<String> = Vec::new();
        let mut nested_budget = self.env.config.resolver.max_nested_sitemaps;
        let mut urls = Vec::new();

        while let Some(loc) = queue.pop_front() {
            if seen.contains(&loc) {
                continue;
            }
            seen.push(loc.clone());

            let Ok(body) = self.env.fetch_body(&loc, timeout).await else {
                continue;
            };
            match sitemap::parse_sitemap(&body) {
                Ok(parsed) if !parsed.entries.is_empty() || !parsed.nested.is_empty() => {
                    debug!(%loc, entries = parsed.entries.len(), nested = parsed.nested.len(), "parsed sitemap");
                    urls.extend(parsed.entries.into_iter().map(|e| e.url));
                    for child in parsed.nested {
                        if nested_budget == 0 {
                            break;
                        }
                        nested_budget -= 1;
                        queue.push_back(child);
                    }
                }
                _ => urls.extend(sitemap::scan_urls(&body)),
            }
        }
        urls
    }
}

#[async_trait]
impl Strategy for SitemapStrategy {
    fn name(&self) -> &str {
        "sitemap"
    }

    async fn discover(&self, target: &ResolveTarget, log: &mut AttemptLog) -> Result<ExtractedDocument> {
        let urls = self.collect_urls(target).await;
        let ranked = sitemap::policy_urls(&urls, &self.env.patterns);
        if ranked.is_empty() {
            return Err(PipelineError::NoCandidate(format!(
                "no policy URL in sitemaps of {}",
                target.domain
            )));
        }

        let mut last_err = None;
        for url in ranked.iter().take(self.env.config.resolver.max_candidates.max(1)) {
            match self.env.fetch_candidate(url, log).await {
                Ok(doc) => return Ok(doc),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| PipelineError::NoCandidate(target.domain.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> ResolveTarget {
        ResolveTarget::new(url, None).unwrap()
    }

    #[test]
    fn test_guess_order() {
        let guesses = DirectGuessStrategy::guesses(&target("https://www.acme.example/shop?x=1"));
        assert_eq!(guesses.len(), 8);
        assert_eq!(guesses[0], "https://acme.example/privacy");
        assert_eq!(guesses[1], "https://www.acme.example/privacy");
        assert_eq!(guesses[2], "https://acme.example/privacy-policy");
        assert_eq!(guesses[7], "https://www.acme.example/terms");
    }

    #[test]
    fn test_guesses_keep_scheme_and_port() {
        let guesses = DirectGuessStrategy::guesses(&target("http://127.0.0.1:36093/"));
        assert_eq!(guesses.len(), 4);
        assert_eq!(guesses[0], "http://127.0.0.1:36093/privacy");
        assert_eq!(guesses[3], "http://127.0.0.1:36093/terms");

        let guesses = DirectGuessStrategy::guesses(&target("http://shop.example:8080/cart"));
        assert_eq!(guesses[0], "http://shop.example:8080/privacy");
        assert_eq!(guesses[1], "http://www.shop.example:8080/privacy");
    }

    #[test]
    fn test_host_origins_swap_only_the_host() {
        assert_eq!(
            host_origins(&target("http://www.shop.example:8080/a")),
            vec!["http://shop.example:8080", "http://www.shop.example:8080"]
        );
        assert_eq!(host_origins(&target("http://localhost:3000/")), vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_www_sitemap_keeps_scheme_and_port() {
        let locations = conventional_sitemaps(&target("http://shop.example:8080/"));
        assert_eq!(
            locations,
            vec![
                "http://shop.example:8080/sitemap.xml",
                "http://shop.example:8080/sitemap_index.xml",
                "http://shop.example:8080/sitemap.xml",
                "http://www.shop.example:8080/sitemap.xml",
            ]
        );
    }

    #[test]
    fn test_no_www_variant_for_ip_hosts() {
        assert_eq!(DirectGuessStrategy::guesses(&target("https://127.0.0.1/")).len(), 4);
        assert_eq!(www_variant("localhost"), None);
        assert_eq!(www_variant("acme.example").as_deref(), Some("www.acme.example"));
    }

    #[test]
    fn test_dismiss_script_substitution() {
        let selectors = serde_json::to_string(&vec!["button[id*='accept']"]).unwrap();
        let js = DISMISS_JS.replace("__SELECTORS__", &selectors);
        assert!(js.contains(r#"for (const sel of ["button[id*='accept']"])"#));
    }
}
