//! Runtime configuration.
//!
//! Every tuning constant used by the discovery pipeline lives here. The
//! defaults were tuned against a fixed sample of sites; a different corpus may
//! need different values, so nothing downstream hard-codes them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Weights used by the current-page classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierWeights {
    pub url_match: u32,
    pub title_match: u32,
    pub content_match: u32,
    pub strong_phrase: u32,
    /// Minimum confidence for a page to count as a policy page.
    pub threshold: u32,
    /// Number of leading characters of visible text sampled for body checks.
    pub sample_chars: usize,
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            url_match: 40,
            title_match: 30,
            content_match: 20,
            strong_phrase: 20,
            threshold: 50,
            sample_chars: 1000,
        }
    }
}

/// Weights and bonuses used by the link candidate scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkWeights {
    pub url_match: i32,
    pub text_match: i32,
    pub title_match: i32,
    /// Bonus when the URL carries an explicit privacy-policy token.
    pub policy_token_bonus: i32,
    /// Bonus when the anchor text literally says "privacy policy".
    pub policy_text_bonus: i32,
    /// Penalty for URLs that mention terms but not privacy.
    pub terms_only_penalty: i32,
    /// Candidates at or above this score are kept as secondary candidates.
    pub relevance_floor: i32,
}

impl Default for LinkWeights {
    fn default() -> Self {
        Self {
            url_match: 10,
            text_match: 5,
            title_match: 3,
            policy_token_bonus: 15,
            policy_text_bonus: 10,
            terms_only_penalty: 5,
            relevance_floor: 10,
        }
    }
}

/// Minimum extracted lengths (in characters, exclusive).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdequacyThresholds {
    /// Link-based and fallback flows.
    pub link_flow: usize,
    /// Current-page flow, which needs more text before committing.
    pub current_page: usize,
}

impl Default for AdequacyThresholds {
    fn default() -> Self {
        Self {
            link_flow: 100,
            current_page: 200,
        }
    }
}

/// Dynamic-content fallback timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub initial_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
    pub navigation_timeout_ms: u64,
    /// Query marker appended to background-context URLs.
    pub marker_param: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            retry_delay_ms: 2000,
            max_attempts: 3,
            navigation_timeout_ms: 20_000,
            marker_param: "policyscope_bg".to_string(),
        }
    }
}

/// Timeouts and endpoints used by the resolver strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Timeout for ordinary page fetches.
    pub fetch_timeout_ms: u64,
    /// Short timeout for direct-guess probes.
    pub probe_timeout_ms: u64,
    /// Timeout for browser navigation in the enhanced strategy.
    pub render_timeout_ms: u64,
    /// How many ranked candidates the standard strategy tries.
    pub max_candidates: usize,
    /// Base URL of the HTML search endpoint (query appended as `q`).
    pub search_url: String,
    /// Upper bound on nested sitemaps followed from a sitemap index.
    pub max_nested_sitemaps: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 15_000,
            probe_timeout_ms: 8_000,
            render_timeout_ms: 30_000,
            max_candidates: 3,
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            max_nested_sitemaps: 3,
        }
    }
}

/// Summarization backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Endpoint receiving `POST {policyText}`. Empty means not configured.
    pub endpoint: String,
    /// Value sent as the `Origin` header (the backend restricts CORS to one origin).
    pub origin: Option<String>,
    pub min_interval_ms: u64,
    pub timeout_ms: u64,
    pub max_text_chars: usize,
    pub max_body_bytes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            origin: None,
            min_interval_ms: 4000,
            timeout_ms: 60_000,
            max_text_chars: 100_000,
            max_body_bytes: 500_000,
        }
    }
}

/// Top-level configuration for a scout run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub classifier: ClassifierWeights,
    pub links: LinkWeights,
    pub adequacy: AdequacyThresholds,
    pub fallback: FallbackConfig,
    pub resolver: ResolverConfig,
    pub analysis: AnalysisConfig,
    pub user_agent: Option<String>,
}

impl ScoutConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Resolve and load the active configuration, then apply env overrides.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("POLICYSCOPE_ANALYSIS_URL") {
            self.analysis.endpoint = url;
        }
        if let Ok(url) = std::env::var("POLICYSCOPE_SEARCH_URL") {
            self.resolver.search_url = url;
        }
        if let Ok(origin) = std::env::var("POLICYSCOPE_ORIGIN") {
            self.analysis.origin = Some(origin);
        }
    }
}

/// Resolve the config file path: explicit flag, then env, then `./policyscope.json`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var("POLICYSCOPE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from("policyscope.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}
