//! Per-site navigation hints for the enhanced discovery strategy.
//!
//! Maps a normalized hostname to selectors and wait hints. A host without an
//! entry gets `SiteOverride::default()`; callers never special-case absence.

use crate::renderer::WaitStrategy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

const OVERRIDES_JSON: &str = include_str!("site_overrides.json");

/// Navigation and selection hints for one site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteOverride {
    /// CSS selectors for anchors known to lead to the policy, tried before scoring.
    pub policy_link_selectors: Vec<String>,
    /// CSS selectors for the policy body, tried before the generic main selectors.
    pub content_selectors: Vec<String>,
    /// Cookie/consent buttons clicked after load.
    pub dismiss_selectors: Vec<String>,
    /// Scroll to the bottom to trigger lazy-loaded footers.
    pub scroll_to_bottom: bool,
    pub wait: WaitStrategy,
    /// Extra settle time after load and after each interaction.
    pub settle_ms: u64,
}

impl Default for SiteOverride {
    fn default() -> Self {
        Self {
            policy_link_selectors: Vec::new(),
            content_selectors: Vec::new(),
            dismiss_selectors: vec![
                "#onetrust-accept-btn-handler".to_string(),
                "button[id*='accept']".to_string(),
                "button[class*='accept']".to_string(),
                "[aria-label*='Accept']".to_string(),
            ],
            scroll_to_bottom: true,
            wait: WaitStrategy::Load,
            settle_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[allow(dead_code)]
    version: u32,
    sites: HashMap<String, SiteOverride>,
}

/// Lookup table from normalized hostname to override.
#[derive(Debug, Clone, Default)]
pub struct SiteOverrides {
    sites: HashMap<String, SiteOverride>,
}

impl SiteOverrides {
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: OverrideFile = serde_json::from_str(raw).context("invalid site overrides")?;
        let sites = file
            .sites
            .into_iter()
            .map(|(host, entry)| (normalize_host(&host), entry))
            .collect();
        Ok(Self { sites })
    }

    pub fn try_embedded() -> Result<Self> {
        Self::from_json(OVERRIDES_JSON)
    }

    /// The table compiled from the embedded `site_overrides.json`.
    pub fn embedded() -> Self {
        Self::try_embedded().unwrap_or_else(|e| panic!("embedded site_overrides.json: {e:#}"))
    }

    /// Override for a host, falling back to parent domains, then defaults.
    pub fn lookup(&self, host: &str) -> SiteOverride {
        let mut host = normalize_host(host);
        loop {
            if let Some(entry) = self.sites.get(&host) {
                return entry.clone();
            }
            match host.split_once('.') {
                Some((_, parent)) if parent.contains('.') => host = parent.to_string(),
                _ => return SiteOverride::default(),
            }
        }
    }

    /// Override for the host of a URL.
    pub fn lookup_url(&self, url: &str) -> SiteOverride {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.lookup(h)))
            .unwrap_or_default()
    }
}

/// Lowercase, strip a trailing dot and a leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_overrides_parse() {
        let table = SiteOverrides::embedded();
        let fb = table.lookup("www.facebook.com");
        assert!(!fb.policy_link_selectors.is_empty());
        assert_eq!(fb.wait, WaitStrategy::NetworkIdle);
    }

    #[test]
    fn test_subdomain_falls_back_to_parent() {
        let table = SiteOverrides::embedded();
        assert_eq!(table.lookup("m.facebook.com"), table.lookup("facebook.com"));
    }

    #[test]
    fn test_unknown_host_gets_defaults() {
        let table = SiteOverrides::embedded();
        assert_eq!(table.lookup("example.org"), SiteOverride::default());
        assert_eq!(table.lookup_url("not a url"), SiteOverride::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let table = SiteOverrides::from_json(
            r#"{"version":1,"sites":{"WWW.Example.COM":{"settle_ms":10}}}"#,
        )
        .unwrap();
        let entry = table.lookup("example.com");
        assert_eq!(entry.settle_ms, 10);
        assert!(entry.scroll_to_bottom);
        assert_eq!(entry.wait, WaitStrategy::Load);
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("WWW.Example.com."), "example.com");
        assert_eq!(normalize_host("shop.example.com"), "shop.example.com");
    }
}
