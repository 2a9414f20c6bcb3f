//! Pattern library: weighted regular expressions describing policy-like text.
//!
//! Two ordered sets are kept. **Link patterns** recognize policy, privacy,
//! terms, legal and data-protection wording in URLs, anchor text and titles.
//! **Strong patterns** recognize phrasing that almost only appears inside a
//! policy body ("we collect ... information", "third-party sharing").
//!
//! The sets are broad-then-narrow: a generic `privacy` pattern sits next to
//! compound ones such as `privacy policy`, so specific hits can carry a higher
//! weight without losing general recall.
//!
//! Patterns are declared in `patterns.json`, embedded at compile time via
//! `include_str!`. A replacement file with the same schema can be supplied at
//! startup through `POLICYSCOPE_PATTERNS`. All matching is case-insensitive
//! and side-effect free.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, warn};

const PATTERNS_JSON: &str = include_str!("patterns.json");

/// On-disk form of a single pattern entry.
#[derive(Debug, Clone, Deserialize)]
struct PatternSpec {
    name: String,
    pattern: String,
    #[serde(default = "default_weight")]
    weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct LibrarySpec {
    version: u32,
    link_patterns: Vec<PatternSpec>,
    strong_patterns: Vec<PatternSpec>,
    policy_token: String,
    #[serde(default)]
    dynamic_domains: Vec<String>,
}

/// A compiled, named pattern with its weight.
#[derive(Debug, Clone)]
pub struct WeightedPattern {
    pub name: String,
    pub weight: u32,
    regex: Regex,
}

impl WeightedPattern {
    pub fn new(name: &str, pattern: &str, weight: u32) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid pattern '{name}': {pattern}"))?;
        Ok(Self {
            name: name.to_string(),
            weight,
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An ordered set of weighted patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<WeightedPattern>,
}

impl PatternSet {
    fn compile(specs: &[PatternSpec]) -> Result<Self> {
        let patterns = specs
            .iter()
            .map(|s| WeightedPattern::new(&s.name, &s.pattern, s.weight))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True when any pattern in the set matches.
    pub fn matches(&self, text: &str) -> bool {
        !text.is_empty() && self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Highest weight among matching patterns, if any matched.
    pub fn best_weight(&self, text: &str) -> Option<u32> {
        self.patterns
            .iter()
            .filter(|p| p.is_match(text))
            .map(|p| p.weight)
            .max()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// The full pattern library used by the classifier, scorer and resolver.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    pub version: u32,
    pub link: PatternSet,
    pub strong: PatternSet,
    policy_token: Regex,
    dynamic_domains: Vec<String>,
}

impl PatternLibrary {
    /// Compile a library from its JSON declaration.
    pub fn from_json(raw: &str) -> Result<Self> {
        let spec: LibrarySpec = serde_json::from_str(raw).context("invalid pattern library")?;
        let policy_token = RegexBuilder::new(&spec.policy_token)
            .case_insensitive(true)
            .build()
            .context("invalid policy_token pattern")?;
        Ok(Self {
            version: spec.version,
            link: PatternSet::compile(&spec.link_patterns)?,
            strong: PatternSet::compile(&spec.strong_patterns)?,
            policy_token,
            dynamic_domains: spec
                .dynamic_domains
                .into_iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
        })
    }

    /// The process-wide library, loaded once at first use.
    ///
    /// Uses the file named by `POLICYSCOPE_PATTERNS` when it exists and parses;
    /// otherwise the embedded declaration.
    pub fn global() -> &'static PatternLibrary {
        static LIBRARY: OnceLock<PatternLibrary> = OnceLock::new();
        LIBRARY.get_or_init(|| {
            if let Ok(path) = std::env::var("POLICYSCOPE_PATTERNS") {
                match std::fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|raw| Self::from_json(&raw))
                {
                    Ok(lib) => {
                        debug!("loaded pattern library v{} from {path}", lib.version);
                        return lib;
                    }
                    Err(e) => warn!("ignoring pattern file {path}: {e:#}"),
                }
            }
            Self::embedded()
        })
    }

    /// The library compiled from the embedded `patterns.json`.
    pub fn embedded() -> Self {
        // The embedded file is covered by tests; a parse failure is a build defect.
        Self::from_json(PATTERNS_JSON).unwrap_or_else(|e| panic!("embedded patterns.json: {e:#}"))
    }

    /// Link-indicative match (URLs, anchor text, titles, body samples).
    pub fn matches(&self, text: &str) -> bool {
        self.link.matches(text)
    }

    /// Strong in-body policy phrasing.
    pub fn matches_strong(&self, text: &str) -> bool {
        self.strong.matches(text)
    }

    /// Whether the text carries an unambiguous "privacy policy" token.
    pub fn has_policy_token(&self, text: &str) -> bool {
        self.policy_token.is_match(text)
    }

    /// Whether a host belongs to a site known to render content client-side.
    pub fn is_dynamic_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.dynamic_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}
