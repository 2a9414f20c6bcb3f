//! Current-page classifier: is the active document itself a policy page?
//!
//! Four independent checks each add a fixed weight to a cumulative
//! confidence: URL match, title match, body-sample match and strong-phrase
//! match. URL and title are high-precision signals; body content is noisier
//! and weighs less, but can push a borderline page over the threshold.
//!
//! A positive classification does not guarantee usable text. Callers still
//! have to check the extracted length against the current-page threshold.

use crate::config::ClassifierWeights;
use crate::patterns::PatternLibrary;
use serde::{Deserialize, Serialize};

/// Outcome of classifying one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageClassification {
    pub is_policy_page: bool,
    /// Heuristic confidence in `[0, 100]`.
    pub confidence_score: u32,
    pub source_url: String,
    /// Names of the checks that fired, in evaluation order.
    pub signals: Vec<String>,
}

/// Inputs describing the document being classified.
#[derive(Debug, Clone, Copy)]
pub struct PageSignals<'a> {
    pub url: &'a str,
    pub title: &'a str,
    /// Leading visible text; only the first `sample_chars` are inspected.
    pub content: &'a str,
}

/// Classify a page from its URL, title and leading content.
pub fn classify_page(
    page: PageSignals<'_>,
    patterns: &PatternLibrary,
    weights: &ClassifierWeights,
) -> PageClassification {
    let sample = leading_chars(page.content, weights.sample_chars);

    let checks = [
        ("url", patterns.matches(page.url), weights.url_match),
        ("title", patterns.matches(page.title), weights.title_match),
        ("content", patterns.matches(sample), weights.content_match),
        ("strong_phrase", patterns.matches_strong(sample), weights.strong_phrase),
    ];

    let mut raw = 0u32;
    let mut signals = Vec::new();
    for (name, hit, weight) in checks {
        if hit {
            raw = raw.saturating_add(weight);
            signals.push(name.to_string());
        }
    }

    let confidence_score = raw.min(100);

    PageClassification {
        is_policy_page: confidence_score >= weights.threshold,
        confidence_score,
        source_url: page.url.to_string(),
        signals,
    }
}

fn leading_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
