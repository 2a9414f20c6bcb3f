//! Link candidate scorer: ranks outbound anchors by how likely they point to
//! a policy document.
//!
//! Each anchor gets three independent pattern checks (URL, visible text,
//! `title` attribute) plus bonuses for explicit "privacy policy" wording and
//! a penalty for terms-only URLs, which are a weaker proxy for the privacy
//! document the caller wants.
//!
//! Scoring is a pure function of anchor attributes. Ordering uses a stable
//! sort, so ties keep first-seen document order and identical input always
//! produces identical output.

use crate::config::LinkWeights;
use crate::patterns::PatternLibrary;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Schemes that never lead to a document.
const NON_NAVIGABLE_SCHEMES: &[&str] = &["mailto:", "tel:", "sms:", "javascript:", "data:"];

/// A raw anchor as found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Resolved absolute URL (or the raw href when it cannot be resolved).
    pub href: String,
    /// Visible text, whitespace-normalized.
    pub text: String,
    /// `title` attribute, whitespace-normalized.
    pub title: String,
}

/// A scored link suspected of pointing to a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCandidate {
    pub url: String,
    pub anchor_text: String,
    pub title_text: String,
    pub score: i32,
}

/// Ranked candidates for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRanking {
    /// All candidates, highest score first.
    pub candidates: Vec<PolicyCandidate>,
    /// Index boundary: candidates `[1..secondary_end)` cleared the relevance floor.
    secondary_end: usize,
}

impl CandidateRanking {
    pub fn primary(&self) -> Option<&PolicyCandidate> {
        self.candidates.first()
    }

    /// Other candidates above the relevance floor, for side-by-side analysis.
    pub fn secondary(&self) -> &[PolicyCandidate] {
        if self.secondary_end <= 1 {
            return &[];
        }
        &self.candidates[1..self.secondary_end]
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Collect every `<a href>` in the document, resolving relative URLs.
pub fn extract_anchors(html: &str, base_url: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = url::Url::parse(base_url).ok();

    document
        .select(&sel)
        .map(|el| {
            let raw = el.value().attr("href").unwrap_or("").trim();
            let href = match &base {
                Some(base) if !is_non_navigable(raw) => base
                    .join(raw)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| raw.to_string()),
                _ => raw.to_string(),
            };
            Anchor {
                href,
                text: collapse(&el.text().collect::<Vec<_>>().join(" ")),
                title: collapse(el.value().attr("title").unwrap_or("")),
            }
        })
        .collect()
}

/// Score one anchor. Returns `None` for rejected anchors (non-navigable
/// scheme, empty text) and for anchors with no policy signal at all.
pub fn score_anchor(
    anchor: &Anchor,
    patterns: &PatternLibrary,
    weights: &LinkWeights,
) -> Option<PolicyCandidate> {
    if anchor.href.is_empty() || is_non_navigable(&anchor.href) || anchor.text.trim().is_empty() {
        return None;
    }

    let url_hit = patterns.matches(&anchor.href);
    let text_hit = patterns.matches(&anchor.text);
    let title_hit = patterns.matches(&anchor.title);
    if !(url_hit || text_hit || title_hit) {
        return None;
    }

    let mut score = 0;
    if url_hit {
        score += weights.url_match;
    }
    if text_hit {
        score += weights.text_match;
    }
    if title_hit {
        score += weights.title_match;
    }

    let url_lower = anchor.href.to_lowercase();
    if patterns.has_policy_token(&url_lower) {
        score += weights.policy_token_bonus;
    }
    if anchor.text.to_lowercase().contains("privacy policy") {
        score += weights.policy_text_bonus;
    }
    if url_lower.contains("terms") && !url_lower.contains("privacy") {
        score -= weights.terms_only_penalty;
    }

    Some(PolicyCandidate {
        url: anchor.href.clone(),
        anchor_text: anchor.text.clone(),
        title_text: anchor.title.clone(),
        score,
    })
}

/// Score and rank a set of anchors.
pub fn rank_anchors(
    anchors: &[Anchor],
    patterns: &PatternLibrary,
    weights: &LinkWeights,
) -> CandidateRanking {
    let mut candidates: Vec<PolicyCandidate> = anchors
        .iter()
        .filter_map(|a| score_anchor(a, patterns, weights))
        .filter(|c| c.score > 0)
        .collect();

    // Stable: ties keep document order.
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    let secondary_end = candidates
        .iter()
        .take_while(|c| c.score >= weights.relevance_floor)
        .count();

    CandidateRanking {
        candidates,
        secondary_end,
    }
}

/// Extract, score and rank all anchors of an HTML document.
pub fn rank_document(
    html: &str,
    base_url: &str,
    patterns: &PatternLibrary,
    weights: &LinkWeights,
) -> CandidateRanking {
    rank_anchors(&extract_anchors(html, base_url), patterns, weights)
}

/// Resolved hrefs of anchors matching any of `selectors`, in selector order.
///
/// Used with per-site overrides that already know which anchor leads to the
/// policy. Duplicates and non-navigable hrefs are dropped.
pub fn select_links(html: &str, base_url: &str, selectors: &[String]) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(base_url).ok();
    let mut out: Vec<String> = Vec::new();

    for sel_str in selectors {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        for el in document.select(&sel) {
            let Some(raw) = el.value().attr("href").map(str::trim) else {
                continue;
            };
            if raw.is_empty() || is_non_navigable(raw) {
                continue;
            }
            let href = match &base {
                Some(base) => match base.join(raw) {
                    Ok(u) => u.to_string(),
                    Err(_) => continue,
                },
                None => raw.to_string(),
            };
            if !out.contains(&href) {
                out.push(href);
            }
        }
    }
    out
}

fn is_non_navigable(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    NON_NAVIGABLE_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(href: &str, text: &str, title: &str) -> Anchor {
        Anchor {
            href: href.to_string(),
            text: text.to_string(),
            title: title.to_string(),
        }
    }

    fn score(a: &Anchor) -> Option<i32> {
        score_anchor(a, &PatternLibrary::embedded(), &LinkWeights::default()).map(|c| c.score)
    }

    #[test]
    fn test_rejects_non_navigable_and_empty() {
        assert_eq!(score(&anchor("mailto:privacy@acme.example", "Privacy", "")), None);
        assert_eq!(score(&anchor("tel:+15555550100", "Privacy hotline", "")), None);
        assert_eq!(score(&anchor("javascript:void(0)", "Privacy", "")), None);
        assert_eq!(score(&anchor("https://acme.example/privacy", "   ", "")), None);
    }

    #[test]
    fn test_score_components() {
        // url 10 + text 5 + token 15 + literal text 10
        assert_eq!(
            score(&anchor("https://acme.example/privacy-policy", "Privacy Policy", "")),
            Some(40)
        );
        // url 10 + text 5 + title 3
        assert_eq!(
            score(&anchor("https://acme.example/privacy", "Privacy", "Privacy")),
            Some(18)
        );
        // url 10 + text 5 - terms penalty 5
        assert_eq!(
            score(&anchor("https://acme.example/terms", "Terms", "")),
            Some(10)
        );
        // text only
        assert_eq!(score(&anchor("https://acme.example/p/7", "Legal", "")), Some(5));
    }

    #[test]
    fn test_policy_url_beats_legal_url() {
        let texts = ["Read more", "Legal", "Privacy", "Privacy policy"];
        for text in texts {
            let policy = score(&anchor("https://a.example/privacy/policy", text, ""));
            let legal = score(&anchor("https://a.example/legal", text, ""));
            assert!(policy.unwrap_or(0) >= legal.unwrap_or(0), "{text}");
        }
    }

    #[test]
    fn test_ranking_is_stable_on_ties() {
        let anchors = vec![
            anchor("https://a.example/legal", "Legal", ""),
            anchor("https://a.example/gdpr", "GDPR", ""),
            anchor("https://a.example/privacy-policy", "Privacy Policy", ""),
        ];
        let ranking =
            rank_anchors(&anchors, &PatternLibrary::embedded(), &LinkWeights::default());
        let urls: Vec<_> = ranking.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.example/privacy-policy",
                "https://a.example/legal",
                "https://a.example/gdpr",
            ]
        );
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let html = r#"<html><body>
            <a href="/terms">Terms</a>
            <a href="/privacy">Privacy</a>
            <a href="/legal">Legal</a>
            <a href="/cookies" title="Cookie policy">Cookies</a>
        </body></html>"#;
        let lib = PatternLibrary::embedded();
        let weights = LinkWeights::default();
        let first = rank_document(html, "https://a.example/", &lib, &weights);
        for _ in 0..10 {
            let again = rank_document(html, "https://a.example/", &lib, &weights);
            assert_eq!(again.candidates, first.candidates);
        }
    }

    #[test]
    fn test_secondary_candidates_respect_floor() {
        let anchors = vec![
            anchor("https://a.example/privacy-policy", "Privacy Policy", ""),
            anchor("https://a.example/terms-of-service", "Terms of Service", ""),
            anchor("https://a.example/about", "Legal notice", ""),
        ];
        let ranking =
            rank_anchors(&anchors, &PatternLibrary::embedded(), &LinkWeights::default());
        assert_eq!(ranking.candidates.len(), 3);
        assert_eq!(
            ranking.primary().unwrap().url,
            "https://a.example/privacy-policy"
        );
        // terms-of-service: 10 + 5 - 5 = 10 clears the floor; "Legal notice" (5) does not.
        assert_eq!(ranking.secondary().len(), 1);
        assert_eq!(
            ranking.secondary()[0].url,
            "https://a.example/terms-of-service"
        );
    }

    #[test]
    fn test_select_links_uses_selector_order() {
        let html = r#"<footer>
            <a class="x" href="/about">About</a>
            <a href="/policies/privacy">Privacy</a>
            <a class="x" href="mailto:a@b.c">Mail</a>
        </footer>"#;
        let selectors = vec![
            "a[href*='/policies/']".to_string(),
            "a.x".to_string(),
            "a[".to_string(),
        ];
        let links = select_links(html, "https://a.example/", &selectors);
        assert_eq!(
            links,
            vec!["https://a.example/policies/privacy", "https://a.example/about"]
        );
    }

    #[test]
    fn test_relative_urls_are_resolved() {
        let html = r#"<a href="/privacy">Privacy</a><a href="mailto:x@y.z">Mail</a>"#;
        let anchors = extract_anchors(html, "https://a.example/shop/item");
        assert_eq!(anchors[0].href, "https://a.example/privacy");
        assert_eq!(anchors[1].href, "mailto:x@y.z");
    }
}
