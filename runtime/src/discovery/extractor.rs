//! Content extractor: turns an HTML document into clean, analyzable text.
//!
//! Structural and non-substantive regions (scripts, styles, navigation,
//! headers, footers, asides, ad/menu/sidebar containers) are skipped while
//! walking the DOM. When a main content region can be located through a
//! prioritized list of semantic selectors, only that region is used;
//! otherwise the whole `<body>`. The collected text is whitespace-normalized.
//!
//! Extraction is a pure transform over the parsed document. It performs no
//! network I/O and has no timeout. `scraper` types are `!Send`, so every entry
//! point takes and returns owned strings and never holds the parsed tree.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Elements whose whole subtree is dropped.
const DENYLIST_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "iframe",
    "svg", "canvas", "object", "button", "select",
];

/// ARIA landmark roles treated like their denylisted element counterparts.
const DENYLIST_ROLES: &[&str] = &[
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "menu",
    "menubar",
    "dialog",
];

/// Class/id hints for ad, menu and sidebar containers.
const NOISE_HINTS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "menu",
    "sidebar",
    "navbar",
    "breadcrumb",
    "cookie-banner",
    "cookie-consent",
    "share-buttons",
];

/// Main-region selectors, most specific intent first.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "[role=main]",
    "article",
    "#main-content",
    "#content",
    ".main-content",
    ".content",
    ".policy",
    ".privacy-policy",
    ".legal",
];

/// Elements after which a word boundary must be kept.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "body", "br", "dd", "div", "dl", "dt", "h1", "h2", "h3",
    "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table", "td", "th", "tr",
    "ul",
];

/// Text extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Whitespace-normalized, noise-free text.
    pub text: String,
    /// Length of `text` in characters.
    pub length_chars: usize,
    /// URL the text was extracted from.
    pub origin_url: String,
}

impl ExtractedDocument {
    /// Build a document from raw text, normalizing it.
    pub fn new(text: &str, origin_url: &str) -> Self {
        let text = normalize_whitespace(text);
        let length_chars = text.chars().count();
        Self {
            text,
            length_chars,
            origin_url: origin_url.to_string(),
        }
    }

    /// Adequate iff strictly longer than `min_chars`.
    pub fn is_adequate(&self, min_chars: usize) -> bool {
        self.length_chars > min_chars
    }

    /// The first `n` characters of the text.
    pub fn sample(&self, n: usize) -> &str {
        match self.text.char_indices().nth(n) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

/// Collapse every run of whitespace (including blank lines) to one space and trim.
///
/// Idempotent: `normalize_whitespace(normalize_whitespace(x)) == normalize_whitespace(x)`.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the main text of an HTML document.
pub fn extract_document(html: &str, origin_url: &str) -> ExtractedDocument {
    extract_document_with(html, origin_url, &[])
}

/// Like [`extract_document`], trying `preferred` selectors before the built-in ones.
///
/// Used with per-site overrides that know where a site keeps its policy body.
pub fn extract_document_with(
    html: &str,
    origin_url: &str,
    preferred: &[String],
) -> ExtractedDocument {
    let document = Html::parse_document(html);

    let preferred = preferred.iter().map(String::as_str);
    for sel_str in preferred.chain(MAIN_SELECTORS.iter().copied()) {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        for el in document.select(&sel) {
            if is_noise(&el) {
                continue;
            }
            let text = collect_text(el);
            if !text.trim().is_empty() {
                return ExtractedDocument::new(&text, origin_url);
            }
        }
    }

    let text = body(&document).map(collect_text).unwrap_or_default();
    ExtractedDocument::new(&text, origin_url)
}

/// Visible body text with noise removed, ignoring main-region selection.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = body(&document).map(collect_text).unwrap_or_default();
    normalize_whitespace(&text)
}

/// The document `<title>`, whitespace-normalized.
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&sel)
        .next()
        .map(|t| normalize_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default()
}

fn body(document: &Html) -> Option<ElementRef<'_>> {
    let sel = Selector::parse("body").ok()?;
    document.select(&sel).next()
}

/// Walk an element's subtree, skipping noise, keeping block boundaries.
fn collect_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    walk(root, &mut out);
    out
}

fn walk(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_noise(&child_el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&child_el.value().name());
                if block {
                    out.push(' ');
                }
                walk(child_el, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn is_noise(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if DENYLIST_TAGS.contains(&value.name()) {
        return true;
    }
    if let Some(role) = value.attr("role") {
        if DENYLIST_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    if value.attr("aria-hidden") == Some("true") || value.attr("hidden").is_some() {
        return true;
    }
    value.classes().any(is_noise_token) || value.id().is_some_and(is_noise_token)
}

/// Token-level hint match: `sidebar`, `left-sidebar`, `ad-slot` match;
/// `has-sidebar-layout`, `header-image`, `load` do not.
fn is_noise_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    NOISE_HINTS.iter().any(|hint| {
        token == *hint
            || token.starts_with(&format!("{hint}-"))
            || token.starts_with(&format!("{hint}_"))
            || token.ends_with(&format!("-{hint}"))
            || token.ends_with(&format!("_{hint}"))
    })
}
