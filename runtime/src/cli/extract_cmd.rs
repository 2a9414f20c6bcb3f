//! `policyscope extract <url>`: print the main text of a page.

use crate::cli::output;
use crate::cli::page;
use crate::config::{AdequacyThresholds, ScoutConfig};
use crate::discovery::extractor::extract_document_with;
use crate::discovery::site_overrides::SiteOverrides;
use crate::discovery::ExtractedDocument;
use crate::renderer::{NoopRenderer, Renderer};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Whether a document is long enough for each flow that analyzes text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Adequacy {
    link_flow: bool,
    current_page: bool,
}

impl Adequacy {
    fn of(document: &ExtractedDocument, thresholds: &AdequacyThresholds) -> Self {
        Self {
            link_flow: document.is_adequate(thresholds.link_flow),
            current_page: document.is_adequate(thresholds.current_page),
        }
    }

    fn lines(&self, thresholds: &AdequacyThresholds) -> [String; 2] {
        let verdict = |ok: bool| if ok { "adequate" } else { "too short to analyze" };
        [
            format!("link flow (>{}): {}", thresholds.link_flow, verdict(self.link_flow)),
            format!("current page (>{}): {}", thresholds.current_page, verdict(self.current_page)),
        ]
    }
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    #[serde(flatten)]
    document: &'a ExtractedDocument,
    adequacy: Adequacy,
}

pub async fn run(url: &str, render: bool, config: &ScoutConfig) -> Result<()> {
    let url = page::normalize_url(url)?;
    let renderer: Arc<dyn Renderer> = if render {
        page::launch_renderer(config).await
    } else {
        Arc::new(NoopRenderer)
    };
    let snapshot = page::load(&url, render, config, renderer.as_ref()).await?;
    let _ = renderer.shutdown().await;

    let hints = SiteOverrides::embedded().lookup_url(&snapshot.url);
    let document = extract_document_with(&snapshot.html, &snapshot.url, &hints.content_selectors);
    let adequacy = Adequacy::of(&document, &config.adequacy);

    if output::is_json() {
        output::print_json(&ExtractOutput {
            document: &document,
            adequacy,
        });
    } else {
        println!("{}", document.text);
        if !output::is_quiet() {
            eprintln!("\n  {} chars from {}", document.length_chars, document.origin_url);
            for line in adequacy.lines(&config.adequacy) {
                eprintln!("  {line}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_flow_and_current_page_verdicts_differ() {
        let thresholds = AdequacyThresholds::default();
        let doc = ExtractedDocument::new(&"a".repeat(150), "https://a.example/privacy");
        let adequacy = Adequacy::of(&doc, &thresholds);
        assert_eq!(
            adequacy,
            Adequacy {
                link_flow: true,
                current_page: false
            }
        );
        let [link, current] = adequacy.lines(&thresholds);
        assert_eq!(link, "link flow (>100): adequate");
        assert_eq!(current, "current page (>200): too short to analyze");
    }

    #[test]
    fn test_json_output_carries_both_verdicts() {
        let thresholds = AdequacyThresholds::default();
        let doc = ExtractedDocument::new(&"a".repeat(250), "https://a.example/privacy");
        let value = serde_json::to_value(ExtractOutput {
            document: &doc,
            adequacy: Adequacy::of(&doc, &thresholds),
        })
        .unwrap();
        assert_eq!(value["length_chars"], 250);
        assert_eq!(value["adequacy"]["link_flow"], true);
        assert_eq!(value["adequacy"]["current_page"], true);
    }
}
