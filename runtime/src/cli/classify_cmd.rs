//! `policyscope classify <url>`: is this page itself a policy page?

use crate::cli::output::{self, Styles};
use crate::cli::page;
use crate::config::ScoutConfig;
use crate::discovery::extractor::{extract_title, visible_text};
use crate::discovery::{classify_page, extract_document, PageSignals};
use crate::patterns::PatternLibrary;
use crate::renderer::{NoopRenderer, Renderer};
use anyhow::Result;
use std::sync::Arc;

pub async fn run(url: &str, render: bool, config: &ScoutConfig) -> Result<()> {
    let url = page::normalize_url(url)?;
    let renderer: Arc<dyn Renderer> = if render {
        page::launch_renderer(config).await
    } else {
        Arc::new(NoopRenderer)
    };
    let snapshot = page::load(&url, render, config, renderer.as_ref()).await?;
    let _ = renderer.shutdown().await;

    let title = extract_title(&snapshot.html);
    let content = visible_text(&snapshot.html);
    let classification = classify_page(
        PageSignals {
            url: &snapshot.url,
            title: &title,
            content: &content,
        },
        PatternLibrary::global(),
        &config.classifier,
    );
    let document = extract_document(&snapshot.html, &snapshot.url);
    let usable = classification.is_policy_page && document.is_adequate(config.adequacy.current_page);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "classification": classification,
            "title": title,
            "length_chars": document.length_chars,
            "usable": usable,
        }));
        return Ok(());
    }

    let s = Styles::detect();
    let verdict = if classification.is_policy_page {
        format!("{} policy page", s.ok_sym())
    } else {
        format!("{} not a policy page", s.warn_sym())
    };
    println!("  {verdict}  {}", s.dim(&format!("confidence {}", classification.confidence_score)));
    if !output::is_quiet() {
        println!("    Title:   {title}");
        println!("    Signals: {}", classification.signals.join(", "));
        println!("    Text:    {} chars", document.length_chars);
        if classification.is_policy_page && !usable {
            println!(
                "    {} too little text to analyze in place (need more than {})",
                s.warn_sym(),
                config.adequacy.current_page
            );
        }
    }
    Ok(())
}
