//! `policyscope links <url>`: show the ranked policy-link candidates of a page.

use crate::cli::output::{self, Styles};
use crate::cli::page;
use crate::config::ScoutConfig;
use crate::discovery::rank_document;
use crate::patterns::PatternLibrary;
use crate::renderer::{NoopRenderer, Renderer};
use anyhow::Result;
use std::sync::Arc;

pub async fn run(url: &str, render: bool, limit: usize, config: &ScoutConfig) -> Result<()> {
    let url = page::normalize_url(url)?;
    let renderer: Arc<dyn Renderer> = if render {
        page::launch_renderer(config).await
    } else {
        Arc::new(NoopRenderer)
    };
    let snapshot = page::load(&url, render, config, renderer.as_ref()).await?;
    let _ = renderer.shutdown().await;

    let ranking = rank_document(
        &snapshot.html,
        &snapshot.url,
        PatternLibrary::global(),
        &config.links,
    );

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "url": snapshot.url,
            "primary": ranking.primary(),
            "secondary": ranking.secondary(),
            "candidates": ranking.candidates.iter().take(limit).collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    let s = Styles::detect();
    if ranking.is_empty() {
        println!("  {} no policy-like links found", s.warn_sym());
        return Ok(());
    }
    let secondary = ranking.secondary().len();
    for (i, c) in ranking.candidates.iter().take(limit).enumerate() {
        let marker = if i == 0 {
            s.ok_sym()
        } else if i <= secondary {
            "+".to_string()
        } else {
            " ".to_string()
        };
        println!("  {marker} {:>4}  {:<32} {}", c.score, c.anchor_text, s.dim(&c.url));
    }
    if !output::is_quiet() && ranking.candidates.len() > limit {
        println!("  {}", s.dim(&format!("... {} more", ranking.candidates.len() - limit)));
    }
    Ok(())
}
