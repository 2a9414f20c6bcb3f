//! Environment readiness check.

use crate::cli::output::{self, Styles};
use crate::config::{resolve_config_path, ScoutConfig};
use crate::discovery::site_overrides::SiteOverrides;
use crate::patterns::PatternLibrary;
use crate::renderer::chromium::locate_chromium;
use anyhow::Result;

/// Check Chromium, configuration, pattern tables and the analysis endpoint.
pub async fn run(config_flag: Option<&str>, config: &ScoutConfig) -> Result<()> {
    let chromium = locate_chromium();
    let config_path = resolve_config_path(config_flag);
    let patterns = PatternLibrary::global();
    let overrides_ok = SiteOverrides::try_embedded().is_ok();
    let analysis_ready = !config.analysis.endpoint.trim().is_empty();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium,
            "config": config_path.as_ref().map(|p| p.display().to_string()),
            "patterns_version": patterns.version,
            "link_patterns": patterns.link.len(),
            "site_overrides": overrides_ok,
            "analysis_endpoint": analysis_ready.then(|| config.analysis.endpoint.clone()),
            "search_url": config.resolver.search_url,
        }));
        return Ok(());
    }

    let s = Styles::detect();
    println!("Policyscope Doctor");
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(found) => println!(
            "[{}] Chromium found: {} ({:?})",
            s.ok_sym(),
            found.path.display(),
            found.source
        ),
        None => println!(
            "[{}] Chromium NOT found; rendering strategies will be skipped. Set POLICYSCOPE_CHROMIUM_PATH.",
            s.warn_sym()
        ),
    }
    match &config_path {
        Some(path) => println!("[{}] Config: {}", s.ok_sym(), path.display()),
        None => println!("[{}] Config: built-in defaults", s.ok_sym()),
    }
    println!(
        "[{}] Pattern library v{} ({} link, {} strong patterns)",
        s.ok_sym(),
        patterns.version,
        patterns.link.len(),
        patterns.strong.len()
    );
    if !overrides_ok {
        println!("[{}] Embedded site overrides failed to load", s.err_sym());
    }
    if analysis_ready {
        println!("[{}] Analysis endpoint: {}", s.ok_sym(), config.analysis.endpoint);
    } else {
        println!(
            "[{}] Analysis endpoint NOT configured. Set POLICYSCOPE_ANALYSIS_URL.",
            s.err_sym()
        );
    }
    println!("[{}] Search endpoint: {}", s.ok_sym(), config.resolver.search_url);

    println!();
    if analysis_ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
