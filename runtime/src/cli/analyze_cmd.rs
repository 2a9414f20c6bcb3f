//! `policyscope analyze <url>`: find and summarize the policy governing a page.

use crate::analysis::{shared_limiter, AnalysisClient, Analyzer, SystemClock};
use crate::audit::AuditLogger;
use crate::cli::output::{self, Styles};
use crate::cli::page;
use crate::config::ScoutConfig;
use crate::error::PipelineError;
use crate::pipeline::{CandidateReport, Pipeline, PolicyReport};
use crate::resolver::strategies::DiscoveryEnv;
use crate::resolver::StrategyAttempt;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

pub struct AnalyzeArgs {
    pub url: String,
    pub render: bool,
    pub all_candidates: bool,
    pub audit_log: Option<PathBuf>,
}

pub async fn run(args: AnalyzeArgs, config: ScoutConfig) -> Result<()> {
    let url = page::normalize_url(&args.url)?;
    let limiter = shared_limiter(&config.analysis, Arc::new(SystemClock));
    let analyzer = AnalysisClient::new(config.analysis.clone(), limiter)?;
    if !analyzer.is_configured() {
        bail!("no analysis endpoint configured; set POLICYSCOPE_ANALYSIS_URL or analysis.endpoint");
    }
    let analyzer: Arc<dyn Analyzer> = Arc::new(analyzer);

    let renderer = page::launch_renderer(&config).await;
    let snapshot = page::load(&url, args.render, &config, renderer.as_ref()).await?;
    let env = Arc::new(DiscoveryEnv::new(config, Arc::clone(&renderer)));
    let pipeline = Pipeline::new(env, analyzer);

    let mut audit = match &args.audit_log {
        Some(path) => Some(AuditLogger::open(path)?),
        None => None,
    };
    let request_id = uuid::Uuid::new_v4().to_string();

    let result = if args.all_candidates {
        let reports = pipeline.run_all_candidates(&snapshot).await;
        if let Some(log) = audit.as_mut() {
            if let Err(e) = record_candidates(log, &request_id, &snapshot.url, &reports) {
                warn!("failed to write audit log: {e:#}");
            }
        }
        reports.map(|reports| print_candidates(&reports))
    } else {
        let result = pipeline.run(&snapshot).await;
        if let Some(log) = audit.as_mut() {
            if let Err(e) = record(log, &request_id, &snapshot.url, &result) {
                warn!("failed to write audit log: {e:#}");
            }
        }
        match result {
            Ok(report) => {
                print_report(&report);
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    let _ = renderer.shutdown().await;
    result.map_err(|e| report_error(&e))
}

fn print_candidates(reports: &[CandidateReport]) {
    if output::is_json() {
        let items: Vec<_> = reports
            .iter()
            .map(|r| match &r.result {
                Ok(report) => serde_json::json!({
                    "candidate": r.candidate,
                    "report": report,
                }),
                Err(e) => serde_json::json!({
                    "candidate": r.candidate,
                    "error": e.to_string(),
                }),
            })
            .collect();
        output::print_json(&serde_json::json!({ "candidates": items }));
        return;
    }

    let s = Styles::detect();
    for r in reports {
        println!(
            "  {} {}",
            s.bold(&r.candidate.anchor_text),
            s.dim(&format!("(score {}) {}", r.candidate.score, r.candidate.url))
        );
        match &r.result {
            Ok(report) => print_analysis(&s, report),
            Err(e) => println!("    {} {e}", s.err_sym()),
        }
        println!();
    }
}

/// One attempt/outcome group per analyzed candidate, or a single failed
/// outcome when the comparative run itself failed.
fn record_candidates(
    log: &mut AuditLogger,
    request_id: &str,
    page_url: &str,
    reports: &Result<Vec<CandidateReport>, PipelineError>,
) -> Result<()> {
    match reports {
        Ok(reports) => reports
            .iter()
            .try_for_each(|r| record(log, request_id, page_url, &r.result)),
        Err(e) => log.log_outcome(request_id, page_url, Err(&e.to_string())),
    }
}

fn record(
    log: &mut AuditLogger,
    request_id: &str,
    page_url: &str,
    result: &Result<PolicyReport, PipelineError>,
) -> Result<()> {
    let empty: Vec<StrategyAttempt> = Vec::new();
    let attempts = match result {
        Ok(report) => &report.attempts,
        Err(PipelineError::AllStrategiesExhausted { attempts }) => attempts,
        Err(_) => &empty,
    };
    log.log_attempts(request_id, page_url, attempts)?;
    let error = result.as_ref().err().map(|e| e.to_string());
    let outcome = match result {
        Ok(report) => Ok((
            report.provenance.strategy_used.as_str(),
            report.provenance.origin_url.as_str(),
        )),
        Err(_) => Err(error.as_deref().unwrap_or_default()),
    };
    log.log_outcome(request_id, page_url, outcome)
}

fn print_report(report: &PolicyReport) {
    if output::is_json() {
        output::print_json(report);
        return;
    }
    let s = Styles::detect();
    if !output::is_quiet() {
        let via = match report.provenance.confidence {
            Some(c) => format!("{} (confidence {c})", report.provenance.strategy_used),
            None => report.provenance.strategy_used.clone(),
        };
        println!(
            "  {} {}",
            s.ok_sym(),
            s.bold(&report.provenance.origin_url)
        );
        println!(
            "    {}",
            s.dim(&format!("via {via}, {} chars", report.document.length_chars))
        );
        println!();
    }
    print_analysis(&s, report);
}

fn print_analysis(s: &Styles, report: &PolicyReport) {
    println!("    Risk: {}", s.risk(report.analysis.risk_score));
    for point in &report.analysis.summary_points {
        println!("    - {point}");
    }
}

/// Turn a pipeline error into the user-facing error, printing attempt
/// diagnostics when verbose.
fn report_error(e: &PipelineError) -> anyhow::Error {
    if let PipelineError::AllStrategiesExhausted { attempts } = e {
        if output::is_verbose() && !output::is_json() {
            let s = Styles::detect();
            for a in attempts {
                eprintln!(
                    "  {} {:<18} {}",
                    s.err_sym(),
                    a.strategy_name,
                    a.error.as_deref().unwrap_or("")
                );
            }
        }
    }
    anyhow::anyhow!("{e}\n  Hint: {}", e.hint())
}
