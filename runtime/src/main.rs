// Copyright 2026 Policyscope Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use policyscope_runtime::audit::AuditLogger;
use policyscope_runtime::cli;
use policyscope_runtime::config::ScoutConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "policyscope",
    about = "Policyscope: find and summarize the privacy policy behind any page",
    version,
    after_help = "Run 'policyscope <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the policy governing a page and summarize it
    Analyze {
        /// Page URL (scheme optional)
        url: String,
        /// Load the starting page in a headless browser
        #[arg(long)]
        render: bool,
        /// Analyze every relevant policy link side by side
        #[arg(long)]
        all_candidates: bool,
        /// Append attempt records to a JSONL file (default ~/.policyscope/audit.jsonl)
        #[arg(long, value_name = "PATH")]
        audit_log: Option<Option<PathBuf>>,
    },
    /// Decide whether a page is itself a policy page
    Classify {
        url: String,
        #[arg(long)]
        render: bool,
    },
    /// List ranked policy-link candidates on a page
    Links {
        url: String,
        #[arg(long)]
        render: bool,
        /// Maximum number of candidates to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print the extracted main text of a page
    Extract {
        url: String,
        #[arg(long)]
        render: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, quiet: bool, json: bool) {
    let default = if verbose {
        "policyscope=debug,policyscope_runtime=debug"
    } else if quiet {
        "policyscope=error,policyscope_runtime=error"
    } else {
        "policyscope=info,policyscope_runtime=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("POLICYSCOPE_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("POLICYSCOPE_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("POLICYSCOPE_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("POLICYSCOPE_NO_COLOR", "1");
    }
    init_tracing(cli.verbose, cli.quiet, cli.log_json);

    let result = run(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "policyscope", &mut std::io::stdout());
        return Ok(());
    }

    let config = ScoutConfig::load(cli.config.as_deref())?;

    let work = async {
        match cli.command {
            Commands::Analyze {
                url,
                render,
                all_candidates,
                audit_log,
            } => {
                let args = cli::analyze_cmd::AnalyzeArgs {
                    url,
                    render,
                    all_candidates,
                    audit_log: audit_log.map(|p| p.unwrap_or_else(AuditLogger::default_path)),
                };
                cli::analyze_cmd::run(args, config).await
            }
            Commands::Classify { url, render } => cli::classify_cmd::run(&url, render, &config).await,
            Commands::Links { url, render, limit } => {
                cli::links_cmd::run(&url, render, limit, &config).await
            }
            Commands::Extract { url, render } => cli::extract_cmd::run(&url, render, &config).await,
            Commands::Doctor => cli::doctor::run(cli.config.as_deref(), &config).await,
            Commands::Completions { .. } => Ok(()),
        }
    };

    // Dropping `work` on Ctrl-C closes any open browser context.
    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted");
            anyhow::bail!("interrupted")
        }
    }
}
