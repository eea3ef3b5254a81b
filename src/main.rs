//! Holdco: autonomous holding company kernel.
//!
//! Usage:
//!   holdco init            Write a default holdco.toml
//!   holdco run             Found the configured companies and run ticks
//!   holdco config          Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use holdco::company::CompanySummary;
use holdco::config;
use holdco::orchestrator::{Orchestrator, PortfolioSnapshot, RunSummary, Scheduler};
use holdco::types::LifecycleState;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "holdco")]
#[command(version = "0.1.0")]
#[command(about = "Orchestration kernel for an autonomous holding company")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to holdco home directory.
    #[arg(long, default_value = "~/.holdco")]
    home: String,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config to the home directory.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Found the configured companies and run the scheduler.
    Run {
        /// Stop after this many ticks (overrides max_ticks).
        #[arg(long)]
        ticks: Option<u64>,

        /// Print the final portfolio as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration.
    Config,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = config::resolve_path(&cli.home);
    let config_path = home_dir.join("holdco.toml");
    let cfg = config::load_config(&config_path)?;

    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { force } => cmd_init(&config_path, force),
        Commands::Run { ticks, json } => cmd_run(cfg, ticks, json).await,
        Commands::Config => cmd_config(&cfg, &config_path),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            "!".yellow().bold(),
            config_path.display()
        );
        return Ok(());
    }
    config::save_config(&config::KernelConfig::default(), config_path)?;
    println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
    Ok(())
}

fn cmd_config(cfg: &config::KernelConfig, config_path: &Path) -> Result<()> {
    let rendered = toml::to_string_pretty(cfg).context("Failed to render config")?;
    println!("# {}", display_source(config_path));
    println!("{}", rendered);
    Ok(())
}

async fn cmd_run(cfg: config::KernelConfig, ticks: Option<u64>, json: bool) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(cfg.clone()));
    let founded = orchestrator
        .bootstrap()
        .await
        .context("Failed to found configured companies")?;

    println!(
        "{} Starting '{}' with {} companies",
        ">>>".green().bold(),
        cfg.name,
        founded.len()
    );

    let mut scheduler = Scheduler::new(orchestrator.clone());
    if let Some(ticks) = ticks {
        scheduler = scheduler.with_max_ticks(ticks);
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} Shutting down gracefully...", "<<<".red().bold());
            signal_cancel.cancel();
        }
    });

    let outcome = scheduler.run(cancel).await;

    let snapshot = orchestrator
        .view()
        .snapshot(orchestrator.current_tick())
        .await;
    match snapshot {
        Ok(snapshot) if json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Ok(snapshot) => print_report(&snapshot, outcome.as_ref().ok()),
        Err(e) => warn!("Could not read final portfolio: {}", e),
    }

    let summary = outcome?;
    info!("Run complete after {} ticks", summary.ticks);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn display_source(path: &Path) -> String {
    if path.exists() {
        PathBuf::from(path).display().to_string()
    } else {
        "defaults (no config file)".to_string()
    }
}

fn print_report(snapshot: &PortfolioSnapshot, summary: Option<&RunSummary>) {
    println!();
    println!("{}", "=== Portfolio ===".bold());
    println!();
    println!("  {}:  {}", "Tick".bold(), snapshot.tick);
    if let Some(summary) = summary {
        println!(
            "  {}:  {} applied, {} rejected, {} loop failures, {} timeouts",
            "Actions".bold(),
            summary.applied,
            summary.rejected,
            summary.failed_activations,
            summary.timed_out_activations
        );
    }
    println!();
    println!("  {}:", "Companies".bold());
    for company in &snapshot.companies {
        print_company(company);
    }
    println!();
    println!("  {}:", "Holders".bold());
    for holder in &snapshot.holders {
        println!(
            "    {:<10} {:<24} {:>16}",
            holder.id.to_string(),
            holder.name,
            holder.balance.to_string()
        );
    }
    println!();
    println!("  {}:    {}", "Capital".bold(), snapshot.total_capital);
    println!("  {}: {}", "Boundary".bold(), snapshot.boundary_net);
    println!("  {}:   {}", "Audited".bold(), snapshot.audit_records);
    println!();
}

fn print_company(company: &CompanySummary) {
    let parent = company
        .parent
        .map(|p| format!(" <- {}", p))
        .unwrap_or_default();
    println!(
        "    {:<8} {:<32} {:<18} {:>16} {:>14}{}",
        company.id.to_string(),
        company.name,
        colorize_state(company.state),
        company.balance.to_string(),
        company.exposure.to_string(),
        parent.dimmed()
    );
}

fn colorize_state(state: LifecycleState) -> String {
    let label = state.to_string();
    match state {
        LifecycleState::Active => label.green().to_string(),
        LifecycleState::Forming | LifecycleState::Replicating => label.cyan().to_string(),
        LifecycleState::MergeNegotiating => label.yellow().to_string(),
        LifecycleState::Merged | LifecycleState::Acquired => label.blue().to_string(),
        LifecycleState::Liquidated => label.red().bold().to_string(),
    }
}
