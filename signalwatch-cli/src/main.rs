//! SignalWatch CLI: run the watcher, scan once, manage the config file.
//!
//! Commands:
//! - `run`: poll the exchange every period until stopped (or `--cycles`)
//! - `once`: run a single cycle and print the registry as JSON
//! - `scan`: classify the current universe and print BUY / WAIT per symbol
//! - `config init`: write a default TOML config

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use signalwatch_core::classifier::Classification;
use signalwatch_core::data::{BinanceProvider, CircuitBreaker};
use signalwatch_runner::{settings, Driver, WatchConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

#[derive(Parser)]
#[command(
    name = "signalwatch",
    about = "SignalWatch: crypto spot signal watcher and lifecycle tracker"
)]
struct Cli {
    /// Default log level; `RUST_LOG` directives take precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the exchange and track signals until interrupted.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<usize>,

        /// Override the snapshot export path.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run a single cycle and print the tracked signals as JSON.
    Once {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Classify the current universe without tracking anything.
    Scan {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print only BUY results.
        #[arg(long, default_value_t = false)]
        buys_only: bool,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Config file management commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a config file populated with defaults.
    Init {
        /// Destination path.
        #[arg(long, default_value = "signalwatch.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            cycles,
            export,
        } => run_watch(config.as_deref(), cycles, export),
        Commands::Once { config } => run_once(config.as_deref()),
        Commands::Scan {
            config,
            buys_only,
            json,
        } => run_scan(config.as_deref(), buys_only, json),
        Commands::Config {
            action: ConfigAction::Init { path, force },
        } => run_config_init(&path, force),
    }
}

fn init_logging(default_level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init()
}

fn load_config(path: Option<&Path>) -> Result<WatchConfig> {
    match path {
        Some(path) => WatchConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(WatchConfig::default()),
    }
}

fn build_driver(config: &WatchConfig) -> Result<Driver> {
    let breaker = Arc::new(CircuitBreaker::default());
    let provider = BinanceProvider::new(breaker).context("creating Binance client")?;
    let settings = settings::from_config(&config.notifications);
    Driver::new(config, Box::new(provider), settings).context("creating driver")
}

fn run_watch(
    config_path: Option<&Path>,
    cycles: Option<usize>,
    export: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if export.is_some() {
        config.export.path = export;
    }

    let mut driver = build_driver(&config)?;
    let completed = driver.run(cycles, None);
    info!(completed, "done");
    Ok(())
}

fn run_once(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut driver = build_driver(&config)?;
    let report = driver.run_cycle(Utc::now())?;

    eprintln!(
        "{} new, {} transitions, {} stale",
        report.created.len(),
        report.transitions.len(),
        report.stale
    );
    println!("{}", serde_json::to_string_pretty(driver.tracker().signals())?);
    Ok(())
}

fn run_scan(config_path: Option<&Path>, buys_only: bool, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let driver = build_driver(&config)?;

    let results: Vec<Classification> = driver
        .scan(Utc::now())
        .into_iter()
        .filter(|c| !buys_only || matches!(c, Classification::Buy(_)))
        .collect();

    if json {
        let signals: Vec<_> = results
            .into_iter()
            .filter_map(Classification::into_signal)
            .collect();
        println!("{}", serde_json::to_string_pretty(&signals)?);
        return Ok(());
    }

    println!(
        "{:<14} {:<6} {:<18} {:>14} {:>6} {:<8}",
        "SYMBOL", "ACTION", "TYPE", "PRICE", "RSI", "TREND"
    );
    for result in &results {
        match result {
            Classification::Buy(signal) => println!(
                "{:<14} {:<6} {:<18} {:>14} {:>6.1} {:<8}",
                signal.symbol(),
                "BUY",
                signal.kind.label(),
                signal.entry_price,
                signal.rsi,
                signal.trend.as_str(),
            ),
            Classification::Wait(report) => println!(
                "{:<14} {:<6} {:<18} {:>14} {:>6.1} {:<8}",
                report.symbol, "WAIT", "-", report.price, report.rsi, report.trend.as_str(),
            ),
        }
    }
    Ok(())
}

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = WatchConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
