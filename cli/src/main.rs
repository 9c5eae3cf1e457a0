//! CLI entry point for nanofolio.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::info;

use nanofolio::Engine;
use nanofolio_cli::commands;
use nanofolio_cli::config::{Config, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "nanofolio")]
#[command(about = "Mean-variance portfolio optimization and risk analytics")]
#[command(version)]
struct Cli {
    /// Path to nanofolio.toml
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write the JSON report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Efficient frontier, max-Sharpe and minimum-variance portfolios
    Optimize {
        /// Path to prices.json
        prices: PathBuf,
    },

    /// Risk metrics per asset and for the weighted portfolio
    Metrics {
        /// Path to portfolio.json
        portfolio: PathBuf,
    },

    /// Compare current weights against optimal weights
    Rebalance {
        /// Path to weights.json
        weights: PathBuf,
    },

    /// Score current weights against the max-Sharpe portfolio
    Efficiency {
        /// Path to portfolio.json
        portfolio: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load_or_default(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .format_timestamp_secs()
        .init();

    if cli.config.exists() {
        info!("Loaded config from {}", cli.config.display());
    } else {
        info!("No {} found, using built-in defaults", cli.config.display());
    }

    let engine = match Engine::new(config.engine) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Command::Optimize { prices } => commands::optimize(&engine, prices),
        Command::Metrics { portfolio } => commands::metrics(&engine, portfolio),
        Command::Rebalance { weights } => commands::rebalance(&engine, weights),
        Command::Efficiency { portfolio } => commands::efficiency(&engine, portfolio),
    }
    .and_then(|report| commands::emit(&report, cli.output.as_deref()));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}
