//! # engula-chaos
//!
//! Chaos runner for engula clusters.
//!
//! ## Commands
//!
//! - `init`: Write a default configuration file
//! - `run`: Restart random servers until an anomaly or Ctrl-C
//! - `check`: One-shot health check of a running cluster
//! - `status`: Show configuration and live servers
//! - `workload`: Run the verifying read/write workload in memory
//!
//! ## Example
//!
//! ```bash
//! # Write engula-chaos.toml, then edit bootstrap / supervisor paths
//! engula-chaos --config engula-chaos.toml init
//!
//! # Ten restart rounds with a fixed seed
//! engula-chaos --config engula-chaos.toml run --iterations 10 --seed 7
//!
//! # Is everything still up?
//! engula-chaos --config engula-chaos.toml check --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check, init, run, status, workload};

/// Chaos runner for engula clusters.
#[derive(Parser, Debug)]
#[command(name = "engula-chaos")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: engula-chaos.toml in the user config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Restart random servers and check cluster health after each restart
    Run {
        /// Stop after this many healthy rounds (default: run until Ctrl-C)
        #[arg(long)]
        iterations: Option<u64>,

        /// Seed for server and wait-time selection
        #[arg(long)]
        seed: Option<u64>,

        /// Assume the cluster is already set up
        #[arg(long)]
        skip_setup: bool,
    },

    /// Check cluster health once
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and live servers
    Status,

    /// Run the verifying workload against an in-memory collection
    Workload {
        /// How long writers run before readers drain
        #[arg(long, default_value = "10")]
        duration_secs: u64,

        /// Base seed for writer operation streams
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command {
        Commands::Init { force } => {
            init::run(&config_path, force).await?;
        }
        Commands::Run {
            iterations,
            seed,
            skip_setup,
        } => {
            let overrides = run::Overrides {
                iterations,
                seed,
                skip_setup,
            };
            run::run(&config_path, overrides).await?;
        }
        Commands::Check { json } => {
            check::run(&config_path, json).await?;
        }
        Commands::Status => {
            status::run(&config_path).await?;
        }
        Commands::Workload {
            duration_secs,
            seed,
        } => {
            workload::run(&config_path, duration_secs, seed).await?;
        }
    }

    Ok(())
}

/// Default configuration file for engula-chaos.
fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "engula", "engula-chaos")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().join("engula-chaos.toml"))
}
