mod config;
mod engine;
mod env;
mod manager;
mod model;
mod policy;
mod record;
mod stats;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Root directory the timestamped run directories are created under.
    #[arg(long)]
    out_dir: PathBuf,

    /// Optional TOML configuration file; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full seed-by-algorithm collection sweep.
    Collect,

    /// Validate the configuration and print the algorithm roster.
    Check,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.out_dir, args.config).context("failed to construct mgr")?;

    match args.command {
        Command::Collect => mgr.collect()?,
        Command::Check => mgr.check()?,
    }

    Ok(())
}
