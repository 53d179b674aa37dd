//! Strata - unified CLI entrypoint.
//!
//! Usage:
//!   strata db migrate [--datadir DIR] [--config FILE]
//!   strata db compact [--datadir DIR]

use anyhow::Result;
use clap::Parser;
use strata::cli::commands::run_db;
use strata::cli::{Cli, Commands};
use strata::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(datadir) = cli.datadir {
        cfg.paths.data_dir = datadir;
    }

    let level = cli
        .log_level
        .unwrap_or_else(|| cfg.telemetry.log_level.clone());
    init_logging(&level);

    match cli.command {
        Commands::Db(args) => run_db(args, &cfg),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
