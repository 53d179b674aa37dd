//! Command-line interface.
//!
//! Usage:
//!   strata db migrate [--datadir DIR] [--config FILE]
//!   strata db compact [--datadir DIR]

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strata - chainstore routing and migration.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Node data directory (overrides the configured path).
    #[arg(long, global = true)]
    pub datadir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chainstore database operations.
    Db(commands::DbArgs),
}
