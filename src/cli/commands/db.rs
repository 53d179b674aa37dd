//! Database command implementation.

use crate::core::config::{Config, ReservedKeys};
use crate::core::runtime;
use crate::kvdb::KvStore;
use crate::migrate;
use crate::multidb::Router;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

/// Chainstore database operations.
#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

/// Database subcommands.
#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Migrate the chainstore layout to match the configured route table.
    Migrate,
    /// Compact all databases under the data directory.
    Compact,
}

/// Run the db command.
pub fn run_db(args: DbArgs, cfg: &Config) -> Result<()> {
    match args.command {
        DbCommand::Migrate => run_migrate(cfg),
        DbCommand::Compact => run_compact(cfg),
    }
}

fn run_migrate(cfg: &Config) -> Result<()> {
    let keys = ReservedKeys::default();
    let data_dir = &cfg.paths.data_dir;
    let producers = runtime::supported_dbs(&cfg.cache, &data_dir.join("chaindata"));
    let tmp_producers = runtime::supported_dbs(&cfg.cache, &data_dir.join("tmp"));
    let router = Router::new(&cfg.routing.table).context("failed to compile the route table")?;
    migrate::run(data_dir, &producers, &tmp_producers, &router, &keys)
        .context("DB migration failed")?;
    Ok(())
}

fn run_compact(cfg: &Config) -> Result<()> {
    let producers = runtime::supported_dbs(&cfg.cache, &cfg.paths.data_dir.join("chaindata"));
    for (db_type, producer) in &producers {
        for name in producer.names() {
            let db = producer
                .open_db(&name)
                .with_context(|| format!("cannot open DB {:?}", name))?;

            tracing::info!(db_type = %db_type, db_name = %name, "stats before compaction");
            show_stats(db.as_ref());

            tracing::info!(db_type = %db_type, db_name = %name, "triggering compaction");
            for b in 0u8..255 {
                tracing::trace!(
                    db_name = %name,
                    range = %format!("0x{:02X}-0x{:02X}", b, b + 1),
                    "compacting chain database"
                );
                db.compact(&[b], &[b + 1])
                    .with_context(|| format!("compaction of DB {:?} failed", name))?;
            }

            tracing::info!(db_type = %db_type, db_name = %name, "stats after compaction");
            show_stats(db.as_ref());
        }
    }
    Ok(())
}

fn show_stats(db: &dyn KvStore) {
    for property in ["rocksdb.stats", "rocksdb.levelstats"] {
        match db.stat(property) {
            Ok(stats) => println!("{stats}"),
            Err(err) => {
                tracing::warn!(property = %property, error = %err, "failed to read database stats");
            }
        }
    }
}
