//! Online schema migration.
//!
//! When the configured route table differs from the layout recorded on disk,
//! this module computes the minimal-risk transformation and applies it
//! exactly once. The planner partitions the change set into components that
//! touch disjoint physical DBs; the executor migrates each component by
//! rename, in-place table moves, or a staged full rebuild, then rewrites the
//! table-list metadata and marks every DB clean.
//!
//! A failed run leaves the layout partially migrated but re-plannable:
//! running again re-derives a consistent plan from whatever table records
//! currently exist. The caller owns the data directory exclusively for the
//! duration of the run; two concurrent migrations over one directory are not
//! detected.

pub mod executor;
pub mod planner;

use crate::core::config::ReservedKeys;
use crate::core::error::{Result, StrataError};
use crate::kvdb::DbProducer;
use crate::multidb::{Router, TypeName};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

// Re-exports for convenience
pub use executor::{clear_dirty_flags, Executor};
pub use planner::{build_plan, read_entries, Component, MigrationEntry, Plan};

/// Run a full migration over `data_dir`.
///
/// `producers` must be rooted under `<data_dir>/chaindata/<type>` and
/// `tmp_producers` under `<data_dir>/tmp/<type>`, without handle caching:
/// the executor renames and deletes DB directories and no handle may be
/// open when it does.
pub fn run(
    data_dir: &Path,
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    tmp_producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    router: &Router,
    keys: &ReservedKeys,
) -> Result<()> {
    // A populated staging area means a previous run may have crashed between
    // deleting old DBs and moving staged ones; the staged copy could be the
    // only one. Require manual inspection instead of guessing.
    let staging = data_dir.join("tmp");
    if staging_has_data(&staging)? {
        return Err(StrataError::StagingLeftover { path: staging });
    }

    let entries = read_entries(producers, router, &keys.tables_key)?;
    let plan = build_plan(entries)?;
    if plan.is_empty() {
        tracing::info!("no DB migration is needed");
        return Ok(());
    }

    let executor = Executor {
        data_dir,
        producers,
        tmp_producers,
        keys,
    };
    for component in &plan.components {
        executor.migrate_component(component)?;
    }

    clear_dirty_flags(producers, &keys.flush_id_key)?;

    // Leftover empty staging directories would trip the presence check on
    // the next run.
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }

    tracing::info!("DB migration is complete");
    Ok(())
}

/// Check whether the staging tree holds any file (empty directories are
/// fine).
fn staging_has_data(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
