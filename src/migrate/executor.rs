//! Migration execution.
//!
//! Each component is migrated by the cheapest sufficient strategy:
//!
//! 1. **Rename**: the component is one whole DB changing its name; a single
//!    directory rename, no data copied.
//! 2. **Move-tables**: every change is a table move inside one physical DB
//!    and no table locator is used twice; keys are rewritten in place through
//!    the store's native batch.
//! 3. **Full rebuild**: the universal fallback; every entry is copied into a
//!    staging DB under `tmp/`, old DBs are deleted, staged DBs move into the
//!    live tree.
//!
//! Strategy eligibility is decided purely from the component's own entries;
//! components touch disjoint physical DBs by construction.

use crate::core::config::ReservedKeys;
use crate::core::error::{Result, StrataError};
use crate::kvdb::flushable::{current_flush_id, flush_id_value, CLEAN_MARKER};
use crate::kvdb::{DbProducer, KvStore, SkipKeysStore};
use crate::migrate::planner::Component;
use crate::multidb::{write_tables_list, DbLocator, TableRecord, TypeName};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Copy batches larger than this are committed in chunks.
const MAX_BATCH_BYTES: usize = 8 * 1024 * 1024;

/// Executes a migration plan against a data directory.
pub struct Executor<'a> {
    /// Node data directory (`chaindata/` and `tmp/` live under it).
    pub data_dir: &'a Path,
    /// Producers rooted under `chaindata/<type>`.
    pub producers: &'a HashMap<TypeName, Arc<dyn DbProducer>>,
    /// Producers rooted under `tmp/<type>`, used by the rebuild strategy.
    pub tmp_producers: &'a HashMap<TypeName, Arc<dyn DbProducer>>,
    /// Reserved key layout.
    pub keys: &'a ReservedKeys,
}

impl Executor<'_> {
    /// Migrate one component, then delete DBs it no longer references.
    pub fn migrate_component(&self, component: &Component) -> Result<()> {
        if let Some((db_type, old_name, new_name)) = rename_target(component) {
            self.rename_db(&db_type, &old_name, &new_name)?;
        } else if move_tables_eligible(component) {
            self.move_tables(component)?;
        } else {
            self.rebuild(component)?;
        }
        self.drop_unused(component)
    }

    fn producer_for(&self, db_type: &str) -> Result<&Arc<dyn DbProducer>> {
        self.producers
            .get(db_type)
            .ok_or_else(|| StrataError::config(format!("unsupported DB type {:?}", db_type)))
    }

    fn tmp_producer_for(&self, db_type: &str) -> Result<&Arc<dyn DbProducer>> {
        self.tmp_producers
            .get(db_type)
            .ok_or_else(|| StrataError::config(format!("unsupported DB type {:?}", db_type)))
    }

    fn live_path(&self, db_type: &str, name: &str) -> PathBuf {
        self.data_dir.join("chaindata").join(db_type).join(name)
    }

    fn staged_path(&self, db_type: &str, name: &str) -> PathBuf {
        self.data_dir.join("tmp").join(db_type).join(name)
    }

    /// Rename strategy: one directory-level operation.
    fn rename_db(&self, db_type: &str, old_name: &str, new_name: &str) -> Result<()> {
        let old_path = self.live_path(db_type, old_name);
        let new_path = self.live_path(db_type, new_name);
        tracing::info!(old = ?old_path, new = ?new_path, "renaming DB");
        Ok(std::fs::rename(old_path, new_path)?)
    }

    /// Move-tables strategy: rewrite changed tables within their DB.
    fn move_tables(&self, component: &Component) -> Result<()> {
        for entry in component.values() {
            if entry.old.table == entry.new.table {
                continue;
            }
            let db = self
                .producer_for(&entry.new.db_type)?
                .open_db(&entry.new.name)?;
            tracing::info!(
                req = %entry.req,
                db_type = %entry.new.db_type,
                db_name = %entry.new.name,
                old_table = %entry.old.table,
                new_table = %entry.new.table,
                "moving DB table"
            );
            // Reserved metadata keys stay where they are.
            let db = SkipKeysStore::new(db, &self.keys.metadata_prefix);
            move_table_within(&db, entry.old.table.as_bytes(), entry.new.table.as_bytes())?;
        }
        self.write_clean_table_records(component)
    }

    /// Rebuild strategy: copy everything through the staging area.
    fn rebuild(&self, component: &Component) -> Result<()> {
        for entry in component.values() {
            let old_db = self
                .producer_for(&entry.old.db_type)?
                .open_db(&entry.old.name)?;
            let new_db = self
                .tmp_producer_for(&entry.new.db_type)?
                .open_db(&entry.new.name)?;
            tracing::info!(
                req = %entry.req,
                old_db = %format!("{}/{}", entry.old.db_type, entry.old.name),
                old_table = %entry.old.table,
                new_db = %format!("tmp/{}/{}", entry.new.db_type, entry.new.name),
                new_table = %entry.new.table,
                "copying DB table"
            );
            // Reserved metadata keys of the source DB are not data.
            let old_db = SkipKeysStore::new(old_db, &self.keys.metadata_prefix);
            copy_table(
                &old_db,
                entry.old.table.as_bytes(),
                new_db.as_ref(),
                entry.new.table.as_bytes(),
            )?;
        }

        // Only now is it safe to drop the old DBs.
        let mut dropped = HashSet::new();
        for entry in component.values() {
            let old = entry.old.db_locator();
            if !dropped.insert(old.clone()) {
                continue;
            }
            tracing::info!(db_type = %old.db_type, db_name = %old.name, "dropping old DB");
            remove_db_path(&self.live_path(&old.db_type, &old.name))?;
        }

        let mut moved = HashSet::new();
        for entry in component.values() {
            let new = entry.new.db_locator();
            if !moved.insert(new.clone()) {
                continue;
            }
            let from = self.staged_path(&new.db_type, &new.name);
            let to = self.live_path(&new.db_type, &new.name);
            tracing::info!(from = ?from, to = ?to, "moving staged DB into the live tree");
            remove_db_path(&to)?;
            if let Some(parent) = to.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&from, &to)?;
        }

        self.write_clean_table_records(component)
    }

    /// Persist the component's placements into its destination DBs.
    fn write_clean_table_records(&self, component: &Component) -> Result<()> {
        let mut by_db: HashMap<DbLocator, Vec<TableRecord>> = HashMap::new();
        for entry in component.values() {
            by_db
                .entry(entry.new.db_locator())
                .or_default()
                .push(TableRecord {
                    req: entry.req.clone(),
                    table: entry.new.table.clone(),
                });
        }
        for (locator, mut records) in by_db {
            records.sort_by(|a, b| a.req.cmp(&b.req));
            let db = self.producer_for(&locator.db_type)?.open_db(&locator.name)?;
            write_tables_list(db.as_ref(), &self.keys.tables_key, &records)?;
        }
        Ok(())
    }

    /// Delete DBs the component references only through old routes.
    fn drop_unused(&self, component: &Component) -> Result<()> {
        let used: HashSet<DbLocator> = component.values().map(|e| e.new.db_locator()).collect();
        let mut dropped = HashSet::new();
        for entry in component.values() {
            let old = entry.old.db_locator();
            if used.contains(&old) || !dropped.insert(old.clone()) {
                continue;
            }
            tracing::info!(db_type = %old.db_type, db_name = %old.name, "dropping unused DB");
            remove_db_path(&self.live_path(&old.db_type, &old.name))?;
        }
        Ok(())
    }
}

/// Check rename eligibility: the component must span exactly two physical
/// DBs of one backend type, with every entry going from the same old name to
/// the same new name under an unchanged table.
fn rename_target(component: &Component) -> Option<(TypeName, String, String)> {
    let mut locators = HashSet::new();
    for entry in component.values() {
        locators.insert(entry.old.db_locator());
        locators.insert(entry.new.db_locator());
    }
    if locators.len() != 2 {
        return None;
    }
    let first = component.values().next()?;
    let db_type = first.new.db_type.clone();
    let old_name = first.old.name.clone();
    let new_name = first.new.name.clone();
    for entry in component.values() {
        if entry.old.table != entry.new.table
            || entry.old.name != old_name
            || entry.new.name != new_name
            || entry.old.db_type != db_type
            || entry.new.db_type != db_type
        {
            return None;
        }
    }
    Some((db_type, old_name, new_name))
}

/// Check move-tables eligibility: no table locator used twice, every change
/// stays within its physical DB, and no entry's old and new table prefixes
/// nest (an in-place move between nested prefixes would fold moved keys back
/// into the range being consumed).
fn move_tables_eligible(component: &Component) -> bool {
    let mut occupied = HashSet::new();
    for entry in component.values() {
        if !occupied.insert(entry.old.table_locator()) {
            return false;
        }
        if !occupied.insert(entry.new.table_locator()) {
            return false;
        }
        if entry.old.db_locator() != entry.new.db_locator() {
            return false;
        }
        if entry.old.table.starts_with(&entry.new.table)
            || entry.new.table.starts_with(&entry.old.table)
        {
            return false;
        }
    }
    true
}

/// Move every key under `old` to the same suffix under `new`, in place,
/// through the store's native batch, chunked by size.
fn move_table_within(db: &dyn KvStore, old: &[u8], new: &[u8]) -> Result<()> {
    let mut batch = db.batch();
    for item in db.iterator(old, &[]) {
        let (key, value) = item?;
        let mut new_key = new.to_vec();
        new_key.extend_from_slice(&key[old.len()..]);
        batch.put(&new_key, &value)?;
        batch.delete(&key)?;
        if batch.size_estimate() >= MAX_BATCH_BYTES {
            batch.write()?;
        }
    }
    batch.write()
}

/// Copy every key under `old` in `src` to the same suffix under `new` in
/// `dst`.
fn copy_table(src: &dyn KvStore, old: &[u8], dst: &dyn KvStore, new: &[u8]) -> Result<()> {
    let mut batch = dst.batch();
    for item in src.iterator(old, &[]) {
        let (key, value) = item?;
        let mut new_key = new.to_vec();
        new_key.extend_from_slice(&key[old.len()..]);
        batch.put(&new_key, &value)?;
        if batch.size_estimate() >= MAX_BATCH_BYTES {
            batch.write()?;
        }
    }
    batch.write()
}

/// Remove a physical DB from disk, tolerating its absence.
fn remove_db_path(path: &Path) -> Result<()> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Write a fresh clean flush id into every DB of every backend type; the
/// durable signal that the on-disk layout is trustworthy again.
pub fn clear_dirty_flags(
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    flush_id_key: &[u8],
) -> Result<()> {
    let id = current_flush_id();
    for (db_type, producer) in producers {
        for name in producer.names() {
            let db = producer.open_db(&name)?;
            db.put(flush_id_key, &flush_id_value(CLEAN_MARKER, id))?;
            tracing::info!(db_type = %db_type, db_name = %name, "database set clean");
        }
    }
    Ok(())
}
