//! Node store assembly.
//!
//! Builds the layered producer stack handed to application subsystems:
//!
//! ```text
//! raw backend producer (rocksdb, ...)
//!   -> SyncedPool        (write buffering + dirty/clean flush protocol)
//!   -> CachedProducer    (one handle per physical DB)
//!   -> MultiProducer     (logical-request routing + table records)
//!   -> SkipKeysProducer  (reserved keys hidden from iteration)
//! ```
//!
//! Startup applies the torn-write protocol: if any managed DB misses its
//! flush id or carries a dirty marker, the whole DB set is dropped and the
//! chain must be rebuilt from genesis. Cross-table invariants cannot be
//! verified cheaply, so partial recovery is never attempted.

use crate::core::config::{Config, DbCacheConfig, ReservedKeys};
use crate::core::error::{Result, StrataError};
use crate::kvdb::flushable::{current_flush_id, is_clean};
use crate::kvdb::{CachedProducer, DbProducer, RocksProducer, SkipKeysProducer, SyncedPool};
use crate::multidb::{MultiProducer, Route, TypeName};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Construct the supported backend producers under `root`.
pub fn supported_dbs(cache: &DbCacheConfig, root: &Path) -> HashMap<TypeName, Arc<dyn DbProducer>> {
    HashMap::from([(
        "rocksdb".to_string(),
        Arc::new(RocksProducer::new(root.join("rocksdb"), cache.clone())) as Arc<dyn DbProducer>,
    )])
}

/// Check the DB set for evidence of a torn write.
///
/// A DB without the reserved flush id, or with a dirty marker, means the
/// last write session did not complete.
pub fn is_interrupted(
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    keys: &ReservedKeys,
) -> Result<bool> {
    for producer in producers.values() {
        for name in producer.names() {
            let db = producer.open_db(&name)?;
            match db.get(&keys.flush_id_key)? {
                None => return Ok(true),
                Some(value) if !is_clean(&value) => return Ok(true),
                Some(_) => {}
            }
        }
    }
    Ok(false)
}

/// Check whether no physical DB exists yet.
pub fn is_empty(producers: &HashMap<TypeName, Arc<dyn DbProducer>>) -> bool {
    producers.values().all(|p| p.names().is_empty())
}

fn drop_all_dbs(producer: &Arc<dyn DbProducer>) -> Result<()> {
    for name in producer.names() {
        producer.destroy_db(&name)?;
    }
    Ok(())
}

/// Apply the torn-write protocol; returns true on a first launch (the data
/// directory is empty, or was just dropped).
pub fn drop_all_dbs_if_interrupted(
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    keys: &ReservedKeys,
) -> Result<bool> {
    if is_interrupted(producers, keys)? {
        tracing::warn!("dirty DB state detected; dropping all DBs to rebuild from genesis");
        for producer in producers.values() {
            drop_all_dbs(producer)?;
        }
        return Ok(true);
    }
    Ok(is_empty(producers))
}

/// The assembled store stack of a running node.
pub struct NodeStores {
    /// Routing producer handed to application subsystems.
    pub producer: Arc<dyn DbProducer>,
    pools: Vec<Arc<SyncedPool>>,
}

impl std::fmt::Debug for NodeStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStores")
            .field("pools", &self.pools.len())
            .finish()
    }
}

impl NodeStores {
    /// Flush all buffered writes under one process-wide flush id.
    pub fn flush(&self) -> Result<()> {
        let id = current_flush_id();
        for pool in &self.pools {
            pool.flush(id)?;
        }
        Ok(())
    }

    /// Estimated byte size of all not-yet-flushed write buffers.
    pub fn not_flushed_size(&self) -> usize {
        self.pools.iter().map(|p| p.not_flushed_size()).sum()
    }
}

/// Build the full flushable producer stack over raw backend producers.
pub fn make_flushable_multi_producer(
    raw: &HashMap<TypeName, Arc<dyn DbProducer>>,
    routing_table: &HashMap<String, Route>,
    keys: &ReservedKeys,
) -> Result<NodeStores> {
    let mut wrapped: HashMap<TypeName, Arc<dyn DbProducer>> = HashMap::new();
    let mut pools = Vec::new();
    let mut flush_id: Option<Vec<u8>> = None;
    for (db_type, producer) in raw {
        let names = producer.names();
        let pool = Arc::new(SyncedPool::new(producer.clone(), keys.flush_id_key.clone()));
        flush_id = pool.initialize(&names, flush_id)?;
        pools.push(pool.clone());
        wrapped.insert(
            db_type.clone(),
            Arc::new(CachedProducer::new(pool)) as Arc<dyn DbProducer>,
        );
    }
    let multi = MultiProducer::new(wrapped, routing_table, keys.tables_key.clone())?;
    multi.verify()?;
    let producer = Arc::new(SkipKeysProducer::new(
        Arc::new(multi),
        &keys.metadata_prefix,
    ));
    Ok(NodeStores { producer, pools })
}

/// Build the producer stack without write buffering (genesis import works on
/// raw DBs for performance).
pub fn make_raw_multi_producer(
    raw: &HashMap<TypeName, Arc<dyn DbProducer>>,
    routing_table: &HashMap<String, Route>,
    keys: &ReservedKeys,
) -> Result<Arc<dyn DbProducer>> {
    let mut wrapped: HashMap<TypeName, Arc<dyn DbProducer>> = HashMap::new();
    for (db_type, producer) in raw {
        wrapped.insert(
            db_type.clone(),
            Arc::new(CachedProducer::new(producer.clone())) as Arc<dyn DbProducer>,
        );
    }
    let multi = MultiProducer::new(wrapped, routing_table, keys.tables_key.clone())?;
    multi.verify()?;
    Ok(Arc::new(SkipKeysProducer::new(
        Arc::new(multi),
        &keys.metadata_prefix,
    )))
}

/// Open the node's store stack, applying the startup consistency protocol.
///
/// `genesis_available` tells whether the caller can rebuild state from a
/// genesis; an empty (or just-dropped) data directory without one is a
/// user-configuration error, distinct from corruption.
pub fn open_node_stores(
    cfg: &Config,
    keys: &ReservedKeys,
    genesis_available: bool,
) -> Result<NodeStores> {
    let chaindata = cfg.paths.data_dir.join("chaindata");
    let raw = supported_dbs(&cfg.cache, &chaindata);
    let first_launch = drop_all_dbs_if_interrupted(&raw, keys)?;
    if first_launch && !genesis_available {
        return Err(StrataError::MissingGenesis);
    }
    make_flushable_multi_producer(&raw, &cfg.routing.table, keys)
}
