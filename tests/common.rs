//! Common test utilities.
//!
//! Shared helpers for integration tests. Import with `mod common;` in test
//! files.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use strata::config::{DbCacheConfig, ReservedKeys};
use strata::kvdb::{DbProducer, KvStore, MemProducer, RocksProducer};
use strata::multidb::{write_tables_list, Route, TableRecord, TypeName};

/// Reserved key layout used across the tests.
pub fn keys() -> ReservedKeys {
    ReservedKeys::default()
}

/// A single-type in-memory producer map under the type tag "memory".
pub fn mem_producers() -> HashMap<TypeName, Arc<dyn DbProducer>> {
    HashMap::from([(
        "memory".to_string(),
        Arc::new(MemProducer::new()) as Arc<dyn DbProducer>,
    )])
}

/// A single-type rocksdb producer map rooted at `<root>/rocksdb`.
pub fn rocks_producers(root: &Path) -> HashMap<TypeName, Arc<dyn DbProducer>> {
    HashMap::from([(
        "rocksdb".to_string(),
        Arc::new(RocksProducer::new(root.join("rocksdb"), DbCacheConfig::default()))
            as Arc<dyn DbProducer>,
    )])
}

/// Build a route.
pub fn route(db_type: &str, name: &str, table: &str) -> Route {
    Route {
        db_type: db_type.to_string(),
        name: name.to_string(),
        table: table.to_string(),
        no_drop: false,
    }
}

/// Build a route table from pattern/route pairs.
pub fn routing_table(entries: &[(&str, Route)]) -> HashMap<String, Route> {
    entries
        .iter()
        .map(|(pattern, route)| (pattern.to_string(), route.clone()))
        .collect()
}

/// Seed a physical DB with table records and prefixed data.
pub fn seed_db(
    producers: &HashMap<TypeName, Arc<dyn DbProducer>>,
    keys: &ReservedKeys,
    db_type: &str,
    name: &str,
    records: &[(&str, &str)],
    data: &[(&str, &[u8], &[u8])],
) {
    let db = producers[db_type].open_db(name).expect("open seeded DB");
    let records: Vec<TableRecord> = records
        .iter()
        .map(|(req, table)| TableRecord {
            req: req.to_string(),
            table: table.to_string(),
        })
        .collect();
    write_tables_list(db.as_ref(), &keys.tables_key, &records).expect("write table records");
    for (table, key, value) in data {
        let mut full = table.as_bytes().to_vec();
        full.extend_from_slice(key);
        db.put(&full, value).expect("seed key");
    }
}

/// Collect all entries under a prefix, reserved keys excluded.
pub fn collect_app_entries(
    db: &dyn KvStore,
    keys: &ReservedKeys,
    prefix: &[u8],
) -> Vec<(Vec<u8>, Vec<u8>)> {
    db.iterator(prefix, &[])
        .map(|item| item.expect("iterate"))
        .filter(|(key, _)| !key.starts_with(&keys.metadata_prefix))
        .collect()
}
