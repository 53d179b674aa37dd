//! Node assembly and startup consistency tests.

mod common;

use common::keys;
use strata::config::Config;
use strata::kvdb::{DbProducer, KvStore};
use strata::runtime;
use strata::StrataError;
use tempfile::TempDir;

fn config_at(dir: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.paths.data_dir = dir.path().to_path_buf();
    cfg
}

#[test]
fn empty_datadir_without_genesis_is_fatal() {
    let dir = TempDir::new().unwrap();
    let cfg = config_at(&dir);
    let keys = keys();

    let err = runtime::open_node_stores(&cfg, &keys, false).unwrap_err();
    assert!(matches!(err, StrataError::MissingGenesis));
}

#[test]
fn stores_survive_a_clean_restart() {
    let dir = TempDir::new().unwrap();
    let cfg = config_at(&dir);
    let keys = keys();

    {
        let stores = runtime::open_node_stores(&cfg, &keys, true).unwrap();
        let gossip = stores.producer.open_db("gossip").unwrap();
        gossip.put(b"k", b"v").unwrap();
        assert!(stores.not_flushed_size() > 0);
        stores.flush().unwrap();
        assert_eq!(stores.not_flushed_size(), 0);
    }

    // A clean restart needs no genesis and sees the flushed data.
    let stores = runtime::open_node_stores(&cfg, &keys, false).unwrap();
    let gossip = stores.producer.open_db("gossip").unwrap();
    assert_eq!(gossip.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn torn_write_drops_the_whole_db_set() {
    let dir = TempDir::new().unwrap();
    let cfg = config_at(&dir);
    let keys = keys();

    // A DB that never got a flush id: the write session was torn.
    let raw = runtime::supported_dbs(&cfg.cache, &dir.path().join("chaindata"));
    {
        let db = raw["rocksdb"].open_db("gossip").unwrap();
        db.put(b"k", b"v").unwrap();
    }
    assert!(runtime::is_interrupted(&raw, &keys).unwrap());

    let stores = runtime::open_node_stores(&cfg, &keys, true).unwrap();
    drop(stores);

    // The interrupted DB was dropped, not repaired.
    assert!(raw["rocksdb"].names().is_empty());
}
