//! KV store contract and wrapper tests.

mod common;

use common::{keys, mem_producers};
use std::sync::Arc;
use strata::kvdb::flushable::{flush_id_value, is_clean, CLEAN_MARKER, DIRTY_MARKER};
use strata::kvdb::{
    CachedProducer, DbProducer, Flushable, KvStore, MemProducer, MemStore, SkipKeysStore,
    SyncedPool, Table,
};
use strata::StrataError;

fn collect(db: &dyn KvStore, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    db.iterator(prefix, &[]).map(|item| item.unwrap()).collect()
}

// ============================================================================
// Memory store
// ============================================================================

#[test]
fn iterator_respects_prefix_and_start() {
    let db = MemStore::new();
    for key in [&b"a1"[..], b"a2", b"a3", b"b1"] {
        db.put(key, b"v").unwrap();
    }

    let under_a = collect(&db, b"a");
    assert_eq!(
        under_a.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
        vec![b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec()]
    );

    let from_a2: Vec<Vec<u8>> = db
        .iterator(b"a", b"2")
        .map(|item| item.unwrap().0)
        .collect();
    assert_eq!(from_a2, vec![b"a2".to_vec(), b"a3".to_vec()]);
}

#[test]
fn batch_commit_is_applied_atomically_under_one_lock() {
    let db = MemStore::new();
    db.put(b"stale", b"v").unwrap();

    let mut batch = db.batch();
    batch.put(b"k1", b"v1").unwrap();
    batch.put(b"k2", b"v2").unwrap();
    batch.delete(b"stale").unwrap();
    assert!(batch.size_estimate() > 0);
    batch.write().unwrap();
    drop(batch);

    assert_eq!(db.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(db.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(db.get(b"stale").unwrap(), None);
}

// ============================================================================
// Table view
// ============================================================================

#[test]
fn tables_are_isolated_namespaces() {
    let db: Arc<dyn KvStore> = Arc::new(MemStore::new());
    let left = Table::new(db.clone(), b"L");
    let right = Table::new(db.clone(), b"R");

    left.put(b"k", b"left").unwrap();
    right.put(b"k", b"right").unwrap();

    assert_eq!(left.get(b"k").unwrap(), Some(b"left".to_vec()));
    assert_eq!(right.get(b"k").unwrap(), Some(b"right".to_vec()));
    assert_eq!(db.get(b"Lk").unwrap(), Some(b"left".to_vec()));

    // Yielded keys have the table prefix stripped.
    let entries = collect(&left, b"");
    assert_eq!(entries, vec![(b"k".to_vec(), b"left".to_vec())]);

    left.delete(b"k").unwrap();
    assert_eq!(left.get(b"k").unwrap(), None);
    assert_eq!(right.get(b"k").unwrap(), Some(b"right".to_vec()));
}

// ============================================================================
// Skip-keys wrapper
// ============================================================================

#[test]
fn reserved_keys_are_invisible_to_iteration() {
    let keys = keys();
    let db: Arc<dyn KvStore> = Arc::new(MemStore::new());
    db.put(&keys.flush_id_key, &flush_id_value(CLEAN_MARKER, 1))
        .unwrap();
    db.put(b"app", b"v").unwrap();

    let wrapped = SkipKeysStore::new(db, &keys.metadata_prefix);
    let visible = collect(&wrapped, b"");
    assert_eq!(visible, vec![(b"app".to_vec(), b"v".to_vec())]);

    // Direct addressing still works.
    assert!(wrapped.get(&keys.flush_id_key).unwrap().is_some());
}

// ============================================================================
// Cached producer
// ============================================================================

#[test]
fn cached_producer_memoizes_handles() {
    let inner: Arc<dyn DbProducer> = Arc::new(MemProducer::new());
    let cached = CachedProducer::new(inner);

    let first = cached.open_db("main").unwrap();
    let second = cached.open_db("main").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    cached.destroy_db("main").unwrap();
    let third = cached.open_db("main").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

// ============================================================================
// Flushable wrapper
// ============================================================================

#[test]
fn buffered_writes_are_visible_before_flush() {
    let inner = Arc::new(MemStore::new());
    let flushable = Flushable::new(inner.clone() as Arc<dyn KvStore>);

    flushable.put(b"k", b"v").unwrap();
    assert_eq!(flushable.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(inner.get(b"k").unwrap(), None);
    assert!(flushable.not_flushed_size() > 0);

    flushable.flush().unwrap();
    assert_eq!(inner.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(flushable.not_flushed_size(), 0);
}

#[test]
fn iteration_merges_the_buffer_over_the_store() {
    let inner = Arc::new(MemStore::new());
    inner.put(b"a", b"old").unwrap();
    inner.put(b"b", b"kept").unwrap();
    inner.put(b"c", b"doomed").unwrap();

    let flushable = Flushable::new(inner as Arc<dyn KvStore>);
    flushable.put(b"a", b"new").unwrap();
    flushable.delete(b"c").unwrap();
    flushable.put(b"d", b"added").unwrap();

    let entries = collect(&flushable, b"");
    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), b"new".to_vec()),
            (b"b".to_vec(), b"kept".to_vec()),
            (b"d".to_vec(), b"added".to_vec()),
        ]
    );
}

// ============================================================================
// Synced pool / flush-id protocol
// ============================================================================

#[test]
fn flush_marks_every_member_clean_under_one_id() {
    let keys = keys();
    let producers = mem_producers();
    let pool = SyncedPool::new(producers["memory"].clone(), keys.flush_id_key.clone());

    let a = pool.open_db("a").unwrap();
    let b = pool.open_db("b").unwrap();
    a.put(b"k", b"v").unwrap();
    b.put(b"k", b"v").unwrap();

    pool.flush(42).unwrap();

    for name in ["a", "b"] {
        let raw = producers["memory"].open_db(name).unwrap();
        let value = raw.get(&keys.flush_id_key).unwrap().unwrap();
        assert!(is_clean(&value));
        assert_eq!(value, flush_id_value(CLEAN_MARKER, 42));
        assert_eq!(raw.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    // A fresh pool over the same DBs initializes cleanly.
    let reopened = SyncedPool::new(producers["memory"].clone(), keys.flush_id_key.clone());
    let id = reopened
        .initialize(&producers["memory"].names(), None)
        .unwrap();
    assert_eq!(id, Some(flush_id_value(CLEAN_MARKER, 42)));
}

#[test]
fn initialize_rejects_a_dirty_member() {
    let keys = keys();
    let producers = mem_producers();

    let raw = producers["memory"].open_db("a").unwrap();
    raw.put(&keys.flush_id_key, &flush_id_value(DIRTY_MARKER, 7))
        .unwrap();

    let pool = SyncedPool::new(producers["memory"].clone(), keys.flush_id_key.clone());
    let err = pool
        .initialize(&producers["memory"].names(), None)
        .unwrap_err();
    assert!(matches!(err, StrataError::TornWrite { .. }));
}

#[test]
fn initialize_rejects_a_missing_flush_id() {
    let keys = keys();
    let producers = mem_producers();
    producers["memory"].open_db("a").unwrap();

    let pool = SyncedPool::new(producers["memory"].clone(), keys.flush_id_key.clone());
    let err = pool
        .initialize(&producers["memory"].names(), None)
        .unwrap_err();
    assert!(matches!(err, StrataError::TornWrite { .. }));
}
