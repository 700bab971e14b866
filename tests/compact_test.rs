// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Compaction-filter garbage collection over the physical keyspace: an
//! expired logical key loses its metadata row on the first pass, and its
//! orphaned sub-keys on the next.

use std::sync::Arc;

use engine_memory::MemoryEngine;
use engine_traits::KvEngine;
use rockdis::storage::keys::{extract_namespace_key, CF_CODE_METADATA};
use rockdis::storage::Storage;
use rockdis::types::{HashDb, MemberScore, ZSetDb};

fn live_user_keys(engine: &MemoryEngine) -> Vec<(Vec<u8>, i64)> {
    engine
        .all_keys()
        .iter()
        .map(|k| {
            let (_, user_key, cf_code) = extract_namespace_key(k, false).unwrap();
            (user_key, cf_code)
        })
        .collect()
}

#[test]
fn test_expired_hash_collected_in_two_passes() {
    let engine = MemoryEngine::new();
    let storage = Arc::new(Storage::new(engine.clone()));
    storage.install_compaction_filter();

    let hash = HashDb::new(&storage, 1);
    let mut batch = engine.write_batch();
    hash.set(&mut batch, b"expire_hash_key", b"f1", b"v1").unwrap();
    hash.set(&mut batch, b"expire_hash_key", b"f2", b"v2").unwrap();
    hash.set(&mut batch, b"live_hash_key", b"f1", b"v1").unwrap();
    hash.set(&mut batch, b"live_hash_key", b"f2", b"v2").unwrap();

    // Absolute timestamp far in the past: expired immediately.
    let db = rockdis::storage::Database::new(&storage, 1);
    assert!(db.expire(&mut batch, b"expire_hash_key", 1).unwrap());
    std::thread::sleep(std::time::Duration::from_millis(10));

    // Pass one: the expired metadata row goes away, its sub-keys stay.
    engine.compact_range(None, None).unwrap();
    let rows = live_user_keys(&engine);
    assert!(rows
        .iter()
        .all(|(k, cf)| k == b"live_hash_key" || *cf != CF_CODE_METADATA));
    assert!(rows.iter().any(|(k, _)| k == b"expire_hash_key"));

    // Pass two: the orphaned sub-keys follow.
    engine.compact_range(None, None).unwrap();
    let rows = live_user_keys(&engine);
    assert_eq!(rows.len(), 3); // metadata + two fields
    assert!(rows.iter().all(|(k, _)| k == b"live_hash_key"));
}

#[test]
fn test_expired_zset_rows_collected() {
    let engine = MemoryEngine::new();
    let storage = Arc::new(Storage::new(engine.clone()));
    storage.install_compaction_filter();

    let zset = ZSetDb::new(&storage, 1);
    let mut batch = engine.write_batch();
    zset.add(
        &mut batch,
        b"expire_zset_key",
        Default::default(),
        &[
            MemberScore {
                member: b"z1".to_vec(),
                score: 1.1,
            },
            MemberScore {
                member: b"z2".to_vec(),
                score: 0.4,
            },
        ],
    )
    .unwrap();

    let db = rockdis::storage::Database::new(&storage, 1);
    assert!(db.expire(&mut batch, b"expire_zset_key", 1).unwrap());
    std::thread::sleep(std::time::Duration::from_millis(10));

    engine.compact_range(None, None).unwrap();
    engine.compact_range(None, None).unwrap();
    assert!(engine.is_empty());
}

#[test]
fn test_overwritten_composite_key_is_collected() {
    let engine = MemoryEngine::new();
    let storage = Arc::new(Storage::new(engine.clone()));
    storage.install_compaction_filter();

    let hash = HashDb::new(&storage, 1);
    let mut batch = engine.write_batch();
    hash.set(&mut batch, b"k", b"f", b"v").unwrap();

    // Rebinding as a plain string orphans the hash sub-keys.
    let string = rockdis::types::StringDb::new(&storage, 1);
    string.set(&mut batch, b"k", b"now-a-string").unwrap();

    engine.compact_range(None, None).unwrap();
    let rows = live_user_keys(&engine);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, CF_CODE_METADATA);

    let value = string.get(b"k").unwrap();
    assert_eq!(value, b"now-a-string");
}

#[test]
fn test_recreated_key_old_generation_collected() {
    let engine = MemoryEngine::new();
    let storage = Arc::new(Storage::new(engine.clone()));
    storage.install_compaction_filter();

    let hash = HashDb::new(&storage, 1);
    let db = rockdis::storage::Database::new(&storage, 1);
    let mut batch = engine.write_batch();
    hash.set(&mut batch, b"k", b"old-field", b"v").unwrap();
    assert!(db.del(&mut batch, b"k").unwrap());
    // A fresh version epoch makes the old sub-keys dead without any range
    // delete.
    hash.set(&mut batch, b"k", b"new-field", b"v").unwrap();

    engine.compact_range(None, None).unwrap();
    let hash_fields = hash.get_all(b"k").unwrap();
    assert_eq!(hash_fields.len(), 1);
    assert_eq!(hash_fields[0].field, b"new-field");
    // Exactly one metadata row and one sub-key row remain.
    assert_eq!(engine.len(), 2);
}
