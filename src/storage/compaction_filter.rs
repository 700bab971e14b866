// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Background garbage collection via compaction filtering.
//!
//! Destroying a logical key only removes its metadata row; the sub-key rows
//! it strands are reaped here, the next time compaction rewrites them.
//! Compaction delivers keys in sorted order, so a metadata row is followed
//! by the sub-keys of the same logical key; a thread-local one-slot cache
//! exploits that to skip most metadata lookups. The cache is purely an
//! optimization: correctness never depends on its contents.

use std::cell::RefCell;

use engine_traits::{
    CompactionFilter, CompactionFilterContext, CompactionFilterFactory, KvEngine, Peekable,
};

use crate::errors::{Error, Result};
use crate::metrics::*;
use crate::storage::keys::{
    self, InternalKey, CF_CODE_DATA, CF_CODE_METADATA, CF_CODE_ZSET_SCORE,
};
use crate::storage::metadata::{Metadata, RedisType};

thread_local! {
    static METADATA_CACHE: RefCell<MetadataCache> = RefCell::new(MetadataCache::default());
}

#[derive(Default)]
struct MetadataCache {
    key: Vec<u8>,
    data: Vec<u8>,
}

pub struct ExpireFilterFactory<E: KvEngine> {
    engine: E,
    slot_id_encoded: bool,
}

impl<E: KvEngine> ExpireFilterFactory<E> {
    pub fn new(engine: E, slot_id_encoded: bool) -> ExpireFilterFactory<E> {
        ExpireFilterFactory {
            engine,
            slot_id_encoded,
        }
    }
}

impl<E: KvEngine> CompactionFilterFactory for ExpireFilterFactory<E> {
    fn create_compaction_filter(
        &self,
        _context: &CompactionFilterContext,
    ) -> Option<Box<dyn CompactionFilter>> {
        debug!("creating expire compaction filter");
        Some(Box::new(ExpireFilter {
            engine: self.engine.clone(),
            slot_id_encoded: self.slot_id_encoded,
        }))
    }
}

pub struct ExpireFilter<E: KvEngine> {
    engine: E,
    slot_id_encoded: bool,
}

impl<E: KvEngine> ExpireFilter<E> {
    pub fn new(engine: E, slot_id_encoded: bool) -> ExpireFilter<E> {
        ExpireFilter {
            engine,
            slot_id_encoded,
        }
    }

    fn decide(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let (table_id, user_key, cf_code) =
            keys::extract_namespace_key(key, self.slot_id_encoded)?;
        match cf_code {
            CF_CODE_METADATA => {
                // The sub-keys of this logical key come right behind in
                // compaction order; remember the row for them. Populate
                // even when the row is dropped: version checks against a
                // doomed metadata row must still see it this run.
                METADATA_CACHE.with(|cache| {
                    let mut cache = cache.borrow_mut();
                    cache.key = key.to_vec();
                    cache.data = value.to_vec();
                });
                let metadata = Metadata::decode(value)?;
                let drop = metadata.expired();
                if drop {
                    COMPACTION_FILTERED.inc();
                }
                Ok(drop)
            }
            CF_CODE_DATA | CF_CODE_ZSET_SCORE => {
                let ikey = InternalKey::decode(key, self.slot_id_encoded)?;
                let metadata_key = keys::compose_namespace_key(
                    table_id,
                    &user_key,
                    self.slot_id_encoded,
                    CF_CODE_METADATA,
                );
                let metadata_bytes = METADATA_CACHE.with(|cache| {
                    let cache = cache.borrow();
                    if cache.key == metadata_key {
                        Some(cache.data.clone())
                    } else {
                        None
                    }
                });
                let metadata_bytes = match metadata_bytes {
                    Some(bytes) => Some(bytes),
                    None => self.engine.get_value(&metadata_key)?,
                };
                let drop = match metadata_bytes {
                    // Orphan: the logical key was destroyed.
                    None => true,
                    Some(bytes) if bytes.is_empty() => true,
                    Some(bytes) => {
                        let metadata = Metadata::decode(&bytes)?;
                        // Overwritten as a plain string, or a stale
                        // generation. Expiry is not checked here: expired
                        // sub-keys become orphans once the metadata row is
                        // dropped first.
                        metadata.redis_type() == RedisType::String
                            || ikey.version() != metadata.version
                    }
                };
                if drop {
                    COMPACTION_ORPHAN_DROPPED.inc();
                }
                Ok(drop)
            }
            _ => {
                COMPACTION_UNKNOWN_CF.inc();
                debug!("unknown cfcode in compaction filter"; "cf_code" => cf_code);
                Err(Error::Other(format!("unknown cfcode {}", cf_code)))
            }
        }
    }
}

impl<E: KvEngine> CompactionFilter for ExpireFilter<E> {
    fn filter(&mut self, _level: usize, key: &[u8], value: &[u8]) -> bool {
        match self.decide(key, value) {
            Ok(drop) => drop,
            // Fail safe: a row we cannot decode is never dropped.
            Err(e) => {
                COMPACTION_FILTER_FAILURE.inc();
                debug!("compaction filter decode failure"; "err" => %e);
                false
            }
        }
    }
}

/// Whether a metadata row's value is expired. Thin helper for hosts that
/// inspect rows without running the filter.
pub fn metadata_value_expired(value: &[u8]) -> bool {
    Metadata::decode(value).map(|m| m.expired()).unwrap_or(false)
}

/// The absolute expiration timestamp of a metadata row's value, 0 when the
/// row has no TTL or does not decode.
pub fn metadata_value_expire_ts(value: &[u8]) -> u32 {
    Metadata::decode(value).map(|m| m.expire).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use engine_memory::MemoryEngine;
    use engine_traits::{KvEngine, Mutable, WriteBatch};

    use super::*;
    use crate::storage::metadata::ListMetadata;

    fn put(engine: &MemoryEngine, key: &[u8], value: &[u8]) {
        let mut wb = engine.write_batch();
        wb.put(key, value).unwrap();
        engine.write(&wb).unwrap();
    }

    #[test]
    fn test_metadata_row_decisions() {
        let engine = MemoryEngine::new();
        let mut filter = ExpireFilter::new(engine.clone(), false);

        let ns_key = keys::compose_namespace_key(1, b"h", false, CF_CODE_METADATA);
        let mut meta = Metadata::new(RedisType::Hash, true);
        meta.size = 2;
        assert!(!filter.filter(0, &ns_key, &meta.encode()));

        meta.expire = 1;
        assert!(filter.filter(0, &ns_key, &meta.encode()));

        // Empty composite keys read as absent.
        meta.expire = 0;
        meta.size = 0;
        assert!(filter.filter(0, &ns_key, &meta.encode()));

        // Undecodable rows are kept.
        assert!(!filter.filter(0, &ns_key, &[0x02]));
    }

    #[test]
    fn test_sub_key_row_decisions() {
        let engine = MemoryEngine::new();
        let mut filter = ExpireFilter::new(engine.clone(), false);

        let ns_key = keys::compose_namespace_key(1, b"h", false, CF_CODE_METADATA);
        let mut meta = Metadata::new(RedisType::Hash, true);
        meta.size = 1;
        put(&engine, &ns_key, &meta.encode());

        let live = InternalKey::from_ns_key(&ns_key, b"f", meta.version, false, CF_CODE_DATA)
            .unwrap()
            .encode();
        assert!(!filter.filter(0, &live, b"v"));

        // Stale generation.
        let stale = InternalKey::from_ns_key(&ns_key, b"f", meta.version - 1, false, CF_CODE_DATA)
            .unwrap()
            .encode();
        assert!(filter.filter(0, &stale, b"v"));

        // Orphan: no metadata at all.
        let other_ns = keys::compose_namespace_key(1, b"gone", false, CF_CODE_METADATA);
        let orphan = InternalKey::from_ns_key(&other_ns, b"f", 7, false, CF_CODE_DATA)
            .unwrap()
            .encode();
        assert!(filter.filter(0, &orphan, b"v"));

        // Rebound as a plain string.
        let s_ns = keys::compose_namespace_key(1, b"s", false, CF_CODE_METADATA);
        let mut s_meta = Metadata::new(RedisType::String, false).encode();
        s_meta.extend_from_slice(b"body");
        put(&engine, &s_ns, &s_meta);
        let rebound = InternalKey::from_ns_key(&s_ns, b"f", 3, false, CF_CODE_DATA)
            .unwrap()
            .encode();
        assert!(filter.filter(0, &rebound, b"v"));
    }

    #[test]
    fn test_expired_metadata_keeps_sub_keys_one_pass() {
        // Pass one drops the metadata but keeps version-matching sub-keys;
        // they only become orphans on the next pass.
        let engine = MemoryEngine::new();
        let mut filter = ExpireFilter::new(engine.clone(), false);

        let ns_key = keys::compose_namespace_key(1, b"h", false, CF_CODE_METADATA);
        let mut meta = Metadata::new(RedisType::Hash, true);
        meta.size = 1;
        meta.expire = 1;
        put(&engine, &ns_key, &meta.encode());

        assert!(filter.filter(0, &ns_key, &meta.encode()));
        let sub = InternalKey::from_ns_key(&ns_key, b"f", meta.version, false, CF_CODE_DATA)
            .unwrap()
            .encode();
        // Metadata still present in the store this run.
        assert!(!filter.filter(0, &sub, b"v"));
    }

    #[test]
    fn test_list_metadata_decodes_for_filter() {
        let mut list_meta = ListMetadata::new(true);
        list_meta.meta.size = 1;
        assert!(!metadata_value_expired(&list_meta.encode()));
        list_meta.meta.expire = 1;
        assert!(metadata_value_expired(&list_meta.encode()));
        assert_eq!(metadata_value_expire_ts(&list_meta.encode()), 1);
    }
}
