// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Sorted integer sets: the member *is* the sub-key, as a memcomparable
//! 8-byte integer, so iteration order equals numeric order.

use codec::number::{NumberDecoder, NumberEncoder};
use engine_traits::{IterOptions, Iterable, Iterator, KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::{InternalKey, CF_CODE_DATA};
use crate::storage::metadata::{Metadata, RedisType};
use crate::storage::Storage;

pub struct SortedintDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> SortedintDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> SortedintDb<'a, E> {
        SortedintDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::Sortedint, ns_key)
    }

    fn id_sub_key(id: i64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.encode_i64(id).unwrap();
        buf
    }

    pub fn card(&self, user_key: &[u8]) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        match self.get_metadata(&ns_key) {
            Ok(metadata) => Ok(metadata.size),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn add(&self, batch: &mut E::WriteBatch, user_key: &[u8], ids: &[i64]) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Sortedint, true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Sortedint).encode())?;
        let mut added = 0i64;
        for &id in ids {
            let sub_key =
                self.db
                    .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &Self::id_sub_key(id))?;
            if self.db.storage.engine().get_value(&sub_key)?.is_none() {
                local.put(&sub_key, b"")?;
                added += 1;
            }
        }
        if added > 0 {
            metadata.size += added as u32;
            local.put(&ns_key, &metadata.encode())?;
            self.db.apply(batch, local)?;
        }
        Ok(added)
    }

    pub fn remove(&self, batch: &mut E::WriteBatch, user_key: &[u8], ids: &[i64]) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Sortedint).encode())?;
        let mut removed = 0i64;
        for &id in ids {
            let sub_key =
                self.db
                    .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &Self::id_sub_key(id))?;
            if self.db.storage.engine().get_value(&sub_key)?.is_some() {
                local.delete(&sub_key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            metadata.size -= removed as u32;
            if metadata.size == 0 {
                local.delete(&ns_key)?;
            } else {
                local.put(&ns_key, &metadata.encode())?;
            }
            self.db.apply(batch, local)?;
        }
        Ok(removed)
    }

    pub fn exists(&self, user_key: &[u8], ids: &[i64]) -> Result<Vec<bool>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(vec![false; ids.len()]),
            Err(e) => return Err(e),
        };
        let snapshot = self.db.storage.engine().snapshot();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let sub_key =
                self.db
                    .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &Self::id_sub_key(id))?;
            out.push(snapshot.get_value(&sub_key)?.is_some());
        }
        Ok(out)
    }

    /// Pages `limit` ids starting `offset` past the cursor (exclusive),
    /// ascending or descending.
    pub fn range(
        &self,
        user_key: &[u8],
        cursor_id: Option<i64>,
        offset: u64,
        limit: u64,
        reversed: bool,
    ) -> Result<Vec<i64>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let (prefix, upper) =
            self.db
                .sub_key_bounds(&ns_key, CF_CODE_DATA, metadata.version)?;
        let snapshot = self.db.storage.engine().snapshot();
        let mut iter =
            snapshot.iterator_opt(IterOptions::new(Some(prefix.clone()), Some(upper.clone())))?;

        let mut valid = match (cursor_id, reversed) {
            (Some(id), false) => iter.seek(&self.db.make_sub_key(
                &ns_key,
                CF_CODE_DATA,
                metadata.version,
                &Self::id_sub_key(id),
            )?)?,
            (Some(id), true) => iter.seek_for_prev(&self.db.make_sub_key(
                &ns_key,
                CF_CODE_DATA,
                metadata.version,
                &Self::id_sub_key(id),
            )?)?,
            (None, false) => iter.seek_to_first()?,
            (None, true) => iter.seek_to_last()?,
        };

        let mut out = Vec::new();
        let mut skipped = 0u64;
        while valid && (out.len() as u64) < limit {
            let ikey = InternalKey::decode(iter.key(), self.db.storage.is_slot_id_encoded())?;
            let mut input = ikey.sub_key();
            let id = input.decode_i64().map_err(Error::Codec)?;
            let at_cursor = cursor_id == Some(id);
            if !at_cursor {
                if skipped < offset {
                    skipped += 1;
                } else {
                    out.push(id);
                }
            }
            valid = if reversed { iter.prev()? } else { iter.next()? };
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine_memory::MemoryEngine;

    use super::*;

    fn storage() -> Arc<Storage<MemoryEngine>> {
        Arc::new(Storage::new(MemoryEngine::new()))
    }

    #[test]
    fn test_add_remove_exists() {
        let storage = storage();
        let si = SortedintDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(si.add(&mut batch, b"si", &[4, 1, 3, 1]).unwrap(), 3);
        assert_eq!(si.card(b"si").unwrap(), 3);
        assert_eq!(si.exists(b"si", &[1, 2]).unwrap(), vec![true, false]);
        assert_eq!(si.remove(&mut batch, b"si", &[1, 9]).unwrap(), 1);
        assert_eq!(si.card(b"si").unwrap(), 2);
    }

    #[test]
    fn test_range_numeric_order() {
        let storage = storage();
        let si = SortedintDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        si.add(&mut batch, b"si", &[10, -5, 0, 7, 200]).unwrap();
        assert_eq!(
            si.range(b"si", None, 0, 100, false).unwrap(),
            vec![-5, 0, 7, 10, 200]
        );
        assert_eq!(
            si.range(b"si", None, 0, 100, true).unwrap(),
            vec![200, 10, 7, 0, -5]
        );
        assert_eq!(si.range(b"si", None, 1, 2, false).unwrap(), vec![0, 7]);
        // The cursor id itself is excluded.
        assert_eq!(si.range(b"si", Some(7), 0, 2, false).unwrap(), vec![10, 200]);
        assert_eq!(si.range(b"si", Some(7), 0, 2, true).unwrap(), vec![0, -5]);
    }
}
