// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Lists: sub-keys are 64-bit indexes in `[head, tail)`, tail exclusive.
//!
//! Cursors start in the middle of the index domain so both ends can grow
//! for a long time. Interior deletions (LREM) leave holes: the cursors stay
//! authoritative for the span, and readers count positions in iteration
//! order instead of doing index arithmetic.

use codec::number::{NumberDecoder, NumberEncoder};
use engine_traits::{IterOptions, Iterable, Iterator, KvEngine, Mutable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::types::list_range as resolve_range;
use crate::storage::keys::CF_CODE_DATA;
use crate::storage::metadata::{ListMetadata, Metadata, RedisCommand, RedisType};
use crate::storage::Storage;

pub struct ListDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

/// One physical row of a list: its index and its element.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ListEntry {
    index: u64,
    elem: Vec<u8>,
}

impl<'a, E: KvEngine> ListDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> ListDb<'a, E> {
        ListDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<ListMetadata> {
        let raw = self.db.get_raw_metadata(ns_key)?;
        // Type and expiry are decided on the common prefix before the list
        // extension is required to be present.
        let metadata = Metadata::decode(&raw)?;
        if metadata.expired() {
            return Err(Error::Expired);
        }
        if metadata.redis_type() != RedisType::List {
            return Err(Error::WrongType);
        }
        ListMetadata::decode(&raw)
    }

    fn index_sub_key(index: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.encode_u64(index).unwrap();
        buf
    }

    fn sub_key_for(&self, ns_key: &[u8], version: u64, index: u64) -> Result<Vec<u8>> {
        self.db
            .make_sub_key(ns_key, CF_CODE_DATA, version, &Self::index_sub_key(index))
    }

    /// All live rows in index order. Holes from interior deletions simply
    /// do not appear.
    fn entries(&self, ns_key: &[u8], metadata: &ListMetadata) -> Result<Vec<ListEntry>> {
        let snapshot = self.db.storage.engine().snapshot();
        let rows =
            self.db
                .scan_sub_keys(&snapshot, ns_key, CF_CODE_DATA, metadata.meta.version)?;
        let mut out = Vec::with_capacity(rows.len());
        for (sub_key, elem) in rows {
            let mut input = sub_key.as_slice();
            let index = input.decode_u64().map_err(Error::Codec)?;
            out.push(ListEntry { index, elem });
        }
        Ok(out)
    }

    pub fn size(&self, user_key: &[u8]) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        match self.get_metadata(&ns_key) {
            Ok(metadata) => Ok(metadata.meta.size),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn push(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        elems: &[&[u8]],
        left: bool,
    ) -> Result<u32> {
        self.push_impl(batch, user_key, elems, true, left)
    }

    /// Push-if-exists; absent keys stay absent and report length 0.
    pub fn push_x(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        elems: &[&[u8]],
        left: bool,
    ) -> Result<u32> {
        self.push_impl(batch, user_key, elems, false, left)
    }

    fn push_impl(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        elems: &[&[u8]],
        create_if_missing: bool,
        left: bool,
    ) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => {
                if !create_if_missing {
                    return Ok(0);
                }
                ListMetadata::new(true)
            }
            Err(e) => return Err(e),
        };

        let cmd = if left {
            RedisCommand::LPush
        } else {
            RedisCommand::RPush
        };
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::with_command(RedisType::List, cmd).encode())?;
        for elem in elems {
            let index = if left {
                metadata.head -= 1;
                metadata.head
            } else {
                let index = metadata.tail;
                metadata.tail += 1;
                index
            };
            let sub_key = self.sub_key_for(&ns_key, metadata.meta.version, index)?;
            local.put(&sub_key, elem)?;
        }
        metadata.meta.size += elems.len() as u32;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(metadata.meta.size)
    }

    pub fn pop(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        left: bool,
    ) -> Result<Option<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entry = match self.edge_entry(&ns_key, &metadata, left)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let cmd = if left {
            RedisCommand::LPop
        } else {
            RedisCommand::RPop
        };
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::with_command(RedisType::List, cmd).encode())?;
        local.delete(&self.sub_key_for(&ns_key, metadata.meta.version, entry.index)?)?;
        metadata.meta.size -= 1;
        if metadata.meta.size == 0 {
            local.delete(&ns_key)?;
        } else {
            if left {
                metadata.head = entry.index + 1;
            } else {
                metadata.tail = entry.index;
            }
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(Some(entry.elem))
    }

    /// The first (or last) live row of the current generation.
    fn edge_entry(
        &self,
        ns_key: &[u8],
        metadata: &ListMetadata,
        left: bool,
    ) -> Result<Option<ListEntry>> {
        let (prefix, upper) =
            self.db
                .sub_key_bounds(ns_key, CF_CODE_DATA, metadata.meta.version)?;
        let snapshot = self.db.storage.engine().snapshot();
        let mut iter =
            snapshot.iterator_opt(IterOptions::new(Some(prefix.clone()), Some(upper)))?;
        let valid = if left {
            iter.seek_to_first()?
        } else {
            iter.seek_to_last()?
        };
        if !valid {
            return Ok(None);
        }
        let ikey = crate::storage::keys::InternalKey::decode(
            iter.key(),
            self.db.storage.is_slot_id_encoded(),
        )?;
        let mut input = ikey.sub_key();
        let index = input.decode_u64().map_err(Error::Codec)?;
        Ok(Some(ListEntry {
            index,
            elem: iter.value().to_vec(),
        }))
    }

    pub fn index(&self, user_key: &[u8], index: i64) -> Result<Vec<u8>> {
        let mut elems = self.range(user_key, index, index)?;
        match elems.pop() {
            Some(elem) => Ok(elem),
            None => Err(Error::NotFound),
        }
    }

    /// Elements at positions `[start, stop]`, both ends resolved against
    /// the live length, positions counted in iteration order.
    pub fn range(&self, user_key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let len = metadata.meta.size as i64;
        let (start, stop) = match resolve_range(start, stop, len) {
            Some(range) => range,
            None => return Ok(Vec::new()),
        };
        let entries = self.entries(&ns_key, &metadata)?;
        Ok(entries
            .into_iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|e| e.elem)
            .collect())
    }

    /// Rewrites the element at a logical position.
    pub fn set(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        index: i64,
        elem: &[u8],
    ) -> Result<()> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let metadata = self.get_metadata(&ns_key)?;
        let len = metadata.meta.size as i64;
        let pos = if index < 0 { len + index } else { index };
        if pos < 0 || pos >= len {
            return Err(Error::NotFound);
        }
        let entries = self.entries(&ns_key, &metadata)?;
        let entry = &entries[pos as usize];

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LSet).encode(),
        )?;
        local.put(
            &self.sub_key_for(&ns_key, metadata.meta.version, entry.index)?,
            elem,
        )?;
        self.db.apply(batch, local)
    }

    /// Inserts `elem` before or after the first occurrence of `pivot`,
    /// shifting whichever side is shorter. Returns the new length, or -1
    /// when the pivot is missing.
    pub fn insert(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        pivot: &[u8],
        elem: &[u8],
        before: bool,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(-1),
            Err(e) => return Err(e),
        };
        let entries = self.entries(&ns_key, &metadata)?;
        let pivot_pos = match entries.iter().position(|e| e.elem == pivot) {
            Some(pos) => pos,
            None => return Ok(-1),
        };
        // Logical position the new element will occupy.
        let ins = if before { pivot_pos } else { pivot_pos + 1 };
        let len = entries.len();

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LInsert).encode(),
        )?;
        let version = metadata.meta.version;
        if ins <= len - ins {
            // Rewrite the front half one slot to the left, compacted
            // against the anchor row that will follow the new element.
            // `ins <= len / 2` here, so the anchor row always exists.
            let anchor = entries[ins].index;
            for e in &entries[..ins] {
                local.delete(&self.sub_key_for(&ns_key, version, e.index)?)?;
            }
            let new_head = anchor - ins as u64 - 1;
            for (j, e) in entries[..ins].iter().enumerate() {
                local.put(
                    &self.sub_key_for(&ns_key, version, new_head + j as u64)?,
                    &e.elem,
                )?;
            }
            local.put(&self.sub_key_for(&ns_key, version, anchor - 1)?, elem)?;
            metadata.head = new_head;
        } else {
            // Rewrite the back half one slot to the right.
            let anchor = entries[ins - 1].index;
            for e in &entries[ins..] {
                local.delete(&self.sub_key_for(&ns_key, version, e.index)?)?;
            }
            local.put(&self.sub_key_for(&ns_key, version, anchor + 1)?, elem)?;
            for (j, e) in entries[ins..].iter().enumerate() {
                local.put(
                    &self.sub_key_for(&ns_key, version, anchor + 2 + j as u64)?,
                    &e.elem,
                )?;
            }
            metadata.tail = anchor + 2 + (len - ins) as u64;
        }
        metadata.meta.size += 1;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(metadata.meta.size as i64)
    }

    /// Deletes up to `|count|` occurrences of `elem` (all when zero), from
    /// the head when `count >= 0`, from the tail otherwise. Interior rows
    /// are not rewritten; the cursors only move inward.
    pub fn rem(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        count: i64,
        elem: &[u8],
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };
        let entries = self.entries(&ns_key, &metadata)?;

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut doomed = Vec::new();
        if count >= 0 {
            for e in &entries {
                if e.elem == elem && doomed.len() < limit {
                    doomed.push(e.index);
                }
            }
        } else {
            for e in entries.iter().rev() {
                if e.elem == elem && doomed.len() < limit {
                    doomed.push(e.index);
                }
            }
        }
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LRem).encode(),
        )?;
        for &index in &doomed {
            local.delete(&self.sub_key_for(&ns_key, metadata.meta.version, index)?)?;
        }
        let remaining: Vec<&ListEntry> =
            entries.iter().filter(|e| !doomed.contains(&e.index)).collect();
        metadata.meta.size -= doomed.len() as u32;
        if remaining.is_empty() {
            local.delete(&ns_key)?;
        } else {
            metadata.head = remaining.first().unwrap().index;
            metadata.tail = remaining.last().unwrap().index + 1;
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(doomed.len() as i64)
    }

    /// Deletes every element outside `[start, stop]` and pulls the cursors
    /// in around the kept window.
    pub fn trim(&self, batch: &mut E::WriteBatch, user_key: &[u8], start: i64, stop: i64) -> Result<()> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(()),
            Err(e) => return Err(e),
        };
        let entries = self.entries(&ns_key, &metadata)?;
        let len = entries.len() as i64;
        let kept = resolve_range(start, stop, len);

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LTrim).encode(),
        )?;
        match kept {
            None => {
                for e in &entries {
                    local.delete(&self.sub_key_for(&ns_key, metadata.meta.version, e.index)?)?;
                }
                local.delete(&ns_key)?;
            }
            Some((start, stop)) => {
                for (pos, e) in entries.iter().enumerate() {
                    let pos = pos as i64;
                    if pos < start || pos > stop {
                        local
                            .delete(&self.sub_key_for(&ns_key, metadata.meta.version, e.index)?)?;
                    }
                }
                metadata.head = entries[start as usize].index;
                metadata.tail = entries[stop as usize].index + 1;
                metadata.meta.size = (stop - start + 1) as u32;
                local.put(&ns_key, &metadata.encode())?;
            }
        }
        self.db.apply(batch, local)
    }

    pub fn rpoplpush(
        &self,
        batch: &mut E::WriteBatch,
        src: &[u8],
        dst: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.lmove(batch, src, dst, false, true)
    }

    /// Pops one side of `src` and pushes one side of `dst` atomically.
    pub fn lmove(
        &self,
        batch: &mut E::WriteBatch,
        src: &[u8],
        dst: &[u8],
        src_left: bool,
        dst_left: bool,
    ) -> Result<Option<Vec<u8>>> {
        if src == dst {
            return self.lmove_single(batch, src, src_left, dst_left);
        }
        let src_ns = self.db.encode_namespace_prefix(src);
        let dst_ns = self.db.encode_namespace_prefix(dst);
        let _guards = self
            .db
            .storage
            .lock_manager()
            .multi_lock(&[src_ns.as_slice(), dst_ns.as_slice()]);

        let mut src_meta = match self.get_metadata(&src_ns) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry = match self.edge_entry(&src_ns, &src_meta, src_left)? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let mut dst_meta = match self.get_metadata(&dst_ns) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => ListMetadata::new(true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LMove).encode(),
        )?;
        local.delete(&self.sub_key_for(&src_ns, src_meta.meta.version, entry.index)?)?;
        src_meta.meta.size -= 1;
        if src_meta.meta.size == 0 {
            local.delete(&src_ns)?;
        } else {
            if src_left {
                src_meta.head = entry.index + 1;
            } else {
                src_meta.tail = entry.index;
            }
            local.put(&src_ns, &src_meta.encode())?;
        }

        let dst_index = if dst_left {
            dst_meta.head -= 1;
            dst_meta.head
        } else {
            let index = dst_meta.tail;
            dst_meta.tail += 1;
            index
        };
        local.put(
            &self.sub_key_for(&dst_ns, dst_meta.meta.version, dst_index)?,
            &entry.elem,
        )?;
        dst_meta.meta.size += 1;
        local.put(&dst_ns, &dst_meta.encode())?;

        self.db.apply(batch, local)?;
        Ok(Some(entry.elem))
    }

    /// Source and destination are the same key: one lock, one rotation.
    fn lmove_single(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        src_left: bool,
        dst_left: bool,
    ) -> Result<Option<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry = match self.edge_entry(&ns_key, &metadata, src_left)? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if src_left == dst_left {
            return Ok(Some(entry.elem));
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::List, RedisCommand::LMove).encode(),
        )?;
        let version = metadata.meta.version;
        local.delete(&self.sub_key_for(&ns_key, version, entry.index)?)?;
        if src_left {
            metadata.head = entry.index + 1;
        } else {
            metadata.tail = entry.index;
        }
        let dst_index = if dst_left {
            metadata.head -= 1;
            metadata.head
        } else {
            let index = metadata.tail;
            metadata.tail += 1;
            index
        };
        local.put(&self.sub_key_for(&ns_key, version, dst_index)?, &entry.elem)?;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(Some(entry.elem))
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

    fn push_all(list: &ListDb<'_, MemoryEngine>, key: &[u8], elems: &[&[u8]], left: bool) -> u32 {
        let mut batch = list.db.storage.engine().write_batch();
        list.push(&mut batch, key, elems, left).unwrap()
    }

    #[test]
    fn test_push_pop_both_ends() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();

        assert_eq!(push_all(&list, b"l", &[b"b", b"a"], true), 2);
        assert_eq!(push_all(&list, b"l", &[b"c", b"d"], false), 4);
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );

        assert_eq!(list.pop(&mut batch, b"l", true).unwrap().unwrap(), b"a");
        assert_eq!(list.pop(&mut batch, b"l", false).unwrap().unwrap(), b"d");
        assert_eq!(list.size(b"l").unwrap(), 2);
        assert_eq!(list.pop(&mut batch, b"l", true).unwrap().unwrap(), b"b");
        assert_eq!(list.pop(&mut batch, b"l", true).unwrap().unwrap(), b"c");
        assert_eq!(list.pop(&mut batch, b"l", true).unwrap(), None);
        // Fully drained lists read as absent.
        assert_eq!(list.size(b"l").unwrap(), 0);
    }

    #[test]
    fn test_pushx_needs_existing() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(list.push_x(&mut batch, b"l", &[b"a"], true).unwrap(), 0);
        push_all(&list, b"l", &[b"a"], true);
        assert_eq!(list.push_x(&mut batch, b"l", &[b"b"], false).unwrap(), 2);
    }

    #[test]
    fn test_index_and_set() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"a", b"b", b"c"], false);
        assert_eq!(list.index(b"l", 0).unwrap(), b"a");
        assert_eq!(list.index(b"l", -1).unwrap(), b"c");
        assert!(matches!(list.index(b"l", 9), Err(Error::NotFound)));

        list.set(&mut batch, b"l", 1, b"B").unwrap();
        assert_eq!(list.index(b"l", 1).unwrap(), b"B");
        assert!(matches!(
            list.set(&mut batch, b"l", 9, b"x"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_insert_before_after() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"a", b"c"], false);
        assert_eq!(list.insert(&mut batch, b"l", b"c", b"b", true).unwrap(), 3);
        assert_eq!(list.insert(&mut batch, b"l", b"c", b"d", false).unwrap(), 4);
        assert_eq!(list.insert(&mut batch, b"l", b"zz", b"x", true).unwrap(), -1);
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }

    #[test]
    fn test_insert_at_edges() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"m"], false);
        list.insert(&mut batch, b"l", b"m", b"first", true).unwrap();
        list.insert(&mut batch, b"l", b"m", b"last", false).unwrap();
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"first".to_vec(), b"m".to_vec(), b"last".to_vec()]
        );
    }

    #[test]
    fn test_rem_directions_and_holes() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"x", b"a", b"x", b"b", b"x"], false);

        assert_eq!(list.rem(&mut batch, b"l", 1, b"x").unwrap(), 1);
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"x".to_vec(), b"b".to_vec(), b"x".to_vec()]
        );

        assert_eq!(list.rem(&mut batch, b"l", -1, b"x").unwrap(), 1);
        // The interior hole stays; readers keep counting positions.
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"x".to_vec(), b"b".to_vec()]
        );
        assert_eq!(list.index(b"l", 1).unwrap(), b"x");

        assert_eq!(list.rem(&mut batch, b"l", 0, b"x").unwrap(), 1);
        assert_eq!(list.size(b"l").unwrap(), 2);
    }

    #[test]
    fn test_trim() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"a", b"b", b"c", b"d", b"e"], false);
        list.trim(&mut batch, b"l", 1, 3).unwrap();
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
        // Trimming to an empty window destroys the key.
        list.trim(&mut batch, b"l", 5, 9).unwrap();
        assert_eq!(list.size(b"l").unwrap(), 0);
    }

    #[test]
    fn test_lmove_two_keys() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"src", &[b"a", b"b", b"c"], false);
        let moved = list.lmove(&mut batch, b"src", b"dst", false, true).unwrap();
        assert_eq!(moved.unwrap(), b"c");
        assert_eq!(list.range(b"src", 0, -1).unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(list.range(b"dst", 0, -1).unwrap(), vec![b"c".to_vec()]);
        assert_eq!(list.lmove(&mut batch, b"missing", b"dst", true, true).unwrap(), None);
    }

    #[test]
    fn test_lmove_same_key_rotation() {
        let storage = storage();
        let list = ListDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        push_all(&list, b"l", &[b"a", b"b", b"c"], false);
        let moved = list.lmove(&mut batch, b"l", b"l", true, false).unwrap();
        assert_eq!(moved.unwrap(), b"a");
        assert_eq!(
            list.range(b"l", 0, -1).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec(), b"a".to_vec()]
        );
        // Same side: element stays put.
        let moved = list.lmove(&mut batch, b"l", b"l", true, true).unwrap();
        assert_eq!(moved.unwrap(), b"b");
        assert_eq!(list.size(b"l").unwrap(), 3);
    }
}
