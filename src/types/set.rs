// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Sets: one empty-valued sub-key row per member. Iteration order is the
//! ascending member order of the byte comparator.

use std::collections::BTreeSet;

use engine_traits::{KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::CF_CODE_DATA;
use crate::storage::metadata::{Metadata, RedisType};
use crate::storage::Storage;

pub struct SetDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> SetDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> SetDb<'a, E> {
        SetDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::Set, ns_key)
    }

    pub fn card(&self, user_key: &[u8]) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        match self.get_metadata(&ns_key) {
            Ok(metadata) => Ok(metadata.size),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn is_member(&self, user_key: &[u8], member: &[u8]) -> Result<bool> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(false),
            Err(e) => return Err(e),
        };
        let sub_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
        Ok(self.db.storage.engine().get_value(&sub_key)?.is_some())
    }

    pub fn add(&self, batch: &mut E::WriteBatch, user_key: &[u8], members: &[&[u8]]) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Set, true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Set).encode())?;
        let mut added = 0i64;
        for member in members {
            let sub_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
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

    pub fn remove(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        members: &[&[u8]],
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Set).encode())?;
        let mut removed = 0i64;
        for member in members {
            let sub_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
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

    /// All members in ascending order, under one snapshot.
    pub fn members(&self, user_key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, &ns_key, CF_CODE_DATA, metadata.version)?;
        Ok(rows.into_iter().map(|(member, _)| member).collect())
    }

    /// Takes up to `count` members in iteration order; with `pop` set they
    /// are also removed.
    pub fn take(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        count: usize,
        pop: bool,
    ) -> Result<Vec<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, &ns_key, CF_CODE_DATA, metadata.version)?;
        let taken: Vec<Vec<u8>> = rows
            .into_iter()
            .take(count)
            .map(|(member, _)| member)
            .collect();
        if !pop || taken.is_empty() {
            return Ok(taken);
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Set).encode())?;
        for member in &taken {
            local.delete(&self.db.make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?)?;
        }
        metadata.size -= taken.len() as u32;
        if metadata.size == 0 {
            local.delete(&ns_key)?;
        } else {
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(taken)
    }

    /// Moves one member between two sets under both locks.
    pub fn move_member(
        &self,
        batch: &mut E::WriteBatch,
        src: &[u8],
        dst: &[u8],
        member: &[u8],
    ) -> Result<bool> {
        let src_ns = self.db.encode_namespace_prefix(src);
        let dst_ns = self.db.encode_namespace_prefix(dst);
        let _guards = self
            .db
            .storage
            .lock_manager()
            .multi_lock(&[src_ns.as_slice(), dst_ns.as_slice()]);

        let mut src_meta = match self.get_metadata(&src_ns) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(false),
            Err(e) => return Err(e),
        };
        let src_sub = self
            .db
            .make_sub_key(&src_ns, CF_CODE_DATA, src_meta.version, member)?;
        if self.db.storage.engine().get_value(&src_sub)?.is_none() {
            return Ok(false);
        }
        // Same key: the member is already where it belongs.
        if src == dst {
            return Ok(true);
        }
        // Destination type errors surface before any mutation.
        let mut dst_meta = match self.get_metadata(&dst_ns) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Set, true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Set).encode())?;
        local.delete(&src_sub)?;
        src_meta.size -= 1;
        if src_meta.size == 0 {
            local.delete(&src_ns)?;
        } else {
            local.put(&src_ns, &src_meta.encode())?;
        }

        let dst_sub = self
            .db
            .make_sub_key(&dst_ns, CF_CODE_DATA, dst_meta.version, member)?;
        if self.db.storage.engine().get_value(&dst_sub)?.is_none() {
            local.put(&dst_sub, b"")?;
            dst_meta.size += 1;
            local.put(&dst_ns, &dst_meta.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(true)
    }

    fn members_as_set(&self, user_key: &[u8]) -> Result<BTreeSet<Vec<u8>>> {
        Ok(self.members(user_key)?.into_iter().collect())
    }

    /// Members of the first key that appear in none of the others.
    pub fn diff(&self, user_keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let mut result = self.members_as_set(user_keys[0])?;
        for key in &user_keys[1..] {
            for member in self.members(key)? {
                result.remove(&member);
            }
        }
        Ok(result.into_iter().collect())
    }

    pub fn union(&self, user_keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let mut result = BTreeSet::new();
        for key in user_keys {
            result.extend(self.members(key)?);
        }
        Ok(result.into_iter().collect())
    }

    pub fn inter(&self, user_keys: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let mut result = self.members_as_set(user_keys[0])?;
        for key in &user_keys[1..] {
            if result.is_empty() {
                break;
            }
            let other = self.members_as_set(key)?;
            result.retain(|m| other.contains(m));
        }
        Ok(result.into_iter().collect())
    }

    /// Replaces the destination with `members` atomically: a fresh version
    /// orphans the previous generation, and the rows land in one batch.
    pub fn overwrite(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        members: &[Vec<u8>],
    ) -> Result<()> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Set).encode())?;
        if members.is_empty() {
            local.delete(&ns_key)?;
        } else {
            let mut metadata = Metadata::new(RedisType::Set, true);
            metadata.size = members.len() as u32;
            for member in members {
                local.put(
                    &self
                        .db
                        .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?,
                    b"",
                )?;
            }
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)
    }

    pub fn diff_store(
        &self,
        batch: &mut E::WriteBatch,
        dst: &[u8],
        user_keys: &[&[u8]],
    ) -> Result<i64> {
        let members = self.diff(user_keys)?;
        self.overwrite(batch, dst, &members)?;
        Ok(members.len() as i64)
    }

    pub fn union_store(
        &self,
        batch: &mut E::WriteBatch,
        dst: &[u8],
        user_keys: &[&[u8]],
    ) -> Result<i64> {
        let members = self.union(user_keys)?;
        self.overwrite(batch, dst, &members)?;
        Ok(members.len() as i64)
    }

    pub fn inter_store(
        &self,
        batch: &mut E::WriteBatch,
        dst: &[u8],
        user_keys: &[&[u8]],
    ) -> Result<i64> {
        let members = self.inter(user_keys)?;
        self.overwrite(batch, dst, &members)?;
        Ok(members.len() as i64)
    }

    pub fn scan(
        &self,
        user_key: &[u8],
        cursor: &[u8],
        limit: u64,
        prefix: &[u8],
    ) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
        let (rows, next_cursor) =
            self.db
                .sub_key_scan(RedisType::Set, user_key, cursor, limit, prefix)?;
        Ok((rows.into_iter().map(|(member, _)| member).collect(), next_cursor))
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
    fn test_add_and_remove() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        let fields: Vec<&[u8]> = vec![b"set-key-1", b"set-key-2", b"set-key-3", b"set-key-4"];
        assert_eq!(set.add(&mut batch, b"s", &fields).unwrap(), 4);
        assert_eq!(set.add(&mut batch, b"s", &fields).unwrap(), 0);
        assert_eq!(set.card(b"s").unwrap(), 4);
        assert_eq!(set.remove(&mut batch, b"s", &fields).unwrap(), 4);
        assert_eq!(set.card(b"s").unwrap(), 0);
    }

    #[test]
    fn test_members_ascending() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        let fields: Vec<&[u8]> = vec![b"set-key-3", b"set-key-1", b"set-key-4", b"set-key-2"];
        set.add(&mut batch, b"s", &fields).unwrap();
        let members = set.members(b"s").unwrap();
        assert_eq!(
            members,
            vec![
                b"set-key-1".to_vec(),
                b"set-key-2".to_vec(),
                b"set-key-3".to_vec(),
                b"set-key-4".to_vec()
            ]
        );
    }

    #[test]
    fn test_is_member() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        set.add(&mut batch, b"s", &[b"a"]).unwrap();
        assert!(set.is_member(b"s", b"a").unwrap());
        assert!(!set.is_member(b"s", b"b").unwrap());
        assert!(!set.is_member(b"missing", b"a").unwrap());
    }

    #[test]
    fn test_take_and_pop() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        set.add(&mut batch, b"s", &[b"a", b"b", b"c"]).unwrap();
        let peeked = set.take(&mut batch, b"s", 2, false).unwrap();
        assert_eq!(peeked.len(), 2);
        assert_eq!(set.card(b"s").unwrap(), 3);
        let popped = set.take(&mut batch, b"s", 2, true).unwrap();
        assert_eq!(popped, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(set.card(b"s").unwrap(), 1);
    }

    #[test]
    fn test_move_member() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        set.add(&mut batch, b"src", &[b"m", b"n"]).unwrap();
        assert!(set.move_member(&mut batch, b"src", b"dst", b"m").unwrap());
        assert!(!set.move_member(&mut batch, b"src", b"dst", b"zz").unwrap());
        assert!(set.is_member(b"dst", b"m").unwrap());
        assert!(!set.is_member(b"src", b"m").unwrap());
    }

    #[test]
    fn test_algebra() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        set.add(&mut batch, b"a", &[b"1", b"2", b"3"]).unwrap();
        set.add(&mut batch, b"b", &[b"2", b"3", b"4"]).unwrap();
        assert_eq!(set.diff(&[b"a", b"b"]).unwrap(), vec![b"1".to_vec()]);
        assert_eq!(
            set.union(&[b"a", b"b"]).unwrap(),
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]
        );
        assert_eq!(
            set.inter(&[b"a", b"b"]).unwrap(),
            vec![b"2".to_vec(), b"3".to_vec()]
        );
    }

    #[test]
    fn test_store_variants_overwrite() {
        let storage = storage();
        let set = SetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        set.add(&mut batch, b"a", &[b"1", b"2"]).unwrap();
        set.add(&mut batch, b"b", &[b"2"]).unwrap();
        set.add(&mut batch, b"dst", &[b"old-1", b"old-2"]).unwrap();

        assert_eq!(set.inter_store(&mut batch, b"dst", &[b"a", b"b"]).unwrap(), 1);
        assert_eq!(set.members(b"dst").unwrap(), vec![b"2".to_vec()]);

        // Empty result destroys the destination.
        assert_eq!(set.diff_store(&mut batch, b"dst", &[b"b", b"a"]).unwrap(), 0);
        assert_eq!(set.card(b"dst").unwrap(), 0);
    }
}
