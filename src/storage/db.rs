// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Logical-key primitives shared by every typed operation: metadata access
//! with expiration and type checks, generic key commands, and the bounded
//! sub-key walkers.

use engine_traits::{IterOptions, Iterable, Iterator, KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::keys::{
    self, CfCode, InternalKey, CF_CODE_DATA, CF_CODE_METADATA,
};
use crate::storage::metadata::{Metadata, RedisCommand, RedisType};
use crate::storage::Storage;

/// Blob prepended to every write batch, tagging the command type for
/// logical replication decoders.
#[derive(Clone, Debug, Default)]
pub struct WriteBatchLogData {
    redis_type: Option<RedisType>,
    args: Vec<Vec<u8>>,
}

impl WriteBatchLogData {
    pub fn new(redis_type: RedisType) -> WriteBatchLogData {
        WriteBatchLogData {
            redis_type: Some(redis_type),
            args: Vec::new(),
        }
    }

    pub fn with_command(redis_type: RedisType, cmd: RedisCommand) -> WriteBatchLogData {
        WriteBatchLogData {
            redis_type: Some(redis_type),
            args: vec![(cmd as u8).to_string().into_bytes()],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let ty = self.redis_type.unwrap_or(RedisType::None);
        let mut out = (ty as u8).to_string().into_bytes();
        for arg in &self.args {
            out.push(b' ');
            out.extend_from_slice(arg);
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyNumStats {
    pub n_key: u64,
    pub n_expires: u64,
    pub n_expired: u64,
    pub avg_ttl: u64,
}

/// A borrowed view of the storage scoped to one table.
pub struct Database<'a, E: KvEngine> {
    pub(crate) storage: &'a Storage<E>,
    pub(crate) table_id: i64,
}

impl<'a, E: KvEngine> Database<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> Database<'a, E> {
        Database { storage, table_id }
    }

    /// The metadata-level physical key of `user_key`.
    pub fn encode_namespace_prefix(&self, user_key: &[u8]) -> Vec<u8> {
        keys::compose_namespace_key(
            self.table_id,
            user_key,
            self.storage.is_slot_id_encoded(),
            CF_CODE_METADATA,
        )
    }

    pub fn get_raw_metadata(&self, ns_key: &[u8]) -> Result<Vec<u8>> {
        match self.storage.engine().get_value(ns_key)? {
            Some(bytes) => Ok(bytes),
            None => Err(Error::NotFound),
        }
    }

    /// Entry point of every typed operation: an absent row is `NotFound`,
    /// an elapsed TTL or empty composite is `Expired`, and a type mismatch
    /// is `WrongType`.
    pub fn get_metadata(&self, expected: RedisType, ns_key: &[u8]) -> Result<Metadata> {
        let metadata = self.get_metadata_any(ns_key)?;
        if metadata.redis_type() != expected {
            return Err(Error::WrongType);
        }
        Ok(metadata)
    }

    pub fn get_metadata_any(&self, ns_key: &[u8]) -> Result<Metadata> {
        let raw = self.get_raw_metadata(ns_key)?;
        let metadata = Metadata::decode(&raw)?;
        if metadata.expired() {
            return Err(Error::Expired);
        }
        Ok(metadata)
    }

    /// Commits `local` through the storage (a no-op without `sync-write`)
    /// and folds it into the request batch handed back to the host.
    pub(crate) fn apply(&self, request_batch: &mut E::WriteBatch, local: E::WriteBatch) -> Result<()> {
        self.storage.write(&local)?;
        request_batch.append(local)?;
        Ok(())
    }

    pub(crate) fn make_sub_key(
        &self,
        ns_key: &[u8],
        cf_code: CfCode,
        version: u64,
        sub_key: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(InternalKey::from_ns_key(
            ns_key,
            sub_key,
            version,
            self.storage.is_slot_id_encoded(),
            cf_code,
        )?
        .encode())
    }

    /// `[prefix(version), prefix(version + 1))` bounds covering every
    /// sub-key row of one logical-key generation.
    pub(crate) fn sub_key_bounds(
        &self,
        ns_key: &[u8],
        cf_code: CfCode,
        version: u64,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let prefix = self.make_sub_key(ns_key, cf_code, version, b"")?;
        let upper = self.make_sub_key(ns_key, cf_code, version + 1, b"")?;
        Ok((prefix, upper))
    }

    /// Collects all live sub-key rows of one generation, in ascending
    /// sub-key order, decoded back to `(sub_key, value)`.
    pub(crate) fn scan_sub_keys<S: Iterable>(
        &self,
        snapshot: &S,
        ns_key: &[u8],
        cf_code: CfCode,
        version: u64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let (prefix, upper) = self.sub_key_bounds(ns_key, cf_code, version)?;
        let mut iter = snapshot.iterator_opt(IterOptions::new(
            Some(prefix.clone()),
            Some(upper),
        ))?;
        let mut out = Vec::new();
        let mut valid = iter.seek(&prefix)?;
        while valid {
            let ikey = InternalKey::decode(iter.key(), self.storage.is_slot_id_encoded())?;
            out.push((ikey.sub_key().to_vec(), iter.value().to_vec()));
            valid = iter.next()?;
        }
        Ok(out)
    }

    /// SCAN-style walk over one composite key: start strictly after
    /// `cursor` (empty = from the beginning), keep sub-keys matching
    /// `prefix`, stop at `limit`.
    pub fn sub_key_scan(
        &self,
        expected: RedisType,
        user_key: &[u8],
        cursor: &[u8],
        limit: u64,
        prefix: &[u8],
    ) -> Result<(Vec<(Vec<u8>, Vec<u8>)>, Vec<u8>)> {
        let ns_key = self.encode_namespace_prefix(user_key);
        let metadata = self.get_metadata(expected, &ns_key)?;
        let snapshot = self.storage.engine().snapshot();

        let (range_start, upper) = self.sub_key_bounds(&ns_key, CF_CODE_DATA, metadata.version)?;
        let seek_key = if cursor.is_empty() {
            range_start.clone()
        } else {
            self.make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, cursor)?
        };

        let mut iter = snapshot.iterator_opt(IterOptions::new(
            Some(range_start),
            Some(upper),
        ))?;
        let mut out = Vec::new();
        let mut valid = iter.seek(&seek_key)?;
        while valid && (out.len() as u64) < limit {
            let ikey = InternalKey::decode(iter.key(), self.storage.is_slot_id_encoded())?;
            let sub_key = ikey.sub_key();
            // The cursor names the last sub-key of the previous page.
            if !(cursor.is_empty() && sub_key.is_empty()) && sub_key == cursor {
                valid = iter.next()?;
                continue;
            }
            if !prefix.is_empty() && !sub_key.starts_with(prefix) {
                valid = iter.next()?;
                continue;
            }
            out.push((sub_key.to_vec(), iter.value().to_vec()));
            valid = iter.next()?;
        }

        let next_cursor = if (out.len() as u64) < limit {
            Vec::new()
        } else {
            out.last().map(|(k, _)| k.clone()).unwrap_or_default()
        };
        Ok((out, next_cursor))
    }

    /// Removes the logical key by dropping its metadata row only; sub-key
    /// rows become orphans reaped by the compaction filter.
    pub fn del(&self, batch: &mut E::WriteBatch, user_key: &[u8]) -> Result<bool> {
        let ns_key = self.encode_namespace_prefix(user_key);
        let _guard = self.storage.lock_manager().lock(&ns_key);
        match self.get_metadata_any(&ns_key) {
            Ok(_) => {}
            Err(ref e) if e.is_absent() => return Ok(false),
            Err(e) => return Err(e),
        }
        let mut local = self.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::None).encode())?;
        local.delete(&ns_key)?;
        self.apply(batch, local)?;
        Ok(true)
    }

    /// Counts how many of `keys` hold a live value.
    pub fn exists(&self, user_keys: &[&[u8]]) -> Result<i64> {
        let snapshot = self.storage.engine().snapshot();
        let mut count = 0;
        for user_key in user_keys {
            let ns_key = self.encode_namespace_prefix(user_key);
            if let Some(raw) = snapshot.get_value(&ns_key)? {
                if !Metadata::decode(&raw)?.expired() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Rewrites the expiration field in place, preserving the rest of the
    /// row (including a string body). `timestamp == 0` clears the TTL.
    pub fn expire(&self, batch: &mut E::WriteBatch, user_key: &[u8], timestamp: u32) -> Result<bool> {
        let ns_key = self.encode_namespace_prefix(user_key);
        let _guard = self.storage.lock_manager().lock(&ns_key);
        let mut raw = match self.get_raw_metadata(&ns_key) {
            Ok(raw) => raw,
            Err(ref e) if e.is_absent() => return Ok(false),
            Err(e) => return Err(e),
        };
        let metadata = Metadata::decode(&raw)?;
        if metadata.expired() {
            return Ok(false);
        }
        raw[1..5].copy_from_slice(&timestamp.to_le_bytes());

        let mut local = self.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(metadata.redis_type(), RedisCommand::Expire).encode(),
        )?;
        local.put(&ns_key, &raw)?;
        self.apply(batch, local)?;
        Ok(true)
    }

    pub fn ttl(&self, user_key: &[u8]) -> Result<i64> {
        let ns_key = self.encode_namespace_prefix(user_key);
        match self.get_raw_metadata(&ns_key) {
            Ok(raw) => {
                let metadata = Metadata::decode(&raw)?;
                if metadata.expired() {
                    Ok(-2)
                } else {
                    Ok(metadata.ttl())
                }
            }
            Err(ref e) if e.is_absent() => Ok(-2),
            Err(e) => Err(e),
        }
    }

    pub fn type_of(&self, user_key: &[u8]) -> Result<RedisType> {
        let ns_key = self.encode_namespace_prefix(user_key);
        match self.get_metadata_any(&ns_key) {
            Ok(metadata) => Ok(metadata.redis_type()),
            Err(ref e) if e.is_absent() => Ok(RedisType::None),
            Err(e) => Err(e),
        }
    }

    /// Walks every metadata row of this table, newest view. The callback
    /// receives `(user_key, metadata)` for live and expired rows alike and
    /// returns whether to keep walking.
    fn for_each_metadata<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &Metadata) -> Result<bool>,
    {
        let lower = keys::compose_table_prefix(self.table_id);
        let upper = self
            .table_id
            .checked_add(1)
            .map(keys::compose_table_prefix);
        let snapshot = self.storage.engine().snapshot();
        let mut iter = snapshot.iterator_opt(IterOptions::new(Some(lower.clone()), upper))?;
        let mut valid = iter.seek(&lower)?;
        while valid {
            let (table_id, user_key, cf_code) =
                keys::extract_namespace_key(iter.key(), self.storage.is_slot_id_encoded())?;
            if table_id != self.table_id {
                break;
            }
            if cf_code == CF_CODE_METADATA {
                let metadata = Metadata::decode(iter.value())?;
                if !f(&user_key, &metadata)? {
                    break;
                }
            }
            valid = iter.next()?;
        }
        Ok(())
    }

    /// All live user keys of the table with the given prefix, ascending.
    pub fn keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        self.for_each_metadata(|user_key, metadata| {
            if !metadata.expired() && user_key.starts_with(prefix) {
                out.push(user_key.to_vec());
            }
            Ok(true)
        })?;
        Ok(out)
    }

    /// Cursor walk over the table's live user keys. The cursor names the
    /// last key of the previous page; an empty returned cursor means the
    /// walk is complete.
    pub fn scan(
        &self,
        cursor: &[u8],
        limit: u64,
        prefix: &[u8],
    ) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
        let mut out: Vec<Vec<u8>> = Vec::new();
        self.for_each_metadata(|user_key, metadata| {
            if out.len() as u64 >= limit {
                return Ok(false);
            }
            if !cursor.is_empty() && user_key <= cursor {
                return Ok(true);
            }
            if metadata.expired() || !user_key.starts_with(prefix) {
                return Ok(true);
            }
            out.push(user_key.to_vec());
            Ok(true)
        })?;
        let next_cursor = if (out.len() as u64) < limit {
            Vec::new()
        } else {
            out.last().cloned().unwrap_or_default()
        };
        Ok((out, next_cursor))
    }

    pub fn random_key(&self) -> Result<Option<Vec<u8>>> {
        let live = self.keys(b"")?;
        if live.is_empty() {
            return Ok(None);
        }
        let idx = rand::random::<usize>() % live.len();
        Ok(Some(live[idx].clone()))
    }

    pub fn get_key_num_stats(&self) -> Result<KeyNumStats> {
        let mut stats = KeyNumStats::default();
        let mut ttl_sum = 0u64;
        self.for_each_metadata(|_, metadata| {
            if metadata.expired() {
                stats.n_expired += 1;
                return Ok(true);
            }
            stats.n_key += 1;
            if metadata.expire > 0 {
                stats.n_expires += 1;
                let ttl = metadata.ttl();
                if ttl > 0 {
                    ttl_sum += ttl as u64;
                }
            }
            Ok(true)
        })?;
        if stats.n_expires > 0 {
            stats.avg_ttl = ttl_sum / stats.n_expires;
        }
        Ok(stats)
    }

    /// Drops every metadata row of the table in one batch; sub-keys are
    /// left for compaction.
    pub fn flush_db(&self, batch: &mut E::WriteBatch) -> Result<()> {
        let mut doomed = Vec::new();
        self.for_each_metadata(|user_key, _| {
            doomed.push(user_key.to_vec());
            Ok(true)
        })?;
        let mut local = self.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::None).encode())?;
        for user_key in doomed {
            local.delete(&self.encode_namespace_prefix(&user_key))?;
        }
        self.apply(batch, local)?;
        Ok(())
    }
}
