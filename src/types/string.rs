// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Plain string values.
//!
//! A string key is a single metadata row: 5-byte header (flags + expire)
//! with the body appended right after. There are no sub-key rows and no
//! version epoch.

use engine_traits::{KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::metadata::{Metadata, RedisType, METADATA_HEADER_SIZE};
use crate::storage::Storage;

pub struct StringPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

pub struct StringDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> StringDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> StringDb<'a, E> {
        StringDb {
            db: Database::new(storage, table_id),
        }
    }

    pub fn database(&self) -> &Database<'a, E> {
        &self.db
    }

    /// The whole row: header + body. Fails with `WrongType` when the key
    /// holds a composite type.
    fn get_raw_value(&self, ns_key: &[u8]) -> Result<Vec<u8>> {
        let raw = self.db.get_raw_metadata(ns_key)?;
        let metadata = Metadata::decode(&raw)?;
        if metadata.expired() {
            return Err(Error::Expired);
        }
        if metadata.redis_type() != RedisType::String {
            return Err(Error::WrongType);
        }
        Ok(raw)
    }

    fn get_value(&self, ns_key: &[u8]) -> Result<Vec<u8>> {
        let raw = self.get_raw_value(ns_key)?;
        Ok(raw[METADATA_HEADER_SIZE..].to_vec())
    }

    fn compose_raw_value(value: &[u8], ttl_secs: u64) -> Vec<u8> {
        let mut metadata = Metadata::new(RedisType::String, false);
        if ttl_secs > 0 {
            metadata.expire = (now_secs() + ttl_secs) as u32;
        }
        let mut raw = metadata.encode();
        raw.extend_from_slice(value);
        raw
    }

    fn update_raw_value(
        &self,
        batch: &mut E::WriteBatch,
        ns_key: &[u8],
        raw_value: &[u8],
    ) -> Result<()> {
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::String).encode())?;
        local.put(ns_key, raw_value)?;
        self.db.apply(batch, local)
    }

    pub fn get(&self, user_key: &[u8]) -> Result<Vec<u8>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        self.get_value(&ns_key)
    }

    pub fn strlen(&self, user_key: &[u8]) -> Result<usize> {
        match self.get(user_key) {
            Ok(v) => Ok(v.len()),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn get_range(&self, user_key: &[u8], start: i64, stop: i64) -> Result<Vec<u8>> {
        let value = match self.get(user_key) {
            Ok(v) => v,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let len = value.len() as i64;
        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        start = start.max(0);
        stop = stop.min(len - 1);
        if len == 0 || start > stop {
            return Ok(Vec::new());
        }
        Ok(value[start as usize..=stop as usize].to_vec())
    }

    pub fn set(&self, batch: &mut E::WriteBatch, user_key: &[u8], value: &[u8]) -> Result<()> {
        self.set_ex(batch, user_key, value, 0)
    }

    /// Unconditional overwrite; rebinding from a composite type implicitly
    /// destroys it and orphans its sub-keys.
    pub fn set_ex(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<()> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        self.update_raw_value(batch, &ns_key, &Self::compose_raw_value(value, ttl_secs))
    }

    /// No-op when the key already holds a live value. Returns whether the
    /// value was written.
    pub fn set_nx(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        match self.exists_live(&ns_key)? {
            true => Ok(false),
            false => {
                self.update_raw_value(batch, &ns_key, &Self::compose_raw_value(value, ttl_secs))?;
                Ok(true)
            }
        }
    }

    /// No-op when the key is absent or expired.
    pub fn set_xx(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        match self.exists_live(&ns_key)? {
            false => Ok(false),
            true => {
                self.update_raw_value(batch, &ns_key, &Self::compose_raw_value(value, ttl_secs))?;
                Ok(true)
            }
        }
    }

    fn exists_live(&self, ns_key: &[u8]) -> Result<bool> {
        match self.db.get_metadata_any(ns_key) {
            Ok(_) => Ok(true),
            Err(ref e) if e.is_absent() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn set_range(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        offset: u64,
        value: &[u8],
    ) -> Result<usize> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut raw = match self.get_raw_value(&ns_key) {
            Ok(raw) => raw,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::String, false).encode(),
            Err(e) => return Err(e),
        };
        let body_offset = METADATA_HEADER_SIZE + offset as usize;
        if raw.len() < body_offset {
            raw.resize(body_offset, 0);
        }
        if raw.len() < body_offset + value.len() {
            raw.resize(body_offset + value.len(), 0);
        }
        raw[body_offset..body_offset + value.len()].copy_from_slice(value);
        self.update_raw_value(batch, &ns_key, &raw)?;
        Ok(raw.len() - METADATA_HEADER_SIZE)
    }

    pub fn append(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        value: &[u8],
    ) -> Result<usize> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut raw = match self.get_raw_value(&ns_key) {
            Ok(raw) => raw,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::String, false).encode(),
            Err(e) => return Err(e),
        };
        raw.extend_from_slice(value);
        self.update_raw_value(batch, &ns_key, &raw)?;
        Ok(raw.len() - METADATA_HEADER_SIZE)
    }

    /// Returns the old body. The new value starts with a clean TTL.
    pub fn get_set(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        new_value: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let old = match self.get_value(&ns_key) {
            Ok(v) => Some(v),
            Err(ref e) if e.is_absent() => None,
            Err(e) => return Err(e),
        };
        self.update_raw_value(batch, &ns_key, &Self::compose_raw_value(new_value, 0))?;
        Ok(old)
    }

    pub fn incr_by(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        increment: i64,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut raw = match self.get_raw_value(&ns_key) {
            Ok(raw) => raw,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::String, false).encode(),
            Err(e) => return Err(e),
        };
        let old = parse_i64_body(&raw[METADATA_HEADER_SIZE..])?;
        let new = old.checked_add(increment).ok_or(Error::Overflow)?;
        raw.truncate(METADATA_HEADER_SIZE);
        raw.extend_from_slice(new.to_string().as_bytes());
        self.update_raw_value(batch, &ns_key, &raw)?;
        Ok(new)
    }

    pub fn incr_by_float(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        increment: f64,
    ) -> Result<f64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut raw = match self.get_raw_value(&ns_key) {
            Ok(raw) => raw,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::String, false).encode(),
            Err(e) => return Err(e),
        };
        let old = parse_f64_body(&raw[METADATA_HEADER_SIZE..])?;
        let new = old + increment;
        if new.is_nan() || new.is_infinite() {
            return Err(Error::Overflow);
        }
        raw.truncate(METADATA_HEADER_SIZE);
        raw.extend_from_slice(crate::reply::format_double(new).as_bytes());
        self.update_raw_value(batch, &ns_key, &raw)?;
        Ok(new)
    }

    /// One consistent view across all keys; dead or non-string keys read
    /// as nil.
    pub fn mget(&self, user_keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let snapshot = self.db.storage.engine().snapshot();
        let mut out = Vec::with_capacity(user_keys.len());
        for user_key in user_keys {
            let ns_key = self.db.encode_namespace_prefix(user_key);
            let value = match snapshot.get_value(&ns_key)? {
                Some(raw) => {
                    let metadata = Metadata::decode(&raw)?;
                    if metadata.expired() || metadata.redis_type() != RedisType::String {
                        None
                    } else {
                        Some(raw[METADATA_HEADER_SIZE..].to_vec())
                    }
                }
                None => None,
            };
            out.push(value);
        }
        Ok(out)
    }

    pub fn mset(&self, batch: &mut E::WriteBatch, pairs: &[StringPair], ttl_secs: u64) -> Result<()> {
        let ns_keys: Vec<Vec<u8>> = pairs
            .iter()
            .map(|p| self.db.encode_namespace_prefix(&p.key))
            .collect();
        let key_refs: Vec<&[u8]> = ns_keys.iter().map(|k| k.as_slice()).collect();
        let _guards = self.db.storage.lock_manager().multi_lock(&key_refs);
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::String).encode())?;
        for (pair, ns_key) in pairs.iter().zip(&ns_keys) {
            local.put(ns_key, &Self::compose_raw_value(&pair.value, ttl_secs))?;
        }
        self.db.apply(batch, local)
    }

    /// All-or-nothing: writes only when none of the keys hold a live value.
    pub fn msetnx(
        &self,
        batch: &mut E::WriteBatch,
        pairs: &[StringPair],
        ttl_secs: u64,
    ) -> Result<bool> {
        let ns_keys: Vec<Vec<u8>> = pairs
            .iter()
            .map(|p| self.db.encode_namespace_prefix(&p.key))
            .collect();
        let key_refs: Vec<&[u8]> = ns_keys.iter().map(|k| k.as_slice()).collect();
        let _guards = self.db.storage.lock_manager().multi_lock(&key_refs);
        for ns_key in &ns_keys {
            if self.exists_live(ns_key)? {
                return Ok(false);
            }
        }
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::String).encode())?;
        for (pair, ns_key) in pairs.iter().zip(&ns_keys) {
            local.put(ns_key, &Self::compose_raw_value(&pair.value, ttl_secs))?;
        }
        self.db.apply(batch, local)?;
        Ok(true)
    }

    /// Compare-and-swap: -1 when the key is absent, 0 on mismatch, 1 after
    /// the swap (with the TTL applied).
    pub fn cas(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        old_value: &[u8],
        new_value: &[u8],
        ttl_secs: u64,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let current = match self.get_value(&ns_key) {
            Ok(v) => v,
            Err(ref e) if e.is_absent() => return Ok(-1),
            Err(e) => return Err(e),
        };
        if current != old_value {
            return Ok(0);
        }
        self.update_raw_value(batch, &ns_key, &Self::compose_raw_value(new_value, ttl_secs))?;
        Ok(1)
    }

    /// Compare-and-delete, symmetric to `cas`.
    pub fn cad(&self, batch: &mut E::WriteBatch, user_key: &[u8], value: &[u8]) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let current = match self.get_value(&ns_key) {
            Ok(v) => v,
            Err(ref e) if e.is_absent() => return Ok(-1),
            Err(e) => return Err(e),
        };
        if current != value {
            return Ok(0);
        }
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::String).encode())?;
        local.delete(&ns_key)?;
        self.db.apply(batch, local)?;
        Ok(1)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Bodies are strict signed decimals; an absent body reads as zero.
fn parse_i64_body(body: &[u8]) -> Result<i64> {
    if body.is_empty() {
        return Ok(0);
    }
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::NotNumber)
}

fn parse_f64_body(body: &[u8]) -> Result<f64> {
    if body.is_empty() {
        return Ok(0.0);
    }
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .ok_or(Error::NotNumber)
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
    fn test_set_and_get() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        string.set(&mut batch, b"k", b"hello").unwrap();
        assert_eq!(string.get(b"k").unwrap(), b"hello");
        assert!(matches!(string.get(b"missing"), Err(Error::NotFound)));
    }

    #[test]
    fn test_append_grows() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        for i in 1..=32usize {
            let n = string.append(&mut batch, b"k", b"a").unwrap();
            assert_eq!(n, i);
        }
    }

    #[test]
    fn test_setnx_and_setxx() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert!(!string.set_xx(&mut batch, b"k", b"v", 0).unwrap());
        assert!(string.set_nx(&mut batch, b"k", b"v", 0).unwrap());
        assert!(!string.set_nx(&mut batch, b"k", b"w", 0).unwrap());
        assert!(string.set_xx(&mut batch, b"k", b"w", 0).unwrap());
        assert_eq!(string.get(b"k").unwrap(), b"w");
    }

    #[test]
    fn test_incr_by_and_overflow() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(string.incr_by(&mut batch, b"n", 1).unwrap(), 1);
        assert_eq!(
            string.incr_by(&mut batch, b"n", i64::MAX - 1).unwrap(),
            i64::MAX
        );
        assert!(matches!(
            string.incr_by(&mut batch, b"n", 1),
            Err(Error::Overflow)
        ));
        // Unchanged after the failed increment.
        assert_eq!(string.get(b"n").unwrap(), i64::MAX.to_string().as_bytes());

        string.set(&mut batch, b"s", b"abc").unwrap();
        assert!(matches!(
            string.incr_by(&mut batch, b"s", 1),
            Err(Error::NotNumber)
        ));
    }

    #[test]
    fn test_mset_mget() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        let pairs: Vec<StringPair> = (1..=6)
            .map(|i| StringPair {
                key: format!("test-string-key{}", i).into_bytes(),
                value: format!("test-strings-value{}", i).into_bytes(),
            })
            .collect();
        string.mset(&mut batch, &pairs, 0).unwrap();
        let keys: Vec<&[u8]> = pairs.iter().map(|p| p.key.as_slice()).collect();
        let values = string.mget(&keys).unwrap();
        for (pair, value) in pairs.iter().zip(values) {
            assert_eq!(value.as_deref(), Some(pair.value.as_slice()));
        }
        assert_eq!(string.mget(&[b"nope" as &[u8]]).unwrap(), vec![None]);
    }

    #[test]
    fn test_cas_cad() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(string.cas(&mut batch, b"k", b"a", b"b", 0).unwrap(), -1);
        string.set(&mut batch, b"k", b"a").unwrap();
        assert_eq!(string.cas(&mut batch, b"k", b"x", b"b", 0).unwrap(), 0);
        assert_eq!(string.cas(&mut batch, b"k", b"a", b"b", 0).unwrap(), 1);
        assert_eq!(string.get(b"k").unwrap(), b"b");

        assert_eq!(string.cad(&mut batch, b"k", b"x").unwrap(), 0);
        assert_eq!(string.cad(&mut batch, b"k", b"b").unwrap(), 1);
        assert_eq!(string.cad(&mut batch, b"k", b"b").unwrap(), -1);
    }

    #[test]
    fn test_getset_clears_ttl() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        string.set_ex(&mut batch, b"k", b"old", 100).unwrap();
        assert!(string.database().ttl(b"k").unwrap() > 0);
        let old = string.get_set(&mut batch, b"k", b"new").unwrap();
        assert_eq!(old.as_deref(), Some(&b"old"[..]));
        assert_eq!(string.database().ttl(b"k").unwrap(), -1);
    }

    #[test]
    fn test_setrange_getrange() {
        let storage = storage();
        let string = StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(string.set_range(&mut batch, b"k", 5, b"redis").unwrap(), 10);
        assert_eq!(string.get(b"k").unwrap(), b"\x00\x00\x00\x00\x00redis");
        assert_eq!(string.get_range(b"k", 5, -1).unwrap(), b"redis");
        assert_eq!(string.get_range(b"k", -2, -1).unwrap(), b"is");
        assert_eq!(string.get_range(b"k", 9, 5).unwrap(), b"");
    }
}
