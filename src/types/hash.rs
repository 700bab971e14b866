// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Hashes: one sub-key row per field.

use engine_traits::{KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::CF_CODE_DATA;
use crate::storage::metadata::{Metadata, RedisType};
use crate::storage::Storage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldValue {
    pub field: Vec<u8>,
    pub value: Vec<u8>,
}

pub struct HashDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> HashDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> HashDb<'a, E> {
        HashDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::Hash, ns_key)
    }

    pub fn size(&self, user_key: &[u8]) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        match self.get_metadata(&ns_key) {
            Ok(metadata) => Ok(metadata.size),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, user_key: &[u8], field: &[u8]) -> Result<Vec<u8>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = self.get_metadata(&ns_key)?;
        let sub_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, field)?;
        match self.db.storage.engine().get_value(&sub_key)? {
            Some(value) => Ok(value),
            None => Err(Error::NotFound),
        }
    }

    pub fn exists(&self, user_key: &[u8], field: &[u8]) -> Result<bool> {
        match self.get(user_key, field) {
            Ok(_) => Ok(true),
            Err(ref e) if e.is_absent() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn mget(&self, user_key: &[u8], fields: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = self.get_metadata(&ns_key)?;
        let snapshot = self.db.storage.engine().snapshot();
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let sub_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, field)?;
            out.push(snapshot.get_value(&sub_key)?);
        }
        Ok(out)
    }

    pub fn set(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        field: &[u8],
        value: &[u8],
    ) -> Result<i64> {
        self.mset(
            batch,
            user_key,
            &[FieldValue {
                field: field.to_vec(),
                value: value.to_vec(),
            }],
            false,
        )
    }

    pub fn set_nx(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        field: &[u8],
        value: &[u8],
    ) -> Result<i64> {
        self.mset(
            batch,
            user_key,
            &[FieldValue {
                field: field.to_vec(),
                value: value.to_vec(),
            }],
            true,
        )
    }

    /// Writes all fields; returns the count of newly created ones. With
    /// `nx` set, existing fields are left untouched.
    pub fn mset(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        field_values: &[FieldValue],
        nx: bool,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Hash, true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hash).encode())?;
        let mut added = 0i64;
        for fv in field_values {
            let sub_key =
                self.db
                    .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &fv.field)?;
            let exists = self.db.storage.engine().get_value(&sub_key)?.is_some();
            if exists {
                if nx {
                    continue;
                }
            } else {
                added += 1;
            }
            local.put(&sub_key, &fv.value)?;
        }
        metadata.size += added as u32;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(added)
    }

    pub fn delete(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        fields: &[&[u8]],
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hash).encode())?;
        let mut removed = 0i64;
        for field in fields {
            let sub_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, field)?;
            if self.db.storage.engine().get_value(&sub_key)?.is_some() {
                local.delete(&sub_key)?;
                removed += 1;
            }
        }
        metadata.size -= removed as u32;
        if metadata.size == 0 {
            local.delete(&ns_key)?;
        } else {
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(removed)
    }

    pub fn incr_by(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        field: &[u8],
        increment: i64,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Hash, true),
            Err(e) => return Err(e),
        };
        let sub_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, field)?;
        let old_value = self.db.storage.engine().get_value(&sub_key)?;
        let old = match &old_value {
            Some(bytes) => parse_i64(bytes)?,
            None => 0,
        };
        let new = old.checked_add(increment).ok_or(Error::Overflow)?;

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hash).encode())?;
        local.put(&sub_key, new.to_string().as_bytes())?;
        if old_value.is_none() {
            metadata.size += 1;
        }
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(new)
    }

    pub fn incr_by_float(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        field: &[u8],
        increment: f64,
    ) -> Result<f64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Hash, true),
            Err(e) => return Err(e),
        };
        let sub_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, field)?;
        let old_value = self.db.storage.engine().get_value(&sub_key)?;
        let old = match &old_value {
            Some(bytes) => parse_f64(bytes)?,
            None => 0.0,
        };
        let new = old + increment;
        if new.is_nan() || new.is_infinite() {
            return Err(Error::Overflow);
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hash).encode())?;
        local.put(&sub_key, crate::reply::format_double(new).as_bytes())?;
        if old_value.is_none() {
            metadata.size += 1;
        }
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(new)
    }

    /// All fields in ascending field order, under one snapshot.
    pub fn get_all(&self, user_key: &[u8]) -> Result<Vec<FieldValue>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = self.get_metadata(&ns_key)?;
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, &ns_key, CF_CODE_DATA, metadata.version)?;
        Ok(rows
            .into_iter()
            .map(|(field, value)| FieldValue { field, value })
            .collect())
    }

    pub fn scan(
        &self,
        user_key: &[u8],
        cursor: &[u8],
        limit: u64,
        prefix: &[u8],
    ) -> Result<(Vec<FieldValue>, Vec<u8>)> {
        let (rows, next_cursor) =
            self.db
                .sub_key_scan(RedisType::Hash, user_key, cursor, limit, prefix)?;
        let out = rows
            .into_iter()
            .map(|(field, value)| FieldValue { field, value })
            .collect();
        Ok((out, next_cursor))
    }
}

fn parse_i64(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::NotNumber)
}

fn parse_f64(bytes: &[u8]) -> Result<f64> {
    std::str::from_utf8(bytes)
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
    fn test_set_get_delete() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(hash.set(&mut batch, b"h", b"f1", b"v1").unwrap(), 1);
        assert_eq!(hash.set(&mut batch, b"h", b"f1", b"v2").unwrap(), 0);
        assert_eq!(hash.get(b"h", b"f1").unwrap(), b"v2");
        assert_eq!(hash.size(b"h").unwrap(), 1);

        assert_eq!(hash.delete(&mut batch, b"h", &[b"f1", b"nope"]).unwrap(), 1);
        assert_eq!(hash.size(b"h").unwrap(), 0);
        assert!(matches!(hash.get(b"h", b"f1"), Err(Error::NotFound)));
    }

    #[test]
    fn test_setnx_keeps_existing() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(hash.set_nx(&mut batch, b"h", b"f", b"a").unwrap(), 1);
        assert_eq!(hash.set_nx(&mut batch, b"h", b"f", b"b").unwrap(), 0);
        assert_eq!(hash.get(b"h", b"f").unwrap(), b"a");
    }

    #[test]
    fn test_get_all_sorted() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        for (f, v) in [(b"b", b"2"), (b"a", b"1"), (b"c", b"3")] {
            hash.set(&mut batch, b"h", f, v).unwrap();
        }
        let all = hash.get_all(b"h").unwrap();
        let fields: Vec<&[u8]> = all.iter().map(|fv| fv.field.as_slice()).collect();
        assert_eq!(fields, vec![b"a", b"b", b"c"]);
    }

    #[test]
    fn test_incr_by() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(hash.incr_by(&mut batch, b"h", b"n", 5).unwrap(), 5);
        assert_eq!(hash.incr_by(&mut batch, b"h", b"n", -2).unwrap(), 3);
        hash.set(&mut batch, b"h", b"s", b"abc").unwrap();
        assert!(matches!(
            hash.incr_by(&mut batch, b"h", b"s", 1),
            Err(Error::NotNumber)
        ));
    }

    #[test]
    fn test_wrong_type() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let string = crate::types::StringDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        string.set(&mut batch, b"k", b"x").unwrap();
        assert!(matches!(hash.get(b"k", b"f"), Err(Error::WrongType)));
    }

    #[test]
    fn test_scan_pages() {
        let storage = storage();
        let hash = HashDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        for i in 0..5u8 {
            hash.set(&mut batch, b"h", &[b'f', b'0' + i], b"v").unwrap();
        }
        let (page1, cursor) = hash.scan(b"h", b"", 3, b"").unwrap();
        assert_eq!(page1.len(), 3);
        assert_eq!(cursor, b"f2");
        let (page2, cursor) = hash.scan(b"h", &cursor, 3, b"").unwrap();
        assert_eq!(page2.len(), 2);
        assert!(cursor.is_empty());
    }
}
