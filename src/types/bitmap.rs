// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Bitmaps partitioned into fixed 128-byte segments.
//!
//! The sub-key is the decimal segment index, so readers always address
//! segments by parsed index rather than iteration order. Metadata size
//! tracks the number of set bits; a bitmap with none reads as absent.

use std::collections::BTreeMap;

use engine_traits::{KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::CF_CODE_DATA;
use crate::storage::metadata::{Metadata, RedisCommand, RedisType};
use crate::storage::Storage;

pub const BITMAP_SEGMENT_BYTES: usize = 128;
pub const BITMAP_SEGMENT_BITS: u64 = (BITMAP_SEGMENT_BYTES * 8) as u64;

pub struct BitmapDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> BitmapDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> BitmapDb<'a, E> {
        BitmapDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::Bitmap, ns_key)
    }

    fn segment_sub_key(segment_index: u64) -> Vec<u8> {
        segment_index.to_string().into_bytes()
    }

    /// Bit addressing follows redis: bit 0 is the most significant bit of
    /// byte 0.
    fn locate(offset: u64) -> (u64, usize, u8) {
        let segment_index = offset / BITMAP_SEGMENT_BITS;
        let bit_in_segment = offset % BITMAP_SEGMENT_BITS;
        let byte_in_segment = (bit_in_segment / 8) as usize;
        let mask = 0x80u8 >> (bit_in_segment % 8);
        (segment_index, byte_in_segment, mask)
    }

    pub fn get_bit(&self, user_key: &[u8], offset: u64) -> Result<bool> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(false),
            Err(e) => return Err(e),
        };
        let (segment_index, byte_in_segment, mask) = Self::locate(offset);
        let sub_key = self.db.make_sub_key(
            &ns_key,
            CF_CODE_DATA,
            metadata.version,
            &Self::segment_sub_key(segment_index),
        )?;
        match self.db.storage.engine().get_value(&sub_key)? {
            Some(segment) => Ok(segment
                .get(byte_in_segment)
                .map(|b| b & mask != 0)
                .unwrap_or(false)),
            None => Ok(false),
        }
    }

    /// Sets one bit, returning its previous value.
    pub fn set_bit(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        offset: u64,
        value: bool,
    ) -> Result<bool> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Bitmap, true),
            Err(e) => return Err(e),
        };
        let (segment_index, byte_in_segment, mask) = Self::locate(offset);
        let sub_key = self.db.make_sub_key(
            &ns_key,
            CF_CODE_DATA,
            metadata.version,
            &Self::segment_sub_key(segment_index),
        )?;
        let mut segment = self
            .db
            .storage
            .engine()
            .get_value(&sub_key)?
            .unwrap_or_else(|| vec![0u8; BITMAP_SEGMENT_BYTES]);
        if segment.len() < BITMAP_SEGMENT_BYTES {
            segment.resize(BITMAP_SEGMENT_BYTES, 0);
        }
        let old = segment[byte_in_segment] & mask != 0;
        if old == value {
            return Ok(old);
        }
        if value {
            segment[byte_in_segment] |= mask;
            metadata.size += 1;
        } else {
            segment[byte_in_segment] &= !mask;
            metadata.size -= 1;
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(
            &WriteBatchLogData::with_command(RedisType::Bitmap, RedisCommand::SetBit).encode(),
        )?;
        local.put(&sub_key, &segment)?;
        if metadata.size == 0 {
            local.delete(&ns_key)?;
        } else {
            local.put(&ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)?;
        Ok(old)
    }

    /// All live segments keyed by parsed index, plus the byte length the
    /// bitmap spans.
    fn load_segments(&self, ns_key: &[u8], metadata: &Metadata) -> Result<(BTreeMap<u64, Vec<u8>>, u64)> {
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, ns_key, CF_CODE_DATA, metadata.version)?;
        let mut segments = BTreeMap::new();
        for (sub_key, value) in rows {
            let index: u64 = std::str::from_utf8(&sub_key)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::NotNumber)?;
            segments.insert(index, value);
        }
        let data_len = segments
            .keys()
            .next_back()
            .map(|max| (max + 1) * BITMAP_SEGMENT_BYTES as u64)
            .unwrap_or(0);
        Ok((segments, data_len))
    }

    /// Counts set bits within an optional byte window (redis BITCOUNT
    /// semantics, negative indexes from the end).
    pub fn bit_count(
        &self,
        user_key: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };
        if start.is_none() && stop.is_none() {
            return Ok(i64::from(metadata.size));
        }

        let (segments, data_len) = self.load_segments(&ns_key, &metadata)?;
        let window = super::list_range(
            start.unwrap_or(0),
            stop.unwrap_or(-1),
            data_len as i64,
        );
        let (start, stop) = match window {
            Some(window) => window,
            None => return Ok(0),
        };
        let mut count = 0i64;
        for byte_pos in start..=stop {
            let segment_index = byte_pos as u64 / BITMAP_SEGMENT_BYTES as u64;
            let byte_in_segment = byte_pos as usize % BITMAP_SEGMENT_BYTES;
            if let Some(segment) = segments.get(&segment_index) {
                if let Some(b) = segment.get(byte_in_segment) {
                    count += i64::from(b.count_ones());
                }
            }
        }
        Ok(count)
    }

    /// First position holding `bit`, scanning an optional byte window.
    /// With no explicit window and only set bits, the answer for a clear
    /// bit is the first position past the data.
    pub fn bit_pos(
        &self,
        user_key: &[u8],
        bit: bool,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(if bit { -1 } else { 0 }),
            Err(e) => return Err(e),
        };
        let stop_given = stop.is_some();
        let (segments, data_len) = self.load_segments(&ns_key, &metadata)?;
        let window = super::list_range(
            start.unwrap_or(0),
            stop.unwrap_or(-1),
            data_len as i64,
        );
        let (start, stop) = match window {
            Some(window) => window,
            None => return Ok(if bit { -1 } else { 0 }),
        };
        for byte_pos in start..=stop {
            let segment_index = byte_pos as u64 / BITMAP_SEGMENT_BYTES as u64;
            let byte_in_segment = byte_pos as usize % BITMAP_SEGMENT_BYTES;
            let byte = segments
                .get(&segment_index)
                .and_then(|s| s.get(byte_in_segment).copied())
                .unwrap_or(0);
            let target = if bit { byte != 0 } else { byte != 0xff };
            if target {
                for i in 0..8 {
                    let is_set = byte & (0x80 >> i) != 0;
                    if is_set == bit {
                        return Ok(byte_pos * 8 + i as i64);
                    }
                }
            }
        }
        if !bit && !stop_given {
            return Ok(data_len as i64 * 8);
        }
        Ok(-1)
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
    fn test_set_get_bit() {
        let storage = storage();
        let bitmap = BitmapDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert!(!bitmap.get_bit(b"b", 7).unwrap());
        assert!(!bitmap.set_bit(&mut batch, b"b", 7, true).unwrap());
        assert!(bitmap.get_bit(b"b", 7).unwrap());
        assert!(!bitmap.get_bit(b"b", 6).unwrap());

        // Across a segment boundary.
        assert!(!bitmap.set_bit(&mut batch, b"b", 1024 * 9 + 3, true).unwrap());
        assert!(bitmap.get_bit(b"b", 1024 * 9 + 3).unwrap());
        assert_eq!(bitmap.bit_count(b"b", None, None).unwrap(), 2);
    }

    #[test]
    fn test_clearing_last_bit_destroys_key() {
        let storage = storage();
        let bitmap = BitmapDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        bitmap.set_bit(&mut batch, b"b", 3, true).unwrap();
        assert!(bitmap.set_bit(&mut batch, b"b", 3, false).unwrap());
        assert_eq!(bitmap.bit_count(b"b", None, None).unwrap(), 0);
        assert!(!bitmap.get_bit(b"b", 3).unwrap());
    }

    #[test]
    fn test_bit_count_window() {
        let storage = storage();
        let bitmap = BitmapDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        // "foobar" bit population per redis docs: 26 total, 4 in byte 0,
        // 6 in bytes 1..1.
        for (i, byte) in b"foobar".iter().enumerate() {
            for j in 0..8 {
                if byte & (0x80 >> j) != 0 {
                    bitmap
                        .set_bit(&mut batch, b"k", (i * 8 + j) as u64, true)
                        .unwrap();
                }
            }
        }
        assert_eq!(bitmap.bit_count(b"k", None, None).unwrap(), 26);
        assert_eq!(bitmap.bit_count(b"k", Some(0), Some(0)).unwrap(), 4);
        assert_eq!(bitmap.bit_count(b"k", Some(1), Some(1)).unwrap(), 6);
        assert_eq!(bitmap.bit_count(b"k", Some(0), Some(-1)).unwrap(), 26);
    }

    #[test]
    fn test_bit_pos() {
        let storage = storage();
        let bitmap = BitmapDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(bitmap.bit_pos(b"b", true, None, None).unwrap(), -1);
        assert_eq!(bitmap.bit_pos(b"b", false, None, None).unwrap(), 0);

        bitmap.set_bit(&mut batch, b"b", 13, true).unwrap();
        assert_eq!(bitmap.bit_pos(b"b", true, None, None).unwrap(), 13);
        assert_eq!(bitmap.bit_pos(b"b", false, None, None).unwrap(), 0);
        assert_eq!(bitmap.bit_pos(b"b", true, Some(2), None).unwrap(), -1);
    }
}
