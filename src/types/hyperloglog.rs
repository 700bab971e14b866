// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! HyperLogLog cardinality sketches.
//!
//! 16384 six-bit dense registers, stored as 16 segments of 1024 registers
//! (768 bytes); the sub-key is the decimal segment index. Hashing is the
//! 64-bit MurmurHash2 the redis implementation uses, and the estimator is
//! Ertl's improved version with the tau/sigma helpers.

use std::collections::BTreeMap;

use engine_traits::{KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::CF_CODE_DATA;
use crate::storage::metadata::{Metadata, RedisType};
use crate::storage::Storage;

pub const HLL_REGISTER_COUNT_POW: u32 = 14;
pub const HLL_REGISTER_COUNT: usize = 1 << HLL_REGISTER_COUNT_POW;
pub const HLL_BITS: usize = 6;
/// Hash bits left after the register index is stripped.
pub const HLL_HASH_BIT_COUNT: u32 = 64 - HLL_REGISTER_COUNT_POW;
pub const HLL_SEGMENT_COUNT: usize = 16;
pub const HLL_REGISTERS_PER_SEGMENT: usize = HLL_REGISTER_COUNT / HLL_SEGMENT_COUNT;
pub const HLL_SEGMENT_BYTES: usize = HLL_REGISTERS_PER_SEGMENT * HLL_BITS / 8;

// 0.5 / ln(2)
const HLL_ALPHA_INF: f64 = 0.721347520444481703680;
const HLL_HASH_SEED: u64 = 0xadc83b19;

/// MurmurHash2, 64-bit version, endian-neutral like the redis port.
fn murmur_hash_64a(data: &[u8], seed: u64) -> u64 {
    const M: u64 = 0xc6a4a7935bd1e995;
    const R: u32 = 47;

    let mut h: u64 = seed ^ (data.len() as u64).wrapping_mul(M);
    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut k = u64::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h ^= k;
        h = h.wrapping_mul(M);
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u64 = 0;
        for (i, &b) in tail.iter().enumerate() {
            k |= u64::from(b) << (8 * i);
        }
        h ^= k;
        h = h.wrapping_mul(M);
    }
    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}

/// Register index of an element plus the length of its trailing 000..1
/// pattern. The sentinel bit keeps the rank at most `HLL_HASH_BIT_COUNT+1`.
fn hll_pat_len(element: &[u8]) -> (usize, u8) {
    let hash = murmur_hash_64a(element, HLL_HASH_SEED);
    let index = (hash & (HLL_REGISTER_COUNT as u64 - 1)) as usize;
    let mut rest = hash >> HLL_REGISTER_COUNT_POW;
    rest |= 1u64 << HLL_HASH_BIT_COUNT;
    let mut bit = 1u64;
    let mut count = 1u8;
    while rest & bit == 0 {
        count += 1;
        bit <<= 1;
    }
    (index, count)
}

/// Six-bit register access over a packed segment, low bits first.
fn get_register(segment: &[u8], index: usize) -> u8 {
    let bit = index * HLL_BITS;
    let byte = bit / 8;
    let shift = bit % 8;
    let b0 = u32::from(segment[byte]);
    let b1 = u32::from(*segment.get(byte + 1).unwrap_or(&0));
    (((b0 >> shift) | (b1 << (8 - shift))) & 0x3f) as u8
}

fn set_register(segment: &mut [u8], index: usize, value: u8) {
    let bit = index * HLL_BITS;
    let byte = bit / 8;
    let shift = bit % 8;
    let value = u32::from(value & 0x3f);
    let mut window = u32::from(segment[byte])
        | (u32::from(*segment.get(byte + 1).unwrap_or(&0)) << 8);
    window &= !(0x3fu32 << shift);
    window |= value << shift;
    segment[byte] = (window & 0xff) as u8;
    if byte + 1 < segment.len() {
        segment[byte + 1] = ((window >> 8) & 0xff) as u8;
    }
}

/// Helper sigma from "New cardinality estimation algorithms for
/// HyperLogLog sketches" (Otmar Ertl, arXiv:1702.01284).
fn hll_sigma(mut x: f64) -> f64 {
    if x == 1.0 {
        return f64::INFINITY;
    }
    let mut z_prime;
    let mut y = 1.0;
    let mut z = x;
    loop {
        x *= x;
        z_prime = z;
        z += x * y;
        y += y;
        if z_prime == z {
            break;
        }
    }
    z
}

/// Helper tau from the same paper.
fn hll_tau(mut x: f64) -> f64 {
    if x == 0.0 || x == 1.0 {
        return 0.0;
    }
    let mut z_prime;
    let mut y = 1.0;
    let mut z = 1.0 - x;
    loop {
        x = x.sqrt();
        z_prime = z;
        y *= 0.5;
        z -= (1.0 - x).powi(2) * y;
        if z_prime == z {
            break;
        }
    }
    z / 3.0
}

/// Ertl's estimator over one unpacked register per byte.
fn hll_count(registers: &[u8]) -> u64 {
    let m = HLL_REGISTER_COUNT as f64;
    let mut reghisto = [0u32; 64];
    for &reg in registers {
        reghisto[reg as usize] += 1;
    }

    let q = HLL_HASH_BIT_COUNT as usize;
    let mut z = m * hll_tau((m - f64::from(reghisto[q + 1])) / m);
    for j in (1..=q).rev() {
        z += f64::from(reghisto[j]);
        z *= 0.5;
    }
    z += m * hll_sigma(f64::from(reghisto[0]) / m);
    (HLL_ALPHA_INF * m * m / z).round() as u64
}

fn merge_max(max: &mut [u8], registers: &[u8]) {
    for (dst, &src) in max.iter_mut().zip(registers) {
        if src > *dst {
            *dst = src;
        }
    }
}

pub struct HyperloglogDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> HyperloglogDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> HyperloglogDb<'a, E> {
        HyperloglogDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::Hyperloglog, ns_key)
    }

    fn segment_sub_key(segment_index: usize) -> Vec<u8> {
        segment_index.to_string().into_bytes()
    }

    /// Adds elements, bumping registers whose observed rank grew. Returns
    /// 1 when any register changed, like PFADD.
    pub fn add(&self, batch: &mut E::WriteBatch, user_key: &[u8], elements: &[&[u8]]) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Hyperloglog, true),
            Err(e) => return Err(e),
        };

        let mut cache: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
        let mut dirty: Vec<usize> = Vec::new();
        let mut grown_registers = 0u32;
        for element in elements {
            let (register_index, rank) = hll_pat_len(element);
            let segment_index = register_index / HLL_REGISTERS_PER_SEGMENT;
            let index_in_segment = register_index % HLL_REGISTERS_PER_SEGMENT;

            if !cache.contains_key(&segment_index) {
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
                    .unwrap_or_else(|| vec![0u8; HLL_SEGMENT_BYTES]);
                if segment.len() < HLL_SEGMENT_BYTES {
                    segment.resize(HLL_SEGMENT_BYTES, 0);
                }
                cache.insert(segment_index, segment);
            }
            let segment = cache.get_mut(&segment_index).unwrap();
            let old = get_register(segment, index_in_segment);
            if rank > old {
                set_register(segment, index_in_segment, rank);
                if old == 0 {
                    grown_registers += 1;
                }
                if !dirty.contains(&segment_index) {
                    dirty.push(segment_index);
                }
            }
        }
        if dirty.is_empty() {
            return Ok(0);
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hyperloglog).encode())?;
        for segment_index in dirty {
            let sub_key = self.db.make_sub_key(
                &ns_key,
                CF_CODE_DATA,
                metadata.version,
                &Self::segment_sub_key(segment_index),
            )?;
            local.put(&sub_key, &cache[&segment_index])?;
        }
        metadata.size += grown_registers;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(1)
    }

    pub fn count(&self, user_key: &[u8]) -> Result<u64> {
        let registers = self.get_registers(user_key)?;
        Ok(hll_count(&registers))
    }

    /// Cardinality of the union of several sketches, without writing the
    /// merged registers anywhere.
    pub fn count_multi(&self, user_keys: &[&[u8]]) -> Result<u64> {
        let mut max = vec![0u8; HLL_REGISTER_COUNT];
        for user_key in user_keys {
            let registers = self.get_registers(user_key)?;
            merge_max(&mut max, &registers);
        }
        Ok(hll_count(&max))
    }

    /// Merges `sources` (and the destination itself) into the destination
    /// by taking the per-register maximum.
    pub fn merge(&self, batch: &mut E::WriteBatch, dest: &[u8], sources: &[&[u8]]) -> Result<()> {
        let mut max = self.get_registers(dest)?;
        for source in sources {
            let registers = self.get_registers(source)?;
            merge_max(&mut max, &registers);
        }

        let ns_key = self.db.encode_namespace_prefix(dest);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => Metadata::new(RedisType::Hyperloglog, true),
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::Hyperloglog).encode())?;
        let mut nonzero = 0u32;
        for segment_index in 0..HLL_SEGMENT_COUNT {
            let from = segment_index * HLL_REGISTERS_PER_SEGMENT;
            let registers = &max[from..from + HLL_REGISTERS_PER_SEGMENT];
            nonzero += registers.iter().filter(|&&r| r != 0).count() as u32;
            if registers.iter().all(|&r| r == 0) {
                continue;
            }
            let mut segment = vec![0u8; HLL_SEGMENT_BYTES];
            for (i, &r) in registers.iter().enumerate() {
                set_register(&mut segment, i, r);
            }
            let sub_key = self.db.make_sub_key(
                &ns_key,
                CF_CODE_DATA,
                metadata.version,
                &Self::segment_sub_key(segment_index),
            )?;
            local.put(&sub_key, &segment)?;
        }
        metadata.size = nonzero;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)
    }

    /// One unpacked byte per register, zeros when the key is absent.
    fn get_registers(&self, user_key: &[u8]) -> Result<Vec<u8>> {
        let mut registers = vec![0u8; HLL_REGISTER_COUNT];
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(registers),
            Err(e) => return Err(e),
        };
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, &ns_key, CF_CODE_DATA, metadata.version)?;
        for (sub_key, segment) in rows {
            let segment_index: usize = std::str::from_utf8(&sub_key)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::NotNumber)?;
            if segment_index >= HLL_SEGMENT_COUNT {
                continue;
            }
            let base = segment_index * HLL_REGISTERS_PER_SEGMENT;
            for i in 0..HLL_REGISTERS_PER_SEGMENT {
                registers[base + i] = get_register(&segment, i);
            }
        }
        Ok(registers)
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
    fn test_register_packing() {
        let mut segment = vec![0u8; HLL_SEGMENT_BYTES];
        set_register(&mut segment, 0, 63);
        set_register(&mut segment, 1, 1);
        set_register(&mut segment, 1023, 33);
        assert_eq!(get_register(&segment, 0), 63);
        assert_eq!(get_register(&segment, 1), 1);
        assert_eq!(get_register(&segment, 2), 0);
        assert_eq!(get_register(&segment, 1023), 33);

        set_register(&mut segment, 0, 0);
        assert_eq!(get_register(&segment, 0), 0);
        assert_eq!(get_register(&segment, 1), 1);
    }

    #[test]
    fn test_pat_len_bounds() {
        for i in 0..1000u32 {
            let (index, rank) = hll_pat_len(&i.to_be_bytes());
            assert!(index < HLL_REGISTER_COUNT);
            assert!(rank >= 1);
            assert!(u32::from(rank) <= HLL_HASH_BIT_COUNT + 1);
        }
    }

    #[test]
    fn test_add_and_count_accuracy() {
        let storage = storage();
        let hll = HyperloglogDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(hll.count(b"h").unwrap(), 0);

        let n = 5000u32;
        for i in 0..n {
            let element = format!("element-{}", i);
            hll.add(&mut batch, b"h", &[element.as_bytes()]).unwrap();
        }
        let estimate = hll.count(b"h").unwrap() as f64;
        // Dense HLL with 16384 registers has ~0.81% standard error; allow
        // a generous 5%.
        assert!((estimate - f64::from(n)).abs() < f64::from(n) * 0.05);

        // Re-adding the same elements changes nothing.
        assert_eq!(
            hll.add(&mut batch, b"h", &[b"element-0"]).unwrap(),
            0
        );
    }

    #[test]
    fn test_merge() {
        let storage = storage();
        let hll = HyperloglogDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        for i in 0..1000u32 {
            hll.add(&mut batch, b"a", &[format!("a-{}", i).as_bytes()])
                .unwrap();
            hll.add(&mut batch, b"b", &[format!("b-{}", i).as_bytes()])
                .unwrap();
        }
        hll.merge(&mut batch, b"dst", &[b"a", b"b"]).unwrap();
        let estimate = hll.count(b"dst").unwrap() as f64;
        assert!((estimate - 2000.0).abs() < 2000.0 * 0.05);
    }
}
