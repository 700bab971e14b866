// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Per-logical-key metadata.
//!
//! Exactly one metadata row per live logical key. The value starts with a
//! 5-byte header (type flags + absolute expiration); every type except
//! string carries a version epoch and an aggregate size, and lists add
//! head/tail cursors. All value fields are little-endian.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

use codec::number::{NumberDecoder, NumberEncoder};

use crate::errors::{Error, Result};

/// flags(1) + expire(4).
pub const METADATA_HEADER_SIZE: usize = 5;

// 52 bits of microseconds and 11 bits of counter.
const VERSION_COUNTER_BITS: u32 = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RedisType {
    None = 0,
    String = 1,
    Hash = 2,
    List = 3,
    Set = 4,
    ZSet = 5,
    Bitmap = 6,
    Sortedint = 7,
    Hyperloglog = 8,
}

impl RedisType {
    pub fn from_flags(flags: u8) -> RedisType {
        match flags & 0x0f {
            1 => RedisType::String,
            2 => RedisType::Hash,
            3 => RedisType::List,
            4 => RedisType::Set,
            5 => RedisType::ZSet,
            6 => RedisType::Bitmap,
            7 => RedisType::Sortedint,
            8 => RedisType::Hyperloglog,
            _ => RedisType::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RedisType::None => "none",
            RedisType::String => "string",
            RedisType::Hash => "hash",
            RedisType::List => "list",
            RedisType::Set => "set",
            RedisType::ZSet => "zset",
            RedisType::Bitmap => "bitmap",
            RedisType::Sortedint => "sortedint",
            RedisType::Hyperloglog => "hyperloglog",
        }
    }
}

/// Command tag carried in write-batch log data for replication decoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RedisCommand {
    LSet = 0,
    LInsert = 1,
    LTrim = 2,
    LPop = 3,
    RPop = 4,
    LRem = 5,
    LPush = 6,
    RPush = 7,
    Expire = 8,
    SetBit = 9,
    BitOp = 10,
    LMove = 11,
}

static VERSION_COUNTER: AtomicU64 = AtomicU64::new(0);
static VERSION_COUNTER_INIT: Once = Once::new();

/// Seeds the process-wide version counter from a random position so that
/// versions stay unique across a clock rewind (e.g. a replica promoted to
/// master).
fn version_counter() -> &'static AtomicU64 {
    VERSION_COUNTER_INIT.call_once(|| {
        let seed = rand::random::<u64>();
        VERSION_COUNTER.store(seed, Ordering::Relaxed);
        info!("initialize version counter"; "seed" => seed);
    });
    &VERSION_COUNTER
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn generate_version() -> u64 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    let counter = version_counter().fetch_add(1, Ordering::Relaxed);
    (micros << VERSION_COUNTER_BITS) + (counter % (1 << VERSION_COUNTER_BITS))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub flags: u8,
    /// Absolute expiration, seconds since epoch. 0 means no TTL.
    pub expire: u32,
    /// Per-creation epoch; absent (0) for strings.
    pub version: u64,
    /// Elements / fields / bits set, depending on type.
    pub size: u32,
}

impl Metadata {
    pub fn new(redis_type: RedisType, generate: bool) -> Metadata {
        Metadata {
            flags: 0x0f & redis_type as u8,
            expire: 0,
            version: if generate { generate_version() } else { 0 },
            size: 0,
        }
    }

    pub fn redis_type(&self) -> RedisType {
        RedisType::from_flags(self.flags)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(17);
        self.encode_into(&mut dst);
        dst
    }

    pub fn encode_into(&self, dst: &mut Vec<u8>) {
        dst.encode_u8(self.flags).unwrap();
        dst.encode_u32_le(self.expire).unwrap();
        if self.redis_type() != RedisType::String {
            dst.encode_u64_le(self.version).unwrap();
            dst.encode_u32_le(self.size).unwrap();
        }
    }

    /// Decodes the metadata prefix of `bytes`. Longer input is fine: a
    /// string row carries its body right after the header.
    pub fn decode(bytes: &[u8]) -> Result<Metadata> {
        let mut input = bytes;
        let flags = input.decode_u8().map_err(|_| Error::MetaShort)?;
        let expire = input.decode_u32_le().map_err(|_| Error::MetaShort)?;
        let mut metadata = Metadata {
            flags,
            expire,
            version: 0,
            size: 0,
        };
        if metadata.redis_type() != RedisType::String {
            metadata.version = input.decode_u64_le().map_err(|_| Error::MetaShort)?;
            metadata.size = input.decode_u32_le().map_err(|_| Error::MetaShort)?;
        }
        Ok(metadata)
    }

    /// An empty composite key and an elapsed TTL both read as absent.
    pub fn expired(&self) -> bool {
        if self.redis_type() != RedisType::String && self.size == 0 {
            return true;
        }
        self.expire > 0 && u64::from(self.expire) < now_secs()
    }

    /// Remaining TTL in seconds; -1 without TTL, -2 when already expired.
    pub fn ttl(&self) -> i64 {
        if self.expire == 0 {
            return -1;
        }
        let now = now_secs();
        if u64::from(self.expire) < now {
            return -2;
        }
        u64::from(self.expire) as i64 - now as i64
    }

    /// Microseconds timestamp the current version was generated at.
    pub fn version_time_micros(&self) -> u64 {
        self.version >> VERSION_COUNTER_BITS
    }
}

pub const LIST_INITIAL_CURSOR: u64 = u64::MAX / 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListMetadata {
    pub meta: Metadata,
    /// First live index, inclusive.
    pub head: u64,
    /// Last live index, exclusive.
    pub tail: u64,
}

impl ListMetadata {
    pub fn new(generate: bool) -> ListMetadata {
        ListMetadata {
            meta: Metadata::new(RedisType::List, generate),
            head: LIST_INITIAL_CURSOR,
            tail: LIST_INITIAL_CURSOR,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(33);
        self.meta.encode_into(&mut dst);
        dst.encode_u64_le(self.head).unwrap();
        dst.encode_u64_le(self.tail).unwrap();
        dst
    }

    pub fn decode(bytes: &[u8]) -> Result<ListMetadata> {
        let meta = Metadata::decode(bytes)?;
        if bytes.len() < 33 {
            return Err(Error::MetaShort);
        }
        let mut input = &bytes[17..];
        let head = input.decode_u64_le().map_err(|_| Error::MetaShort)?;
        let tail = input.decode_u64_le().map_err(|_| Error::MetaShort)?;
        Ok(ListMetadata { meta, head, tail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip() {
        let mut meta = Metadata::new(RedisType::Hash, true);
        meta.expire = 123456;
        meta.size = 42;
        let encoded = meta.encode();
        assert_eq!(encoded.len(), 17);
        assert_eq!(Metadata::decode(&encoded).unwrap(), meta);
    }

    #[test]
    fn test_string_metadata_is_header_only() {
        let meta = Metadata::new(RedisType::String, false);
        let mut encoded = meta.encode();
        assert_eq!(encoded.len(), METADATA_HEADER_SIZE);
        // A string row carries the value body after the header.
        encoded.extend_from_slice(b"value-body");
        assert_eq!(Metadata::decode(&encoded).unwrap(), meta);
    }

    #[test]
    fn test_list_metadata_round_trip() {
        let mut meta = ListMetadata::new(true);
        meta.meta.size = 3;
        meta.head -= 1;
        meta.tail += 2;
        let encoded = meta.encode();
        assert_eq!(encoded.len(), 33);
        assert_eq!(ListMetadata::decode(&encoded).unwrap(), meta);
    }

    #[test]
    fn test_decode_short_input() {
        assert!(matches!(
            Metadata::decode(&[0x02, 0, 0]),
            Err(Error::MetaShort)
        ));
        let meta = Metadata::new(RedisType::List, false);
        assert!(matches!(
            ListMetadata::decode(&meta.encode()),
            Err(Error::MetaShort)
        ));
    }

    #[test]
    fn test_expired() {
        let mut meta = Metadata::new(RedisType::Hash, true);
        assert!(meta.expired()); // size == 0 reads as absent
        meta.size = 1;
        assert!(!meta.expired());
        meta.expire = 1;
        assert!(meta.expired());
        assert_eq!(meta.ttl(), -2);
        meta.expire = 0;
        assert_eq!(meta.ttl(), -1);

        let mut s = Metadata::new(RedisType::String, false);
        assert!(!s.expired()); // strings have no size
        s.expire = u32::MAX;
        assert!(!s.expired());
        assert!(s.ttl() > 0);
    }

    #[test]
    fn test_version_unique_and_advancing() {
        let mut versions: Vec<u64> = (0..200)
            .map(|_| Metadata::new(RedisType::Set, true).version)
            .collect();
        let before = *versions.last().unwrap();
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), 200);

        // Across a microsecond boundary the timestamp half dominates.
        std::thread::sleep(std::time::Duration::from_millis(2));
        let after = Metadata::new(RedisType::Set, true).version;
        assert!(after > before);
    }
}
