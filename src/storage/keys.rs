// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Physical key layout.
//!
//! Every logical key maps to one metadata row and zero or more sub-key rows
//! in a single keyspace:
//!
//! ```text
//! ['z'] [table_id] [slot_id?] [user_key] [cf_code]                      metadata
//! ['z'] [table_id] [slot_id?] [user_key] [cf_code] [version] [sub_key]  sub-key
//! ```
//!
//! Integers use the sign-flipped big-endian encoding and the user key the
//! memcomparable group encoding, so plain byte order on the store equals
//! the natural order on the tuple.

use codec::bytes::{self, BytesDecoder, BytesEncoder};
use codec::number::{NumberDecoder, NumberEncoder};

use crate::errors::{Error, Result};

/// Discriminator byte reserved in front of every key of this keyspace.
pub const NAMESPACE_PREFIX: u8 = b'z';

pub type CfCode = i64;

pub const CF_CODE_METADATA: CfCode = 1;
pub const CF_CODE_DATA: CfCode = 2;
pub const CF_CODE_ZSET_SCORE: CfCode = 3;

pub const HASH_SLOTS_SIZE: u16 = 16384;

/// Composes the metadata-level key for `(table_id, user_key)`.
pub fn compose_namespace_key(
    table_id: i64,
    user_key: &[u8],
    slot_id_encoded: bool,
    cf_code: CfCode,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_key.len() + 32);
    out.push(NAMESPACE_PREFIX);
    out.encode_i64(table_id).unwrap();
    if slot_id_encoded {
        out.encode_i64(i64::from(slot_num_from_key(user_key))).unwrap();
    }
    out.encode_bytes(user_key, false).unwrap();
    out.encode_i64(cf_code).unwrap();
    out
}

/// Inverts `compose_namespace_key`.
pub fn extract_namespace_key(
    ns_key: &[u8],
    slot_id_encoded: bool,
) -> Result<(i64, Vec<u8>, CfCode)> {
    let mut input = strip_prefix(ns_key)?;
    let table_id = input.decode_i64().map_err(Error::Codec)?;
    if slot_id_encoded {
        input.decode_i64().map_err(Error::Codec)?;
    }
    let user_key = input.decode_bytes(false).map_err(Error::Codec)?;
    let cf_code = input.decode_i64().map_err(Error::Codec)?;
    Ok((table_id, user_key, cf_code))
}

/// Key prefix shared by every row of one cluster slot.
pub fn compose_slot_key_prefix(table_id: i64, slot_id: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(17);
    out.push(NAMESPACE_PREFIX);
    out.encode_i64(table_id).unwrap();
    out.encode_i64(i64::from(slot_id)).unwrap();
    out
}

/// Key prefix shared by every row of one table.
pub fn compose_table_prefix(table_id: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(NAMESPACE_PREFIX);
    out.encode_i64(table_id).unwrap();
    out
}

/// Byte length of the `(prefix, table_id, [slot], user_key)` portion of a
/// physical key. Hosts use it to configure a prefix extractor so bloom
/// filters cover all rows of one logical key.
pub fn namespace_prefix_len(physical_key: &[u8], slot_id_encoded: bool) -> Result<usize> {
    let mut len = 1 + codec::number::I64_SIZE;
    if slot_id_encoded {
        len += codec::number::I64_SIZE;
    }
    if physical_key.len() < len {
        return Err(Error::Codec(codec::Error::KeyLength));
    }
    strip_prefix(physical_key)?;
    len += bytes::encoded_bytes_len(&physical_key[len..], false);
    Ok(len)
}

fn strip_prefix(key: &[u8]) -> Result<&[u8]> {
    match key.first() {
        Some(&NAMESPACE_PREFIX) => Ok(&key[1..]),
        _ => Err(Error::Codec(codec::Error::KeyLength)),
    }
}

/// The parsed form of a sub-key row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalKey {
    table_id: i64,
    slot_id: u16,
    user_key: Vec<u8>,
    cf_code: CfCode,
    version: u64,
    sub_key: Vec<u8>,
    slot_id_encoded: bool,
}

impl InternalKey {
    /// Builds a sub-key for `ns_key`'s logical key under the given cf code
    /// and version. The cf code of `ns_key` itself (metadata) is discarded.
    pub fn from_ns_key(
        ns_key: &[u8],
        sub_key: &[u8],
        version: u64,
        slot_id_encoded: bool,
        cf_code: CfCode,
    ) -> Result<InternalKey> {
        let mut input = strip_prefix(ns_key)?;
        let table_id = input.decode_i64().map_err(Error::Codec)?;
        let slot_id = if slot_id_encoded {
            input.decode_i64().map_err(Error::Codec)? as u16
        } else {
            0
        };
        let user_key = input.decode_bytes(false).map_err(Error::Codec)?;
        Ok(InternalKey {
            table_id,
            slot_id,
            user_key,
            cf_code,
            version,
            sub_key: sub_key.to_vec(),
            slot_id_encoded,
        })
    }

    /// Parses a full physical sub-key row. An absent tail decodes as an
    /// empty sub-key.
    pub fn decode(input: &[u8], slot_id_encoded: bool) -> Result<InternalKey> {
        let mut input = strip_prefix(input)?;
        let table_id = input.decode_i64().map_err(Error::Codec)?;
        let slot_id = if slot_id_encoded {
            input.decode_i64().map_err(Error::Codec)? as u16
        } else {
            0
        };
        let user_key = input.decode_bytes(false).map_err(Error::Codec)?;
        let cf_code = input.decode_i64().map_err(Error::Codec)?;
        let version = input.decode_i64().map_err(Error::Codec)? as u64;
        let sub_key = if input.is_empty() {
            Vec::new()
        } else {
            input.decode_bytes(false).map_err(Error::Codec)?
        };
        Ok(InternalKey {
            table_id,
            slot_id,
            user_key,
            cf_code,
            version,
            sub_key,
            slot_id_encoded,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.user_key.len() + self.sub_key.len() + 48);
        out.push(NAMESPACE_PREFIX);
        out.encode_i64(self.table_id).unwrap();
        if self.slot_id_encoded {
            out.encode_i64(i64::from(slot_num_from_key(&self.user_key)))
                .unwrap();
        }
        out.encode_bytes(&self.user_key, false).unwrap();
        out.encode_i64(self.cf_code).unwrap();
        out.encode_i64(self.version as i64).unwrap();
        if !self.sub_key.is_empty() {
            out.encode_bytes(&self.sub_key, false).unwrap();
        }
        out
    }

    pub fn table_id(&self) -> i64 {
        self.table_id
    }

    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    pub fn cf_code(&self) -> CfCode {
        self.cf_code
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sub_key(&self) -> &[u8] {
        &self.sub_key
    }
}

/// Cluster slot of a user key: CRC16 over the key, or over the hash tag
/// between the first `{}` pair when one is present.
pub fn slot_num_from_key(key: &[u8]) -> u16 {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(close_off) = key[open + 1..].iter().position(|&b| b == b'}') {
            if close_off > 0 {
                let tag = &key[open + 1..open + 1 + close_off];
                return crc16(tag) % HASH_SLOTS_SIZE;
            }
        }
    }
    crc16(key) % HASH_SLOTS_SIZE
}

// CRC16-CCITT (XModem), the redis cluster polynomial.
pub fn crc16(data: &[u8]) -> u16 {
    const CRC16_TAB: [u16; 256] = [
        0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50a5, 0x60c6, 0x70e7, 0x8108, 0x9129, 0xa14a,
        0xb16b, 0xc18c, 0xd1ad, 0xe1ce, 0xf1ef, 0x1231, 0x0210, 0x3273, 0x2252, 0x52b5, 0x4294,
        0x72f7, 0x62d6, 0x9339, 0x8318, 0xb37b, 0xa35a, 0xd3bd, 0xc39c, 0xf3ff, 0xe3de, 0x2462,
        0x3443, 0x0420, 0x1401, 0x64e6, 0x74c7, 0x44a4, 0x5485, 0xa56a, 0xb54b, 0x8528, 0x9509,
        0xe5ee, 0xf5cf, 0xc5ac, 0xd58d, 0x3653, 0x2672, 0x1611, 0x0630, 0x76d7, 0x66f6, 0x5695,
        0x46b4, 0xb75b, 0xa77a, 0x9719, 0x8738, 0xf7df, 0xe7fe, 0xd79d, 0xc7bc, 0x48c4, 0x58e5,
        0x6886, 0x78a7, 0x0840, 0x1861, 0x2802, 0x3823, 0xc9cc, 0xd9ed, 0xe98e, 0xf9af, 0x8948,
        0x9969, 0xa90a, 0xb92b, 0x5af5, 0x4ad4, 0x7ab7, 0x6a96, 0x1a71, 0x0a50, 0x3a33, 0x2a12,
        0xdbfd, 0xcbdc, 0xfbbf, 0xeb9e, 0x9b79, 0x8b58, 0xbb3b, 0xab1a, 0x6ca6, 0x7c87, 0x4ce4,
        0x5cc5, 0x2c22, 0x3c03, 0x0c60, 0x1c41, 0xedae, 0xfd8f, 0xcdec, 0xddcd, 0xad2a, 0xbd0b,
        0x8d68, 0x9d49, 0x7e97, 0x6eb6, 0x5ed5, 0x4ef4, 0x3e13, 0x2e32, 0x1e51, 0x0e70, 0xff9f,
        0xefbe, 0xdfdd, 0xcffc, 0xbf1b, 0xaf3a, 0x9f59, 0x8f78, 0x9188, 0x81a9, 0xb1ca, 0xa1eb,
        0xd10c, 0xc12d, 0xf14e, 0xe16f, 0x1080, 0x00a1, 0x30c2, 0x20e3, 0x5004, 0x4025, 0x7046,
        0x6067, 0x83b9, 0x9398, 0xa3fb, 0xb3da, 0xc33d, 0xd31c, 0xe37f, 0xf35e, 0x02b1, 0x1290,
        0x22f3, 0x32d2, 0x4235, 0x5214, 0x6277, 0x7256, 0xb5ea, 0xa5cb, 0x95a8, 0x8589, 0xf56e,
        0xe54f, 0xd52c, 0xc50d, 0x34e2, 0x24c3, 0x14a0, 0x0481, 0x7466, 0x6447, 0x5424, 0x4405,
        0xa7db, 0xb7fa, 0x8799, 0x97b8, 0xe75f, 0xf77e, 0xc71d, 0xd73c, 0x26d3, 0x36f2, 0x0691,
        0x16b0, 0x6657, 0x7676, 0x4615, 0x5634, 0xd94c, 0xc96d, 0xf90e, 0xe92f, 0x99c8, 0x89e9,
        0xb98a, 0xa9ab, 0x5844, 0x4865, 0x7806, 0x6827, 0x18c0, 0x08e1, 0x3882, 0x28a3, 0xcb7d,
        0xdb5c, 0xeb3f, 0xfb1e, 0x8bf9, 0x9bd8, 0xabbb, 0xbb9a, 0x4a75, 0x5a54, 0x6a37, 0x7a16,
        0x0af1, 0x1ad0, 0x2ab3, 0x3a92, 0xfd2e, 0xed0f, 0xdd6c, 0xcd4d, 0xbdaa, 0xad8b, 0x9de8,
        0x8dc9, 0x7c26, 0x6c07, 0x5c64, 0x4c45, 0x3ca2, 0x2c83, 0x1ce0, 0x0cc1, 0xef1f, 0xff3e,
        0xcf5d, 0xdf7c, 0xaf9b, 0xbfba, 0x8fd9, 0x9ff8, 0x6e17, 0x7e36, 0x4e55, 0x5e74, 0x2e93,
        0x3eb2, 0x0ed1, 0x1ef0,
    ];
    let mut crc: u16 = 0;
    for &b in data {
        crc = (crc << 8) ^ CRC16_TAB[(((crc >> 8) ^ u16::from(b)) & 0x00ff) as usize];
    }
    crc
}
