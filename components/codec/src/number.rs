// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{Error, Result};

const SIGN_MARK: u64 = 0x8000000000000000;

pub const U8_SIZE: usize = 1;
pub const U32_SIZE: usize = 4;
pub const U64_SIZE: usize = 8;
pub const I64_SIZE: usize = 8;
pub const F64_SIZE: usize = 8;

#[inline]
fn order_encode_i64(v: i64) -> u64 {
    (v as u64) ^ SIGN_MARK
}

#[inline]
fn order_decode_i64(u: u64) -> i64 {
    (u ^ SIGN_MARK) as i64
}

pub trait NumberEncoder: Write {
    /// Writes the memcomparable encoding of `v`.
    ///
    /// The encoded value is in ascending order for comparison over the whole
    /// signed 64-bit domain.
    fn encode_i64(&mut self, v: i64) -> Result<()> {
        self.encode_u64(order_encode_i64(v))
    }

    /// Writes the memcomparable encoding of `v` in descending order.
    fn encode_i64_desc(&mut self, v: i64) -> Result<()> {
        self.encode_u64_desc(order_encode_i64(v))
    }

    /// Writes `v` as 8 big-endian bytes, ascending order for comparison.
    fn encode_u64(&mut self, v: u64) -> Result<()> {
        let mut buf = [0; U64_SIZE];
        BigEndian::write_u64(&mut buf, v);
        self.write_all(&buf).map_err(From::from)
    }

    /// Writes `v` as 8 big-endian bytes, descending order for comparison.
    fn encode_u64_desc(&mut self, v: u64) -> Result<()> {
        self.encode_u64(!v)
    }

    fn encode_u8(&mut self, v: u8) -> Result<()> {
        self.write_all(&[v]).map_err(From::from)
    }

    /// Little-endian fixed-width encoding, used for values (not keys).
    fn encode_u32_le(&mut self, v: u32) -> Result<()> {
        let mut buf = [0; U32_SIZE];
        LittleEndian::write_u32(&mut buf, v);
        self.write_all(&buf).map_err(From::from)
    }

    /// Little-endian fixed-width encoding, used for values (not keys).
    fn encode_u64_le(&mut self, v: u64) -> Result<()> {
        let mut buf = [0; U64_SIZE];
        LittleEndian::write_u64(&mut buf, v);
        self.write_all(&buf).map_err(From::from)
    }
}

impl<T: Write> NumberEncoder for T {}

#[inline]
fn read_num_bytes<T, F>(size: usize, data: &mut &[u8], f: F) -> Result<T>
where
    F: Fn(&[u8]) -> T,
{
    if data.len() >= size {
        let buf = &data[..size];
        *data = &data[size..];
        return Ok(f(buf));
    }
    Err(Error::KeyLength)
}

pub trait NumberDecoder {
    fn decode_i64(&mut self) -> Result<i64>;
    fn decode_i64_desc(&mut self) -> Result<i64>;
    fn decode_u64(&mut self) -> Result<u64>;
    fn decode_u64_desc(&mut self) -> Result<u64>;
    fn decode_u8(&mut self) -> Result<u8>;
    fn decode_u32_le(&mut self) -> Result<u32>;
    fn decode_u64_le(&mut self) -> Result<u64>;
}

impl NumberDecoder for &[u8] {
    /// Decodes a value encoded by `encode_i64` before.
    fn decode_i64(&mut self) -> Result<i64> {
        self.decode_u64().map(order_decode_i64)
    }

    /// Decodes a value encoded by `encode_i64_desc` before.
    fn decode_i64_desc(&mut self) -> Result<i64> {
        self.decode_u64_desc().map(order_decode_i64)
    }

    /// Decodes a value encoded by `encode_u64` before.
    fn decode_u64(&mut self) -> Result<u64> {
        read_num_bytes(U64_SIZE, self, BigEndian::read_u64)
    }

    /// Decodes a value encoded by `encode_u64_desc` before.
    fn decode_u64_desc(&mut self) -> Result<u64> {
        self.decode_u64().map(|v| !v)
    }

    fn decode_u8(&mut self) -> Result<u8> {
        read_num_bytes(U8_SIZE, self, |buf| buf[0])
    }

    fn decode_u32_le(&mut self) -> Result<u32> {
        read_num_bytes(U32_SIZE, self, LittleEndian::read_u32)
    }

    fn decode_u64_le(&mut self) -> Result<u64> {
        read_num_bytes(U64_SIZE, self, LittleEndian::read_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_codec() {
        let cases = vec![i64::MAX, i64::MIN, -2, -3, 0, 0, 4, 1024];
        for &v in &cases {
            let mut buf = vec![];
            buf.encode_i64(v).unwrap();
            assert_eq!(buf.len(), I64_SIZE);
            assert_eq!(v, buf.as_slice().decode_i64().unwrap());

            let mut buf = vec![];
            buf.encode_i64_desc(v).unwrap();
            assert_eq!(v, buf.as_slice().decode_i64_desc().unwrap());
        }
    }

    #[test]
    fn test_i64_order() {
        let mut cases = vec![i64::MAX, i64::MIN, -2, -3, 0, 4, 1024];
        let mut encoded: Vec<Vec<u8>> = cases
            .iter()
            .map(|&v| {
                let mut buf = vec![];
                buf.encode_i64(v).unwrap();
                buf
            })
            .collect();
        cases.sort_unstable();
        encoded.sort();
        let decoded: Vec<i64> = encoded
            .iter()
            .map(|buf| buf.as_slice().decode_i64().unwrap())
            .collect();
        assert_eq!(decoded, cases);
    }

    #[test]
    fn test_u64_order() {
        let mut cases = vec![u64::MAX, u64::MIN, u64::MAX / 2, 2, 3, 0, 4, 1024];
        let mut encoded: Vec<Vec<u8>> = cases
            .iter()
            .map(|&v| {
                let mut buf = vec![];
                buf.encode_u64(v).unwrap();
                buf
            })
            .collect();
        cases.sort_unstable();
        cases.dedup();
        encoded.sort();
        encoded.dedup();
        let decoded: Vec<u64> = encoded
            .iter()
            .map(|buf| buf.as_slice().decode_u64().unwrap())
            .collect();
        assert_eq!(decoded, cases);
    }

    #[test]
    fn test_le_codec() {
        let mut buf = vec![];
        buf.encode_u32_le(0xdeadbeef).unwrap();
        buf.encode_u64_le(0x0102030405060708).unwrap();
        let mut input = buf.as_slice();
        assert_eq!(0xdeadbeef, input.decode_u32_le().unwrap());
        assert_eq!(0x0102030405060708, input.decode_u64_le().unwrap());
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_short_input() {
        let buf = [0u8; 7];
        let mut input = buf.as_slice();
        assert!(input.decode_i64().is_err());
        let mut input = &buf[..4];
        assert!(input.decode_u32_le().is_ok());
        let mut input = &buf[..3];
        assert!(input.decode_u32_le().is_err());
    }
}
