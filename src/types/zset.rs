// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Sorted sets: two rows per member, distinguished by cf code.
//!
//! The member row (`CF_DATA`) maps member → encoded score; the score row
//! (`CF_ZSET_SCORE`) has sub-key `score_bytes || member` and an empty
//! value, so walking score rows in byte order yields (score, member)
//! order. Scores use the sortable big-endian double transform.

use codec::convert::{decode_comparable_u64_to_f64, encode_f64_to_comparable_u64};
use engine_traits::{IterOptions, Iterable, Iterator, KvEngine, Mutable, Peekable, WriteBatch};

use crate::errors::{Error, Result};
use crate::storage::db::{Database, WriteBatchLogData};
use crate::storage::keys::{InternalKey, CF_CODE_DATA, CF_CODE_ZSET_SCORE};
use crate::storage::metadata::{Metadata, RedisType};
use crate::storage::Storage;

#[derive(Clone, Debug, PartialEq)]
pub struct MemberScore {
    pub member: Vec<u8>,
    pub score: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ZAddFlags {
    /// Only create new members.
    pub nx: bool,
    /// Only update existing members.
    pub xx: bool,
}

/// Score interval with redis `[`, `(`, `-inf`, `+inf` conventions.
#[derive(Clone, Copy, Debug)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub minex: bool,
    pub maxex: bool,
    pub offset: i64,
    pub count: i64,
    pub reversed: bool,
}

impl Default for RangeSpec {
    fn default() -> RangeSpec {
        RangeSpec {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            minex: false,
            maxex: false,
            offset: -1,
            count: -1,
            reversed: false,
        }
    }
}

/// Lexicographic interval with redis `[`, `(`, `-`, `+` conventions.
#[derive(Clone, Debug)]
pub struct RangeLexSpec {
    pub min: Vec<u8>,
    pub max: Vec<u8>,
    pub minex: bool,
    pub maxex: bool,
    pub min_infinite: bool,
    pub max_infinite: bool,
    pub offset: i64,
    pub count: i64,
}

impl Default for RangeLexSpec {
    fn default() -> RangeLexSpec {
        RangeLexSpec {
            min: Vec::new(),
            max: Vec::new(),
            minex: false,
            maxex: false,
            min_infinite: false,
            max_infinite: false,
            offset: -1,
            count: -1,
        }
    }
}

pub fn parse_range_spec(min: &[u8], max: &[u8]) -> Result<RangeSpec> {
    let mut spec = RangeSpec::default();
    let (minex, min) = parse_score_bound(min)?;
    let (maxex, max) = parse_score_bound(max)?;
    spec.minex = minex;
    spec.maxex = maxex;
    spec.min = min;
    spec.max = max;
    Ok(spec)
}

fn parse_score_bound(bound: &[u8]) -> Result<(bool, f64)> {
    let (exclusive, rest) = match bound.first() {
        Some(b'(') => (true, &bound[1..]),
        Some(b'[') => (false, &bound[1..]),
        _ => (false, bound),
    };
    let text = std::str::from_utf8(rest)
        .map_err(|_| Error::RedisParseErr("min or max is not a float".to_owned()))?;
    let value = match text {
        "-inf" => f64::NEG_INFINITY,
        "+inf" | "inf" => f64::INFINITY,
        _ => text
            .parse::<f64>()
            .map_err(|_| Error::RedisParseErr("min or max is not a float".to_owned()))?,
    };
    Ok((exclusive, value))
}

pub fn parse_range_lex_spec(min: &[u8], max: &[u8]) -> Result<RangeLexSpec> {
    let mut spec = RangeLexSpec::default();
    match min {
        b"-" => spec.min_infinite = true,
        _ => {
            let (ex, rest) = parse_lex_bound(min)?;
            spec.minex = ex;
            spec.min = rest;
        }
    }
    match max {
        b"+" => spec.max_infinite = true,
        _ => {
            let (ex, rest) = parse_lex_bound(max)?;
            spec.maxex = ex;
            spec.max = rest;
        }
    }
    Ok(spec)
}

fn parse_lex_bound(bound: &[u8]) -> Result<(bool, Vec<u8>)> {
    match bound.first() {
        Some(b'(') => Ok((true, bound[1..].to_vec())),
        Some(b'[') => Ok((false, bound[1..].to_vec())),
        _ => Err(Error::RedisParseErr(
            "the min/max isn't in the lex range format".to_owned(),
        )),
    }
}

fn encode_score(score: f64) -> [u8; 8] {
    encode_f64_to_comparable_u64(score).to_be_bytes()
}

fn decode_score(bytes: &[u8]) -> Result<f64> {
    if bytes.len() < 8 {
        return Err(Error::Codec(codec::Error::KeyLength));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    Ok(decode_comparable_u64_to_f64(u64::from_be_bytes(buf)))
}

fn score_member_sub_key(score: f64, member: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + member.len());
    out.extend_from_slice(&encode_score(score));
    out.extend_from_slice(member);
    out
}

fn split_score_sub_key(sub_key: &[u8]) -> Result<(f64, &[u8])> {
    let score = decode_score(sub_key)?;
    Ok((score, &sub_key[8..]))
}

pub struct ZSetDb<'a, E: KvEngine> {
    db: Database<'a, E>,
}

impl<'a, E: KvEngine> ZSetDb<'a, E> {
    pub fn new(storage: &'a Storage<E>, table_id: i64) -> ZSetDb<'a, E> {
        ZSetDb {
            db: Database::new(storage, table_id),
        }
    }

    fn get_metadata(&self, ns_key: &[u8]) -> Result<Metadata> {
        self.db.get_metadata(RedisType::ZSet, ns_key)
    }

    pub fn card(&self, user_key: &[u8]) -> Result<u32> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        match self.get_metadata(&ns_key) {
            Ok(metadata) => Ok(metadata.size),
            Err(ref e) if e.is_absent() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Writes both rows of every member; returns how many were newly
    /// created.
    pub fn add(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        flags: ZAddFlags,
        mscores: &[MemberScore],
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => {
                if flags.xx {
                    return Ok(0);
                }
                Metadata::new(RedisType::ZSet, true)
            }
            Err(e) => return Err(e),
        };

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::ZSet).encode())?;
        let mut added = 0i64;
        let mut changed = false;
        for ms in mscores {
            let member_key =
                self.db
                    .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &ms.member)?;
            match self.db.storage.engine().get_value(&member_key)? {
                Some(old_bytes) => {
                    if flags.nx {
                        continue;
                    }
                    let old_score = decode_score(&old_bytes)?;
                    if old_score == ms.score {
                        continue;
                    }
                    let old_score_key = self.db.make_sub_key(
                        &ns_key,
                        CF_CODE_ZSET_SCORE,
                        metadata.version,
                        &score_member_sub_key(old_score, &ms.member),
                    )?;
                    local.delete(&old_score_key)?;
                }
                None => {
                    if flags.xx {
                        continue;
                    }
                    added += 1;
                }
            }
            local.put(&member_key, &encode_score(ms.score))?;
            let score_key = self.db.make_sub_key(
                &ns_key,
                CF_CODE_ZSET_SCORE,
                metadata.version,
                &score_member_sub_key(ms.score, &ms.member),
            )?;
            local.put(&score_key, b"")?;
            changed = true;
        }
        if changed || added > 0 {
            metadata.size += added as u32;
            local.put(&ns_key, &metadata.encode())?;
            self.db.apply(batch, local)?;
        }
        Ok(added)
    }

    /// Adds `increment` to a member's score. `None` when an NX/XX guard
    /// blocked the write.
    pub fn incr_by(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        member: &[u8],
        increment: f64,
        flags: ZAddFlags,
    ) -> Result<Option<f64>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let mut metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => {
                if flags.xx {
                    return Ok(None);
                }
                Metadata::new(RedisType::ZSet, true)
            }
            Err(e) => return Err(e),
        };

        let member_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
        let old = self.db.storage.engine().get_value(&member_key)?;
        let old_score = match &old {
            Some(bytes) => {
                if flags.nx {
                    return Ok(None);
                }
                Some(decode_score(bytes)?)
            }
            None => {
                if flags.xx {
                    return Ok(None);
                }
                None
            }
        };
        let new_score = old_score.unwrap_or(0.0) + increment;
        if new_score.is_nan() {
            return Err(Error::NotNumber);
        }

        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::ZSet).encode())?;
        if let Some(old_score) = old_score {
            local.delete(&self.db.make_sub_key(
                &ns_key,
                CF_CODE_ZSET_SCORE,
                metadata.version,
                &score_member_sub_key(old_score, member),
            )?)?;
        } else {
            metadata.size += 1;
        }
        local.put(&member_key, &encode_score(new_score))?;
        local.put(
            &self.db.make_sub_key(
                &ns_key,
                CF_CODE_ZSET_SCORE,
                metadata.version,
                &score_member_sub_key(new_score, member),
            )?,
            b"",
        )?;
        local.put(&ns_key, &metadata.encode())?;
        self.db.apply(batch, local)?;
        Ok(Some(new_score))
    }

    pub fn score(&self, user_key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(None),
            Err(e) => return Err(e),
        };
        let member_key = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
        match self.db.storage.engine().get_value(&member_key)? {
            Some(bytes) => Ok(Some(decode_score(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn mget(&self, user_key: &[u8], members: &[&[u8]]) -> Result<Vec<Option<f64>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(vec![None; members.len()]),
            Err(e) => return Err(e),
        };
        let snapshot = self.db.storage.engine().snapshot();
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let member_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
            out.push(match snapshot.get_value(&member_key)? {
                Some(bytes) => Some(decode_score(&bytes)?),
                None => None,
            });
        }
        Ok(out)
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
        local.put_log_data(&WriteBatchLogData::new(RedisType::ZSet).encode())?;
        let mut removed = 0i64;
        for member in members {
            let member_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
            if let Some(bytes) = self.db.storage.engine().get_value(&member_key)? {
                let score = decode_score(&bytes)?;
                local.delete(&member_key)?;
                local.delete(&self.db.make_sub_key(
                    &ns_key,
                    CF_CODE_ZSET_SCORE,
                    metadata.version,
                    &score_member_sub_key(score, member),
                )?)?;
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

    /// Walks the score rows of one generation within `spec`, in rank order
    /// (reverse rank when `spec.reversed`), applying offset/count limits.
    fn walk_score_range(
        &self,
        ns_key: &[u8],
        metadata: &Metadata,
        spec: &RangeSpec,
    ) -> Result<Vec<MemberScore>> {
        let (prefix, upper) =
            self.db
                .sub_key_bounds(ns_key, CF_CODE_ZSET_SCORE, metadata.version)?;
        let snapshot = self.db.storage.engine().snapshot();
        let mut iter =
            snapshot.iterator_opt(IterOptions::new(Some(prefix.clone()), Some(upper.clone())))?;

        let mut out = Vec::new();
        if spec.count == 0 {
            return Ok(out);
        }
        let mut skipped = 0i64;
        let mut valid = if spec.reversed {
            iter.seek_for_prev(&upper)?
        } else {
            let start = self.db.make_sub_key(
                ns_key,
                CF_CODE_ZSET_SCORE,
                metadata.version,
                &encode_score(spec.min),
            )?;
            iter.seek(&start)?
        };
        while valid {
            let ikey = InternalKey::decode(iter.key(), self.db.storage.is_slot_id_encoded())?;
            let (score, member) = split_score_sub_key(ikey.sub_key())?;
            if spec.reversed {
                if score > spec.max || (spec.maxex && score == spec.max) {
                    valid = iter.prev()?;
                    continue;
                }
                if score < spec.min || (spec.minex && score == spec.min) {
                    break;
                }
            } else {
                if score < spec.min || (spec.minex && score == spec.min) {
                    valid = iter.next()?;
                    continue;
                }
                if score > spec.max || (spec.maxex && score == spec.max) {
                    break;
                }
            }
            if spec.offset >= 0 && skipped < spec.offset {
                skipped += 1;
            } else {
                out.push(MemberScore {
                    member: member.to_vec(),
                    score,
                });
                if spec.count >= 0 && out.len() as i64 >= spec.count {
                    break;
                }
            }
            valid = if spec.reversed { iter.prev()? } else { iter.next()? };
        }
        Ok(out)
    }

    pub fn range_by_score(&self, user_key: &[u8], spec: &RangeSpec) -> Result<Vec<MemberScore>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.walk_score_range(&ns_key, &metadata, spec)
    }

    pub fn count(&self, user_key: &[u8], spec: &RangeSpec) -> Result<i64> {
        Ok(self.range_by_score(user_key, spec)?.len() as i64)
    }

    pub fn remove_range_by_score(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        spec: &RangeSpec,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };
        let doomed = self.walk_score_range(&ns_key, &metadata, spec)?;
        self.remove_mscores(batch, &ns_key, metadata, &doomed)?;
        Ok(doomed.len() as i64)
    }

    /// Rank window, inclusive on both ends, negatives counted from the
    /// other end.
    pub fn range_by_rank(
        &self,
        user_key: &[u8],
        start: i64,
        stop: i64,
        reversed: bool,
    ) -> Result<Vec<MemberScore>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let len = metadata.size as i64;
        let (start, stop) = match super::list_range(start, stop, len) {
            Some(window) => window,
            None => return Ok(Vec::new()),
        };
        let spec = RangeSpec {
            offset: start,
            count: stop - start + 1,
            reversed,
            ..RangeSpec::default()
        };
        self.walk_score_range(&ns_key, &metadata, &spec)
    }

    pub fn remove_range_by_rank(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        start: i64,
        stop: i64,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };
        let len = metadata.size as i64;
        let (start, stop) = match super::list_range(start, stop, len) {
            Some(window) => window,
            None => return Ok(0),
        };
        let spec = RangeSpec {
            offset: start,
            count: stop - start + 1,
            ..RangeSpec::default()
        };
        let doomed = self.walk_score_range(&ns_key, &metadata, &spec)?;
        self.remove_mscores(batch, &ns_key, metadata, &doomed)?;
        Ok(doomed.len() as i64)
    }

    /// Pops the `count` lowest (or highest) scored members.
    pub fn pop(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        count: i64,
        min: bool,
    ) -> Result<Vec<MemberScore>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let spec = RangeSpec {
            offset: 0,
            count,
            reversed: !min,
            ..RangeSpec::default()
        };
        let popped = self.walk_score_range(&ns_key, &metadata, &spec)?;
        self.remove_mscores(batch, &ns_key, metadata, &popped)?;
        Ok(popped)
    }

    fn remove_mscores(
        &self,
        batch: &mut E::WriteBatch,
        ns_key: &[u8],
        mut metadata: Metadata,
        doomed: &[MemberScore],
    ) -> Result<()> {
        if doomed.is_empty() {
            return Ok(());
        }
        let mut local = self.db.storage.engine().write_batch();
        local.put_log_data(&WriteBatchLogData::new(RedisType::ZSet).encode())?;
        for ms in doomed {
            local.delete(&self.db.make_sub_key(
                ns_key,
                CF_CODE_DATA,
                metadata.version,
                &ms.member,
            )?)?;
            local.delete(&self.db.make_sub_key(
                ns_key,
                CF_CODE_ZSET_SCORE,
                metadata.version,
                &score_member_sub_key(ms.score, &ms.member),
            )?)?;
        }
        metadata.size -= doomed.len() as u32;
        if metadata.size == 0 {
            local.delete(ns_key)?;
        } else {
            local.put(ns_key, &metadata.encode())?;
        }
        self.db.apply(batch, local)
    }

    /// Member walk over `CF_DATA` within a lex interval, ascending.
    fn walk_lex_range(
        &self,
        ns_key: &[u8],
        metadata: &Metadata,
        spec: &RangeLexSpec,
    ) -> Result<Vec<Vec<u8>>> {
        let snapshot = self.db.storage.engine().snapshot();
        let rows = self
            .db
            .scan_sub_keys(&snapshot, ns_key, CF_CODE_DATA, metadata.version)?;
        let mut out = Vec::new();
        if spec.count == 0 {
            return Ok(out);
        }
        let mut skipped = 0i64;
        for (member, _) in rows {
            if !spec.min_infinite {
                if member.as_slice() < spec.min.as_slice() {
                    continue;
                }
                if spec.minex && member == spec.min {
                    continue;
                }
            }
            if !spec.max_infinite {
                if member.as_slice() > spec.max.as_slice() {
                    break;
                }
                if spec.maxex && member == spec.max {
                    break;
                }
            }
            if spec.offset >= 0 && skipped < spec.offset {
                skipped += 1;
                continue;
            }
            out.push(member);
            if spec.count >= 0 && out.len() as i64 >= spec.count {
                break;
            }
        }
        Ok(out)
    }

    pub fn range_by_lex(&self, user_key: &[u8], spec: &RangeLexSpec) -> Result<Vec<Vec<u8>>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.walk_lex_range(&ns_key, &metadata, spec)
    }

    pub fn remove_range_by_lex(
        &self,
        batch: &mut E::WriteBatch,
        user_key: &[u8],
        spec: &RangeLexSpec,
    ) -> Result<i64> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let _guard = self.db.storage.lock_manager().lock(&ns_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(0),
            Err(e) => return Err(e),
        };
        let members = self.walk_lex_range(&ns_key, &metadata, spec)?;
        let snapshot = self.db.storage.engine().snapshot();
        let mut doomed = Vec::with_capacity(members.len());
        for member in members {
            let member_key = self
                .db
                .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, &member)?;
            if let Some(bytes) = snapshot.get_value(&member_key)? {
                doomed.push(MemberScore {
                    member,
                    score: decode_score(&bytes)?,
                });
            }
        }
        self.remove_mscores(batch, &ns_key, metadata, &doomed)?;
        Ok(doomed.len() as i64)
    }

    /// 0-based position in ascending (or descending) score order.
    pub fn rank(&self, user_key: &[u8], member: &[u8], reversed: bool) -> Result<Option<i64>> {
        let ns_key = self.db.encode_namespace_prefix(user_key);
        let metadata = match self.get_metadata(&ns_key) {
            Ok(metadata) => metadata,
            Err(ref e) if e.is_absent() => return Ok(None),
            Err(e) => return Err(e),
        };
        let target = self
            .db
            .make_sub_key(&ns_key, CF_CODE_DATA, metadata.version, member)?;
        if self.db.storage.engine().get_value(&target)?.is_none() {
            return Ok(None);
        }
        let all = self.walk_score_range(&ns_key, &metadata, &RangeSpec::default())?;
        let rank = all.iter().position(|ms| ms.member == member);
        Ok(rank.map(|r| {
            if reversed {
                metadata.size as i64 - 1 - r as i64
            } else {
                r as i64
            }
        }))
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

    fn ms(member: &str, score: f64) -> MemberScore {
        MemberScore {
            member: member.as_bytes().to_vec(),
            score,
        }
    }

    fn seed(zset: &ZSetDb<'_, MemoryEngine>) {
        let mut batch = zset.db.storage.engine().write_batch();
        zset.add(
            &mut batch,
            b"z",
            ZAddFlags::default(),
            &[ms("a", 1.0), ms("b", 2.0), ms("c", 3.0), ms("d", -1.5)],
        )
        .unwrap();
    }

    #[test]
    fn test_add_and_score() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);
        assert_eq!(zset.card(b"z").unwrap(), 4);
        assert_eq!(zset.score(b"z", b"a").unwrap(), Some(1.0));
        assert_eq!(zset.score(b"z", b"d").unwrap(), Some(-1.5));
        assert_eq!(zset.score(b"z", b"zz").unwrap(), None);

        // Re-adding with a new score keeps cardinality.
        let mut batch = storage.engine().write_batch();
        assert_eq!(
            zset.add(&mut batch, b"z", ZAddFlags::default(), &[ms("a", 9.0)])
                .unwrap(),
            0
        );
        assert_eq!(zset.score(b"z", b"a").unwrap(), Some(9.0));
        assert_eq!(zset.card(b"z").unwrap(), 4);
    }

    #[test]
    fn test_nx_xx_guards() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        // XX against a missing key writes nothing.
        assert_eq!(
            zset.add(&mut batch, b"z", ZAddFlags { nx: false, xx: true }, &[ms("a", 1.0)])
                .unwrap(),
            0
        );
        assert_eq!(zset.card(b"z").unwrap(), 0);

        zset.add(&mut batch, b"z", ZAddFlags::default(), &[ms("a", 1.0)])
            .unwrap();
        zset.add(&mut batch, b"z", ZAddFlags { nx: true, xx: false }, &[ms("a", 5.0)])
            .unwrap();
        assert_eq!(zset.score(b"z", b"a").unwrap(), Some(1.0));
        zset.add(&mut batch, b"z", ZAddFlags { nx: false, xx: true }, &[ms("a", 5.0), ms("b", 6.0)])
            .unwrap();
        assert_eq!(zset.score(b"z", b"a").unwrap(), Some(5.0));
        assert_eq!(zset.score(b"z", b"b").unwrap(), None);
    }

    #[test]
    fn test_range_by_score() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);

        let spec = parse_range_spec(b"-inf", b"+inf").unwrap();
        let all = zset.range_by_score(b"z", &spec).unwrap();
        assert_eq!(all, vec![ms("d", -1.5), ms("a", 1.0), ms("b", 2.0), ms("c", 3.0)]);

        let spec = parse_range_spec(b"(1", b"3").unwrap();
        let mid = zset.range_by_score(b"z", &spec).unwrap();
        assert_eq!(mid, vec![ms("b", 2.0), ms("c", 3.0)]);

        let mut spec = parse_range_spec(b"-inf", b"+inf").unwrap();
        spec.reversed = true;
        let rev = zset.range_by_score(b"z", &spec).unwrap();
        assert_eq!(rev, vec![ms("c", 3.0), ms("b", 2.0), ms("a", 1.0), ms("d", -1.5)]);
    }

    #[test]
    fn test_range_by_rank() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);
        assert_eq!(
            zset.range_by_rank(b"z", 0, 1, false).unwrap(),
            vec![ms("d", -1.5), ms("a", 1.0)]
        );
        assert_eq!(
            zset.range_by_rank(b"z", -2, -1, false).unwrap(),
            vec![ms("b", 2.0), ms("c", 3.0)]
        );
        assert_eq!(
            zset.range_by_rank(b"z", 0, 0, true).unwrap(),
            vec![ms("c", 3.0)]
        );
    }

    #[test]
    fn test_rank() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);
        assert_eq!(zset.rank(b"z", b"d", false).unwrap(), Some(0));
        assert_eq!(zset.rank(b"z", b"c", false).unwrap(), Some(3));
        assert_eq!(zset.rank(b"z", b"c", true).unwrap(), Some(0));
        assert_eq!(zset.rank(b"z", b"zz", false).unwrap(), None);
    }

    #[test]
    fn test_incr_by_moves_score_row() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        assert_eq!(
            zset.incr_by(&mut batch, b"z", b"m", 2.5, ZAddFlags::default())
                .unwrap(),
            Some(2.5)
        );
        assert_eq!(
            zset.incr_by(&mut batch, b"z", b"m", -4.0, ZAddFlags::default())
                .unwrap(),
            Some(-1.5)
        );
        let spec = parse_range_spec(b"-inf", b"+inf").unwrap();
        // Exactly one score row must remain.
        assert_eq!(zset.range_by_score(b"z", &spec).unwrap(), vec![ms("m", -1.5)]);
    }

    #[test]
    fn test_range_by_lex() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        let mut batch = storage.engine().write_batch();
        zset.add(
            &mut batch,
            b"z",
            ZAddFlags::default(),
            &[ms("a", 0.0), ms("b", 0.0), ms("c", 0.0)],
        )
        .unwrap();
        let spec = parse_range_lex_spec(b"-", b"+").unwrap();
        assert_eq!(
            zset.range_by_lex(b"z", &spec).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        let spec = parse_range_lex_spec(b"(a", b"[c").unwrap();
        assert_eq!(
            zset.range_by_lex(b"z", &spec).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec()]
        );
        assert!(parse_range_lex_spec(b"a", b"c").is_err());
    }

    #[test]
    fn test_pop_and_remove_ranges() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);
        let mut batch = storage.engine().write_batch();
        assert_eq!(zset.pop(&mut batch, b"z", 1, true).unwrap(), vec![ms("d", -1.5)]);
        assert_eq!(zset.pop(&mut batch, b"z", 1, false).unwrap(), vec![ms("c", 3.0)]);
        assert_eq!(zset.card(b"z").unwrap(), 2);

        let spec = parse_range_spec(b"2", b"2").unwrap();
        assert_eq!(zset.remove_range_by_score(&mut batch, b"z", &spec).unwrap(), 1);
        assert_eq!(zset.remove_range_by_rank(&mut batch, b"z", 0, -1).unwrap(), 1);
        assert_eq!(zset.card(b"z").unwrap(), 0);
    }

    #[test]
    fn test_remove_members() {
        let storage = storage();
        let zset = ZSetDb::new(&storage, 1);
        seed(&zset);
        let mut batch = storage.engine().write_batch();
        assert_eq!(zset.remove(&mut batch, b"z", &[b"a", b"zz"]).unwrap(), 1);
        assert_eq!(zset.card(b"z").unwrap(), 3);
    }
}
