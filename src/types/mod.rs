// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Typed operations over logical data types. Every operation follows the
//! same skeleton: compose the namespace key, lock it, read metadata,
//! compute against sub-keys, and append the mutations plus the updated
//! metadata row to a write batch.

pub mod bitmap;
pub mod hash;
pub mod hyperloglog;
pub mod list;
pub mod set;
pub mod sortedint;
pub mod string;
pub mod zset;

/// Resolves a redis-style inclusive `[start, stop]` window against `len`;
/// `None` means the window is empty.
pub(crate) fn list_range(start: i64, stop: i64, len: i64) -> Option<(i64, i64)> {
    if len == 0 {
        return None;
    }
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    start = start.max(0);
    stop = stop.min(len - 1);
    if start > stop || start >= len {
        return None;
    }
    Some((start, stop))
}

pub use self::bitmap::BitmapDb;
pub use self::hash::HashDb;
pub use self::hyperloglog::HyperloglogDb;
pub use self::list::ListDb;
pub use self::set::SetDb;
pub use self::sortedint::SortedintDb;
pub use self::string::{StringDb, StringPair};
pub use self::zset::{MemberScore, ZSetDb};
