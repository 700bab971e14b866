// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use crate::errors::Result;
use crate::mutable::Mutable;

pub trait WriteBatch: Mutable + Send {
    /// Appends a blob that is carried in the batch but is not a key
    /// mutation. Used to tag batches for logical replication decoders.
    fn put_log_data(&mut self, blob: &[u8]) -> Result<()>;

    /// Moves all entries of `other` to the end of this batch, preserving
    /// their order.
    fn append(&mut self, other: Self) -> Result<()>;

    fn count(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
}
