// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! The boundary between the Redis engine and the underlying KV store.
//!
//! The store is a black box: point reads, atomic batched writes, consistent
//! snapshots, bounded iterators and a compaction-filter registration hook.
//! Everything lives in a single keyspace; the column-family discriminator is
//! encoded inside the physical key, so there are no per-cf handles here.

mod compaction;
mod engine;
mod errors;
mod iterable;
mod mutable;
mod peekable;
mod snapshot;
mod write_batch;

pub use crate::compaction::*;
pub use crate::engine::*;
pub use crate::errors::*;
pub use crate::iterable::*;
pub use crate::mutable::*;
pub use crate::peekable::*;
pub use crate::snapshot::*;
pub use crate::write_batch::*;
