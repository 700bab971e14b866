// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! An in-memory implementation of the `engine_traits` boundary.
//!
//! Backed by an ordered map with snapshot-by-copy semantics. It is the
//! reference engine for tests and for the C ABI instantiation; production
//! hosts plug a real LSM store into the same traits.

mod engine;
mod iterator;
mod write_batch;

pub use crate::engine::{MemoryEngine, MemorySnapshot};
pub use crate::iterator::MemoryIterator;
pub use crate::write_batch::{BatchEntry, MemoryWriteBatch};
