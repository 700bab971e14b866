// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use crate::compaction::CompactionFilterFactory;
use crate::errors::Result;
use crate::iterable::Iterable;
use crate::peekable::Peekable;
use crate::snapshot::Snapshot;
use crate::write_batch::WriteBatch;

/// A handle to an opened KV store. Handles are cheap to clone and share one
/// underlying store.
pub trait KvEngine: Peekable + Iterable + Clone + Send + Sync + 'static {
    type Snapshot: Snapshot;
    type WriteBatch: WriteBatch;

    fn snapshot(&self) -> Self::Snapshot;

    fn write_batch(&self) -> Self::WriteBatch;

    /// Applies all mutations of `wb` atomically.
    fn write(&self, wb: &Self::WriteBatch) -> Result<()>;

    /// Installs the factory consulted by background compactions. Must be
    /// called once, at open time, before any compaction runs.
    fn set_compaction_filter_factory(&self, factory: Arc<dyn CompactionFilterFactory>);

    /// Compacts the given key range (`None` means unbounded), feeding every
    /// live entry through the registered compaction filter.
    fn compact_range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<()>;
}
