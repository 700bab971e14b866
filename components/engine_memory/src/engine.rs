// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use engine_traits::{
    CompactionFilterContext, CompactionFilterFactory, IterOptions, Iterable, KvEngine, Peekable,
    Result, Snapshot,
};
use parking_lot::RwLock;

use crate::iterator::MemoryIterator;
use crate::write_batch::{BatchEntry, MemoryWriteBatch};

struct EngineCore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    filter_factory: RwLock<Option<Arc<dyn CompactionFilterFactory>>>,
}

/// An ordered in-memory keyspace. Clones share the same store.
#[derive(Clone)]
pub struct MemoryEngine {
    core: Arc<EngineCore>,
}

impl MemoryEngine {
    pub fn new() -> MemoryEngine {
        MemoryEngine {
            core: Arc::new(EngineCore {
                data: RwLock::new(BTreeMap::new()),
                filter_factory: RwLock::new(None),
            }),
        }
    }

    /// All live keys, in order. Test observability helper.
    pub fn all_keys(&self) -> Vec<Vec<u8>> {
        self.core.data.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.core.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.data.read().is_empty()
    }

    fn range_entries(
        data: &BTreeMap<Vec<u8>, Vec<u8>>,
        opts: &IterOptions,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let lower = match opts.lower_bound() {
            Some(b) => Bound::Included(b.to_vec()),
            None => Bound::Unbounded,
        };
        let upper = match opts.upper_bound() {
            Some(b) => Bound::Excluded(b.to_vec()),
            None => Bound::Unbounded,
        };
        data.range((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        MemoryEngine::new()
    }
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("len", &self.len())
            .finish()
    }
}

impl Peekable for MemoryEngine {
    fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.core.data.read().get(key).cloned())
    }
}

impl Iterable for MemoryEngine {
    type Iterator = MemoryIterator;

    fn iterator_opt(&self, opts: IterOptions) -> Result<Self::Iterator> {
        let data = self.core.data.read();
        Ok(MemoryIterator::new(Self::range_entries(&data, &opts)))
    }
}

impl KvEngine for MemoryEngine {
    type Snapshot = MemorySnapshot;
    type WriteBatch = MemoryWriteBatch;

    fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            data: Arc::new(self.core.data.read().clone()),
        }
    }

    fn write_batch(&self) -> MemoryWriteBatch {
        MemoryWriteBatch::new()
    }

    fn write(&self, wb: &MemoryWriteBatch) -> Result<()> {
        let mut data = self.core.data.write();
        for entry in wb.entries() {
            match entry {
                BatchEntry::Put(k, v) => {
                    data.insert(k.clone(), v.clone());
                }
                BatchEntry::Delete(k) => {
                    data.remove(k);
                }
                BatchEntry::LogData(_) => {}
            }
        }
        Ok(())
    }

    fn set_compaction_filter_factory(&self, factory: Arc<dyn CompactionFilterFactory>) {
        *self.core.filter_factory.write() = Some(factory);
    }

    fn compact_range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let factory = self.core.filter_factory.read().clone();
        let factory = match factory {
            Some(f) => f,
            None => return Ok(()),
        };
        let context = CompactionFilterContext {
            bottommost_level: true,
        };
        let mut filter = match factory.create_compaction_filter(&context) {
            Some(f) => f,
            None => return Ok(()),
        };

        // Collect the visit list first so filter callbacks observe a stable
        // view of the store while it does its own point reads.
        let entries: Vec<(Vec<u8>, Vec<u8>)> = {
            let data = self.core.data.read();
            let lower = match start {
                Some(b) => Bound::Included(b.to_vec()),
                None => Bound::Unbounded,
            };
            let upper = match end {
                Some(b) => Bound::Excluded(b.to_vec()),
                None => Bound::Unbounded,
            };
            data.range((lower, upper))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        let mut dropped = Vec::new();
        for (key, value) in &entries {
            if filter.filter(0, key, value) {
                dropped.push(key.clone());
            }
        }

        let mut data = self.core.data.write();
        for key in dropped {
            data.remove(&key);
        }
        Ok(())
    }
}

/// A full copy of the keyspace taken under the read lock.
#[derive(Clone, Debug)]
pub struct MemorySnapshot {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Peekable for MemorySnapshot {
    fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }
}

impl Iterable for MemorySnapshot {
    type Iterator = MemoryIterator;

    fn iterator_opt(&self, opts: IterOptions) -> Result<Self::Iterator> {
        Ok(MemoryIterator::new(MemoryEngine::range_entries(
            &self.data, &opts,
        )))
    }
}

impl Snapshot for MemorySnapshot {}

#[cfg(test)]
mod tests {
    use engine_traits::{CompactionFilter, Iterator, Mutable, WriteBatch};

    use super::*;

    #[test]
    fn test_write_and_get() {
        let engine = MemoryEngine::new();
        let mut wb = engine.write_batch();
        wb.put(b"a", b"1").unwrap();
        wb.put(b"b", b"2").unwrap();
        wb.delete(b"a").unwrap();
        wb.put_log_data(b"tag").unwrap();
        assert_eq!(wb.count(), 3);
        engine.write(&wb).unwrap();

        assert_eq!(engine.get_value(b"a").unwrap(), None);
        assert_eq!(engine.get_value(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_snapshot_isolation() {
        let engine = MemoryEngine::new();
        let mut wb = engine.write_batch();
        wb.put(b"k", b"v1").unwrap();
        engine.write(&wb).unwrap();

        let snap = engine.snapshot();
        let mut wb = engine.write_batch();
        wb.put(b"k", b"v2").unwrap();
        engine.write(&wb).unwrap();

        assert_eq!(snap.get_value(b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(engine.get_value(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_bounded_iterator() {
        let engine = MemoryEngine::new();
        let mut wb = engine.write_batch();
        for k in [b"a", b"b", b"c", b"d"] {
            wb.put(k, b"v").unwrap();
        }
        engine.write(&wb).unwrap();

        let mut iter = engine
            .iterator_opt(IterOptions::new(
                Some(b"b".to_vec()),
                Some(b"d".to_vec()),
            ))
            .unwrap();
        assert!(iter.seek_to_first().unwrap());
        assert_eq!(iter.key(), b"b");
        assert!(iter.next().unwrap());
        assert_eq!(iter.key(), b"c");
        assert!(!iter.next().unwrap());

        assert!(iter.seek_for_prev(b"cc").unwrap());
        assert_eq!(iter.key(), b"c");
    }

    struct DropAll;

    impl CompactionFilter for DropAll {
        fn filter(&mut self, _: usize, _: &[u8], _: &[u8]) -> bool {
            true
        }
    }

    struct DropAllFactory;

    impl CompactionFilterFactory for DropAllFactory {
        fn create_compaction_filter(
            &self,
            _: &CompactionFilterContext,
        ) -> Option<Box<dyn CompactionFilter>> {
            Some(Box::new(DropAll))
        }
    }

    #[test]
    fn test_compaction_filter_drops() {
        let engine = MemoryEngine::new();
        let mut wb = engine.write_batch();
        wb.put(b"a", b"1").unwrap();
        wb.put(b"b", b"2").unwrap();
        engine.write(&wb).unwrap();

        // Without a factory, compaction keeps everything.
        engine.compact_range(None, None).unwrap();
        assert_eq!(engine.len(), 2);

        engine.set_compaction_filter_factory(Arc::new(DropAllFactory));
        engine.compact_range(None, Some(b"b")).unwrap();
        assert_eq!(engine.all_keys(), vec![b"b".to_vec()]);
        engine.compact_range(None, None).unwrap();
        assert!(engine.is_empty());
    }
}
