// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::{Iterator, Result};

/// A materialized, bounded view of the keyspace with rocksdb positioning
/// semantics. Entries are fixed at creation time.
pub struct MemoryIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    cursor: Option<usize>,
}

impl MemoryIterator {
    pub(crate) fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> MemoryIterator {
        MemoryIterator {
            entries,
            cursor: None,
        }
    }

    fn set(&mut self, pos: Option<usize>) -> bool {
        self.cursor = pos;
        self.cursor.is_some()
    }
}

impl Iterator for MemoryIterator {
    fn seek(&mut self, key: &[u8]) -> Result<bool> {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        Ok(self.set(if idx < self.entries.len() { Some(idx) } else { None }))
    }

    fn seek_for_prev(&mut self, key: &[u8]) -> Result<bool> {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() <= key);
        Ok(self.set(idx.checked_sub(1)))
    }

    fn seek_to_first(&mut self) -> Result<bool> {
        let pos = if self.entries.is_empty() { None } else { Some(0) };
        Ok(self.set(pos))
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        Ok(self.set(self.entries.len().checked_sub(1)))
    }

    fn next(&mut self) -> Result<bool> {
        let pos = match self.cursor {
            Some(i) if i + 1 < self.entries.len() => Some(i + 1),
            _ => None,
        };
        Ok(self.set(pos))
    }

    fn prev(&mut self) -> Result<bool> {
        let pos = match self.cursor {
            Some(i) => i.checked_sub(1),
            None => None,
        };
        Ok(self.set(pos))
    }

    fn valid(&self) -> Result<bool> {
        Ok(self.cursor.is_some())
    }

    fn key(&self) -> &[u8] {
        let i = self.cursor.expect("invalid iterator");
        &self.entries[i].0
    }

    fn value(&self) -> &[u8] {
        let i = self.cursor.expect("invalid iterator");
        &self.entries[i].1
    }
}
