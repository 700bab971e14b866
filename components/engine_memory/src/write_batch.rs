// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::{Mutable, Result, WriteBatch};

#[derive(Clone, Debug, PartialEq)]
pub enum BatchEntry {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    LogData(Vec<u8>),
}

/// Mutations are replayed in insertion order on commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryWriteBatch {
    entries: Vec<BatchEntry>,
}

impl MemoryWriteBatch {
    pub fn new() -> MemoryWriteBatch {
        MemoryWriteBatch::default()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }
}

impl Mutable for MemoryWriteBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries
            .push(BatchEntry::Put(key.to_vec(), value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.entries.push(BatchEntry::Delete(key.to_vec()));
        Ok(())
    }
}

impl WriteBatch for MemoryWriteBatch {
    fn put_log_data(&mut self, blob: &[u8]) -> Result<()> {
        self.entries.push(BatchEntry::LogData(blob.to_vec()));
        Ok(())
    }

    fn append(&mut self, mut other: Self) -> Result<()> {
        self.entries.append(&mut other.entries);
        Ok(())
    }

    fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e, BatchEntry::LogData(_)))
            .count()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
