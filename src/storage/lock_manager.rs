// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Striped per-key exclusive locks.
//!
//! A fixed power-of-two number of mutexes; a key hashes to one stripe. The
//! guard releases on every exit path. Multi-key acquisition sorts and
//! deduplicates stripe indices so overlapping commands cannot deadlock.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use parking_lot::{Mutex, MutexGuard};

pub const DEFAULT_LOCK_STRIPES: usize = 16;

pub struct LockManager {
    mutexes: Vec<Mutex<()>>,
}

pub type LockGuard<'a> = MutexGuard<'a, ()>;

impl LockManager {
    pub fn new(stripes: usize) -> LockManager {
        assert!(stripes.is_power_of_two());
        LockManager {
            mutexes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    fn calc_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write(key);
        (hasher.finish() as usize) & (self.mutexes.len() - 1)
    }

    /// Blocks until the stripe owning `key` is exclusively held.
    pub fn lock(&self, key: &[u8]) -> LockGuard<'_> {
        self.mutexes[self.calc_index(key)].lock()
    }

    /// Locks the stripes of all `keys` in ascending index order.
    pub fn multi_lock(&self, keys: &[&[u8]]) -> Vec<LockGuard<'_>> {
        let mut indices: Vec<usize> = keys.iter().map(|k| self.calc_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| self.mutexes[i].lock()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_same_key_is_exclusive() {
        let mgr = Arc::new(LockManager::new(4));
        let counter = Arc::new(parking_lot::Mutex::new(0u64));
        let mut handles = vec![];
        for _ in 0..8 {
            let mgr = mgr.clone();
            let counter = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = mgr.lock(b"key");
                    let mut c = counter.lock();
                    *c += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), 800);
    }

    #[test]
    fn test_multi_lock_dedups_stripes() {
        let mgr = LockManager::new(2);
        // More keys than stripes: without dedup this would self-deadlock.
        let keys: Vec<&[u8]> = vec![b"a", b"b", b"c", b"d", b"e"];
        let guards = mgr.multi_lock(&keys);
        assert!(guards.len() <= 2);
    }
}
