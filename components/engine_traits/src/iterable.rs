// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use crate::errors::Result;

#[derive(Clone, Debug, Default)]
pub struct IterOptions {
    lower_bound: Option<Vec<u8>>,
    upper_bound: Option<Vec<u8>>,
}

impl IterOptions {
    pub fn new(lower_bound: Option<Vec<u8>>, upper_bound: Option<Vec<u8>>) -> IterOptions {
        IterOptions {
            lower_bound,
            upper_bound,
        }
    }

    pub fn with_upper_bound(upper_bound: Vec<u8>) -> IterOptions {
        IterOptions {
            lower_bound: None,
            upper_bound: Some(upper_bound),
        }
    }

    /// Inclusive lower bound.
    pub fn lower_bound(&self) -> Option<&[u8]> {
        self.lower_bound.as_deref()
    }

    /// Exclusive upper bound.
    pub fn upper_bound(&self) -> Option<&[u8]> {
        self.upper_bound.as_deref()
    }

    pub fn set_lower_bound(&mut self, bound: Vec<u8>) {
        self.lower_bound = Some(bound);
    }

    pub fn set_upper_bound(&mut self, bound: Vec<u8>) {
        self.upper_bound = Some(bound);
    }
}

/// An iterator over a consistent view of the keyspace, with rocksdb
/// positioning semantics: after any seek the iterator is either valid and
/// positioned, or invalid.
pub trait Iterator: Send {
    /// Positions at the first key `>= key` (within bounds).
    fn seek(&mut self, key: &[u8]) -> Result<bool>;
    /// Positions at the last key `<= key` (within bounds).
    fn seek_for_prev(&mut self, key: &[u8]) -> Result<bool>;
    fn seek_to_first(&mut self) -> Result<bool>;
    fn seek_to_last(&mut self) -> Result<bool>;

    fn next(&mut self) -> Result<bool>;
    fn prev(&mut self) -> Result<bool>;

    fn valid(&self) -> Result<bool>;

    /// Only valid when `valid()` is true.
    fn key(&self) -> &[u8];
    /// Only valid when `valid()` is true.
    fn value(&self) -> &[u8];
}

pub trait Iterable {
    type Iterator: Iterator;

    fn iterator_opt(&self, opts: IterOptions) -> Result<Self::Iterator>;

    fn iterator(&self) -> Result<Self::Iterator> {
        self.iterator_opt(IterOptions::default())
    }
}
