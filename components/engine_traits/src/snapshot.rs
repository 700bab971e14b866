// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;

use crate::iterable::Iterable;
use crate::peekable::Peekable;

/// A consistent read view over the keyspace, released on drop.
pub trait Snapshot: 'static + Peekable + Iterable + Send + Debug {}
