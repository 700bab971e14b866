// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use crate::errors::Result;

pub trait Mutable {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}
