// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use crate::errors::Result;

pub trait Peekable {
    fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}
