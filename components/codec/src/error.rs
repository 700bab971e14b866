// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Io error: {0}")]
    Io(#[from] io::Error),

    #[error("bad format key(length)")]
    KeyLength,

    #[error("bad format key(padding)")]
    KeyPadding,
}

pub type Result<T> = std::result::Result<T, Error>;
