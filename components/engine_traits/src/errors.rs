// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::{error, result};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Engine uses plain string as the error.
    #[error("Storage Engine {0}")]
    Engine(String),

    #[error("Io {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec {0}")]
    Codec(#[from] codec::Error),

    #[error("{0:?}")]
    Other(#[from] Box<dyn error::Error + Sync + Send>),
}

pub type Result<T> = result::Result<T, Error>;
