// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use std::io;
use std::result;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found")]
    NotFound,

    #[error("the key was expired")]
    Expired,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("value is not an integer or out of range")]
    NotNumber,

    #[error("the metadata was too short")]
    MetaShort,

    #[error("Protocol error: too big inline request")]
    ProtoInline,

    #[error("Protocol error: invalid bulk length")]
    ProtoBulk,

    #[error("Protocol error: invalid multibulk length")]
    ProtoMulti,

    #[error("unknown command '{0}'")]
    RedisUnknownCmd(String),

    #[error("wrong number of arguments for '{0}' command")]
    RedisInvalidCmd(String),

    #[error("syntax error: {0}")]
    RedisParseErr(String),

    #[error("Engine {0}")]
    Engine(#[from] engine_traits::Error),

    #[error("Codec {0}")]
    Codec(#[from] codec::Error),

    #[error("Io {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Absence signals are normal control flow for typed operations, not
    /// failures: a missing row and an expired row read the same.
    pub fn is_absent(&self) -> bool {
        matches!(self, Error::NotFound | Error::Expired)
    }
}

pub type Result<T> = result::Result<T, Error>;
