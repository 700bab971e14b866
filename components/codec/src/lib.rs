// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Order-preserving (memcomparable) encodings.
//!
//! Both primitives guarantee that comparing two encoded buffers with plain
//! unsigned byte-wise comparison yields the same ordering as comparing the
//! source values, which is what lets a byte-ordered KV store implement a
//! logical order on composite keys.

pub mod bytes;
pub mod convert;
mod error;
pub mod number;

pub mod prelude {
    pub use super::{
        bytes::{BytesDecoder, BytesEncoder},
        number::{NumberDecoder, NumberEncoder},
    };
}

pub use self::error::{Error, Result};
