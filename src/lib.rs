// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! A Redis-protocol data engine layered on an embedded key-value store.
//!
//! Requests are RESP-encoded pipelines scoped to a numeric table id. Each
//! command is decoded into a typed operation over logical data types and
//! translated into point reads against the underlying store plus deferred
//! mutations accumulated into an atomic write batch handed back to the
//! host. Expired metadata and orphaned sub-keys are reaped later by a
//! compaction filter registered on the store.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate slog_global;

pub mod commands;
mod errors;
pub mod ffi;
mod metrics;
pub mod processor;
pub mod reply;
pub mod request;
pub mod storage;
pub mod types;

pub use crate::errors::{Error, Result};
pub use crate::processor::Processor;
pub use crate::storage::{Storage, StorageConfig};
