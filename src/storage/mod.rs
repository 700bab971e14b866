// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

pub mod compaction_filter;
pub mod db;
pub mod keys;
pub mod lock_manager;
pub mod metadata;

use std::sync::Arc;

use engine_traits::KvEngine;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::storage::compaction_filter::ExpireFilterFactory;
use crate::storage::lock_manager::{LockManager, DEFAULT_LOCK_STRIPES};

pub use self::db::{Database, KeyNumStats, WriteBatchLogData};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Encode the cluster slot of the user key into physical keys, so all
    /// rows of one slot are contiguous. Off in the default build.
    pub slot_id_encoded: bool,
    pub lock_stripes: usize,
}

impl Default for StorageConfig {
    fn default() -> StorageConfig {
        StorageConfig {
            slot_id_encoded: false,
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }
}

/// Owns the lock manager and a (shared) handle to the KV store. One
/// `Storage` serves any number of concurrent requests; each request borrows
/// it for the duration of execution.
pub struct Storage<E: KvEngine> {
    engine: E,
    lock_mgr: LockManager,
    config: StorageConfig,
}

impl<E: KvEngine> Storage<E> {
    pub fn new(engine: E) -> Storage<E> {
        Storage::with_config(engine, StorageConfig::default())
    }

    pub fn with_config(engine: E, config: StorageConfig) -> Storage<E> {
        Storage {
            lock_mgr: LockManager::new(config.lock_stripes),
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_mgr
    }

    pub fn is_slot_id_encoded(&self) -> bool {
        self.config.slot_id_encoded
    }

    /// Applies a batch to the store. With the `sync-write` feature off this
    /// is a no-op returning OK: the host owns the commit path and applies
    /// the batch returned by the processor itself.
    pub fn write(&self, wb: &E::WriteBatch) -> Result<()> {
        if cfg!(feature = "sync-write") {
            self.engine.write(wb)?;
        }
        Ok(())
    }

    /// Registers the expiration compaction filter on the engine. Call once
    /// at open time.
    pub fn install_compaction_filter(&self) {
        self.engine
            .set_compaction_filter_factory(Arc::new(ExpireFilterFactory::new(
                self.engine.clone(),
                self.config.slot_id_encoded,
            )));
    }
}
