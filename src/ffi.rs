// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! C ABI for host embedding.
//!
//! The host opens the KV store, hands an opaque handle in, and gets back a
//! processor handle. Each request returns a malloced RESP buffer, a
//! nullable error string, and a write-batch handle the host may commit.
//! Every returned buffer is owned by this side's allocator; the matching
//! free function must be used.
//!
//! This build instantiates the generic processor over `MemoryEngine`;
//! hosts embedding a different store instantiate `Processor` over their
//! own `engine_traits` implementation instead.

use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;
use std::sync::Arc;

use engine_memory::{MemoryEngine, MemoryWriteBatch};
use engine_traits::KvEngine;

use crate::processor::Processor;
use crate::storage::compaction_filter::{metadata_value_expire_ts, metadata_value_expired};
use crate::storage::keys;
use crate::storage::Storage;

pub struct RedisProcessor {
    inner: Processor<MemoryEngine>,
}

#[repr(C)]
pub struct RedisProcessorHandleResult {
    pub err_msg: *mut c_char,
    pub err_len: usize,
    pub resp: *mut c_char,
    pub resp_len: usize,
    pub batch: *mut MemoryWriteBatch,
}

impl RedisProcessorHandleResult {
    fn empty() -> RedisProcessorHandleResult {
        RedisProcessorHandleResult {
            err_msg: ptr::null_mut(),
            err_len: 0,
            resp: ptr::null_mut(),
            resp_len: 0,
            batch: ptr::null_mut(),
        }
    }
}

fn vec_into_raw(data: Vec<u8>) -> (*mut c_char, usize) {
    let len = data.len();
    let boxed = data.into_boxed_slice();
    (Box::into_raw(boxed) as *mut c_char, len)
}

unsafe fn free_raw(data: *mut c_char, len: usize) {
    if !data.is_null() {
        let slice = ptr::slice_from_raw_parts_mut(data as *mut u8, len);
        drop(Box::from_raw(slice));
    }
}

/// Wraps an already-opened store handle into a processor. The handle stays
/// owned by the host; the processor only clones the shared engine handle.
///
/// # Safety
/// `db` must point to a live `MemoryEngine` for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn new_redis_processor(db: *mut MemoryEngine) -> *mut RedisProcessor {
    if db.is_null() {
        return ptr::null_mut();
    }
    let engine = (*db).clone();
    let storage = Arc::new(Storage::new(engine));
    storage.install_compaction_filter();
    Box::into_raw(Box::new(RedisProcessor {
        inner: Processor::new(storage),
    }))
}

/// # Safety
/// `p` must be a pointer returned by `new_redis_processor`, freed at most
/// once.
#[no_mangle]
pub unsafe extern "C" fn free_redis_processor(p: *mut RedisProcessor) {
    if !p.is_null() {
        drop(Box::from_raw(p));
    }
}

/// Runs one RESP request buffer. On success `resp`/`batch` are set; on
/// failure `err_msg` is set instead.
///
/// # Safety
/// `p` must be a live processor handle and `req` must point to `req_len`
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn redis_processor_handle(
    p: *const RedisProcessor,
    table_id: i64,
    req: *const c_char,
    req_len: usize,
) -> RedisProcessorHandleResult {
    let mut result = RedisProcessorHandleResult::empty();
    if p.is_null() || (req.is_null() && req_len != 0) {
        let (msg, len) = vec_into_raw(b"null argument".to_vec());
        result.err_msg = msg;
        result.err_len = len;
        return result;
    }
    let request = slice::from_raw_parts(req as *const u8, req_len);
    match (*p).inner.handle(table_id, request) {
        Ok((resp, batch)) => {
            let (resp_ptr, resp_len) = vec_into_raw(resp);
            result.resp = resp_ptr;
            result.resp_len = resp_len;
            result.batch = Box::into_raw(Box::new(batch));
        }
        Err(e) => {
            let (msg, len) = vec_into_raw(e.to_string().into_bytes());
            result.err_msg = msg;
            result.err_len = len;
        }
    }
    result
}

/// Frees every buffer of a handle result, including an uncommitted batch.
///
/// # Safety
/// `result` must come from `redis_processor_handle` and not have been
/// freed before.
#[no_mangle]
pub unsafe extern "C" fn free_redis_processor_handle_result(
    result: *mut RedisProcessorHandleResult,
) {
    if result.is_null() {
        return;
    }
    let result = &mut *result;
    free_raw(result.err_msg, result.err_len);
    free_raw(result.resp, result.resp_len);
    if !result.batch.is_null() {
        drop(Box::from_raw(result.batch));
    }
    *result = RedisProcessorHandleResult::empty();
}

/// Applies a returned batch to the store. Returns 0 on success.
///
/// # Safety
/// `db` and `batch` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn redis_write_batch_commit(
    db: *mut MemoryEngine,
    batch: *const MemoryWriteBatch,
) -> c_int {
    if db.is_null() || batch.is_null() {
        return -1;
    }
    match (*db).write(&*batch) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Byte length of the `(prefix, table_id, user_key)` portion of a physical
/// key, for configuring a store-side prefix extractor. Returns 0 when the
/// key does not parse.
///
/// # Safety
/// `key` must point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn get_redis_key_prefix_length(key: *const c_char, len: usize) -> usize {
    if key.is_null() {
        return 0;
    }
    let key = slice::from_raw_parts(key as *const u8, len);
    keys::namespace_prefix_len(key, false).unwrap_or(0)
}

/// Whether a metadata row's value is expired. Non-metadata rows report 0.
///
/// # Safety
/// The pointers must cover the given lengths.
#[no_mangle]
pub unsafe extern "C" fn redis_key_is_expired(
    _p: *const RedisProcessor,
    key: *const c_char,
    key_len: usize,
    value: *const c_char,
    value_len: usize,
) -> c_int {
    if key.is_null() || value.is_null() {
        return 0;
    }
    let key = slice::from_raw_parts(key as *const u8, key_len);
    let value = slice::from_raw_parts(value as *const u8, value_len);
    match keys::extract_namespace_key(key, false) {
        Ok((_, _, cf_code)) if cf_code == keys::CF_CODE_METADATA => {
            c_int::from(metadata_value_expired(value))
        }
        _ => 0,
    }
}

/// Absolute expiration timestamp of a metadata row's value; 0 without TTL.
///
/// # Safety
/// The pointers must cover the given lengths.
#[no_mangle]
pub unsafe extern "C" fn redis_get_expire_ts(
    _p: *const RedisProcessor,
    key: *const c_char,
    key_len: usize,
    value: *const c_char,
    value_len: usize,
) -> u32 {
    if key.is_null() || value.is_null() {
        return 0;
    }
    let key = slice::from_raw_parts(key as *const u8, key_len);
    let value = slice::from_raw_parts(value as *const u8, value_len);
    match keys::extract_namespace_key(key, false) {
        Ok((_, _, cf_code)) if cf_code == keys::CF_CODE_METADATA => {
            metadata_value_expire_ts(value)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        let mut engine = MemoryEngine::new();
        unsafe {
            let p = new_redis_processor(&mut engine);
            assert!(!p.is_null());

            let req = b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$1\r\n1\r\n";
            let mut result =
                redis_processor_handle(p, 1, req.as_ptr() as *const c_char, req.len());
            assert!(result.err_msg.is_null());
            let resp = slice::from_raw_parts(result.resp as *const u8, result.resp_len);
            assert_eq!(resp, b"+OK\r\n");
            assert!(!result.batch.is_null());
            assert_eq!(redis_write_batch_commit(&mut engine, result.batch), 0);
            free_redis_processor_handle_result(&mut result);

            let req = b"*2\r\n$3\r\nget\r\n$1\r\na\r\n";
            let mut result =
                redis_processor_handle(p, 1, req.as_ptr() as *const c_char, req.len());
            let resp = slice::from_raw_parts(result.resp as *const u8, result.resp_len);
            assert_eq!(resp, b"$1\r\n1\r\n");
            free_redis_processor_handle_result(&mut result);

            free_redis_processor(p);
        }
    }

    #[test]
    fn test_protocol_error_surfaces() {
        let mut engine = MemoryEngine::new();
        unsafe {
            let p = new_redis_processor(&mut engine);
            let req = b"*zz\r\n";
            let mut result =
                redis_processor_handle(p, 1, req.as_ptr() as *const c_char, req.len());
            assert!(!result.err_msg.is_null());
            assert!(result.resp.is_null());
            free_redis_processor_handle_result(&mut result);
            free_redis_processor(p);
        }
    }

    #[test]
    fn test_prefix_length() {
        let ns_key = keys::compose_namespace_key(1, b"user-key", false, keys::CF_CODE_METADATA);
        let len = unsafe {
            get_redis_key_prefix_length(ns_key.as_ptr() as *const c_char, ns_key.len())
        };
        assert_eq!(len, ns_key.len() - 8);
    }
}
