// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! End-to-end RESP scenarios: literal request bytes in, literal reply
//! bytes out, against the in-memory engine.

use std::sync::Arc;

use engine_memory::MemoryEngine;
use rockdis::{Processor, Storage};

fn new_processor() -> Processor<MemoryEngine> {
    Processor::new(Arc::new(Storage::new(MemoryEngine::new())))
}

fn run(p: &Processor<MemoryEngine>, req: &[u8]) -> Vec<u8> {
    let (resp, _batch) = p.handle(1, req).unwrap();
    resp
}

#[test]
fn test_pipelined_set_and_get() {
    let p = new_processor();
    let resp = run(
        &p,
        b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$1\r\n1\r\n*3\r\n$3\r\nset\r\n$1\r\nb\r\n$1\r\n2\r\n*2\r\n$3\r\nget\r\n$1\r\nb\r\n",
    );
    assert_eq!(resp, b"+OK\r\n+OK\r\n$1\r\n2\r\n");
}

#[test]
fn test_del_removes_one_key() {
    let p = new_processor();
    run(
        &p,
        b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$1\r\n1\r\n*3\r\n$3\r\nset\r\n$1\r\nb\r\n$1\r\n2\r\n",
    );
    let resp = run(&p, b"*2\r\n$3\r\ndel\r\n$1\r\nb\r\n");
    assert_eq!(resp, b":1\r\n");
    let resp = run(&p, b"*2\r\n$3\r\nget\r\n$1\r\nb\r\n");
    assert_eq!(resp, b"$-1\r\n");
    let resp = run(&p, b"*2\r\n$3\r\nget\r\n$1\r\na\r\n");
    assert_eq!(resp, b"$1\r\n1\r\n");
}

#[test]
fn test_sadd_smembers_ordering() {
    let p = new_processor();
    let resp = run(
        &p,
        b"*6\r\n$4\r\nsadd\r\n$1\r\ns\r\n$9\r\nset-key-1\r\n$9\r\nset-key-2\r\n$9\r\nset-key-3\r\n$9\r\nset-key-4\r\n",
    );
    assert_eq!(resp, b":4\r\n");
    let resp = run(&p, b"*2\r\n$8\r\nsmembers\r\n$1\r\ns\r\n");
    assert_eq!(
        resp,
        b"*4\r\n$9\r\nset-key-1\r\n$9\r\nset-key-2\r\n$9\r\nset-key-3\r\n$9\r\nset-key-4\r\n"
    );
}

#[test]
fn test_incrby_overflow_leaves_key_unchanged() {
    let p = new_processor();
    run(
        &p,
        b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$19\r\n9223372036854775806\r\n",
    );
    let resp = run(&p, b"*3\r\n$6\r\nincrby\r\n$1\r\nk\r\n$1\r\n1\r\n");
    assert_eq!(resp, b":9223372036854775807\r\n");

    let resp = run(&p, b"*3\r\n$6\r\nincrby\r\n$1\r\nk\r\n$1\r\n1\r\n");
    let text = String::from_utf8_lossy(&resp).to_string();
    assert!(text.starts_with("-ERR"), "unexpected reply: {}", text);
    assert!(text.contains("overflow"), "unexpected reply: {}", text);

    let resp = run(&p, b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n");
    assert_eq!(resp, b"$19\r\n9223372036854775807\r\n");
}

#[test]
fn test_wrongtype_reply() {
    let p = new_processor();
    run(&p, b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nx\r\n");
    let resp = run(&p, b"*3\r\n$5\r\nlpush\r\n$1\r\nk\r\n$1\r\ny\r\n");
    assert_eq!(
        resp,
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n"
    );
}

#[test]
fn test_inline_commands() {
    let p = new_processor();
    let resp = run(&p, b"set hello world\r\nget hello\r\n");
    assert_eq!(resp, b"+OK\r\n$5\r\nworld\r\n");
}

#[test]
fn test_hash_round_trip() {
    let p = new_processor();
    let resp = run(
        &p,
        b"*6\r\n$4\r\nhset\r\n$1\r\nh\r\n$2\r\nf1\r\n$2\r\nv1\r\n$2\r\nf2\r\n$2\r\nv2\r\n",
    );
    assert_eq!(resp, b":2\r\n");
    let resp = run(&p, b"*3\r\n$4\r\nhget\r\n$1\r\nh\r\n$2\r\nf2\r\n");
    assert_eq!(resp, b"$2\r\nv2\r\n");
    let resp = run(&p, b"*2\r\n$7\r\nhgetall\r\n$1\r\nh\r\n");
    assert_eq!(resp, b"*4\r\n$2\r\nf1\r\n$2\r\nv1\r\n$2\r\nf2\r\n$2\r\nv2\r\n");
    let resp = run(&p, b"*2\r\n$4\r\ntype\r\n$1\r\nh\r\n");
    assert_eq!(resp, b"+hash\r\n");
}

#[test]
fn test_list_commands() {
    let p = new_processor();
    let resp = run(
        &p,
        b"*4\r\n$5\r\nrpush\r\n$1\r\nl\r\n$1\r\na\r\n$1\r\nb\r\n",
    );
    assert_eq!(resp, b":2\r\n");
    let resp = run(&p, b"*4\r\n$5\r\nlpush\r\n$1\r\nl\r\n$1\r\nz\r\n$1\r\ny\r\n");
    assert_eq!(resp, b":4\r\n");
    let resp = run(&p, b"*4\r\n$6\r\nlrange\r\n$1\r\nl\r\n$1\r\n0\r\n$2\r\n-1\r\n");
    assert_eq!(
        resp,
        b"*4\r\n$1\r\ny\r\n$1\r\nz\r\n$1\r\na\r\n$1\r\nb\r\n"
    );
    let resp = run(&p, b"*2\r\n$4\r\nlpop\r\n$1\r\nl\r\n");
    assert_eq!(resp, b"$1\r\ny\r\n");
    let resp = run(&p, b"*2\r\n$4\r\nrpop\r\n$1\r\nl\r\n");
    assert_eq!(resp, b"$1\r\nb\r\n");
    let resp = run(&p, b"*2\r\n$4\r\nllen\r\n$1\r\nl\r\n");
    assert_eq!(resp, b":2\r\n");
}

#[test]
fn test_zset_commands() {
    let p = new_processor();
    let resp = run(
        &p,
        b"*6\r\n$4\r\nzadd\r\n$1\r\nz\r\n$1\r\n2\r\n$1\r\nb\r\n$1\r\n1\r\n$1\r\na\r\n",
    );
    assert_eq!(resp, b":2\r\n");
    let resp = run(
        &p,
        b"*5\r\n$6\r\nzrange\r\n$1\r\nz\r\n$1\r\n0\r\n$2\r\n-1\r\n$10\r\nwithscores\r\n",
    );
    assert_eq!(resp, b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n");
    let resp = run(
        &p,
        b"*4\r\n$13\r\nzrangebyscore\r\n$1\r\nz\r\n$2\r\n(1\r\n$4\r\n+inf\r\n",
    );
    assert_eq!(resp, b"*1\r\n$1\r\nb\r\n");
    let resp = run(&p, b"*3\r\n$6\r\nzscore\r\n$1\r\nz\r\n$1\r\nb\r\n");
    assert_eq!(resp, b"$1\r\n2\r\n");
}

#[test]
fn test_expire_and_ttl() {
    let p = new_processor();
    run(&p, b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nv\r\n");
    let resp = run(&p, b"*2\r\n$3\r\nttl\r\n$1\r\nk\r\n");
    assert_eq!(resp, b":-1\r\n");
    let resp = run(&p, b"*3\r\n$6\r\nexpire\r\n$1\r\nk\r\n$3\r\n100\r\n");
    assert_eq!(resp, b":1\r\n");
    let (resp, _) = p.handle(1, b"*2\r\n$3\r\nttl\r\n$1\r\nk\r\n").unwrap();
    let text = String::from_utf8_lossy(&resp).to_string();
    let secs: i64 = text.trim_start_matches(':').trim_end().parse().unwrap();
    assert!(secs > 90 && secs <= 100);

    let resp = run(&p, b"*2\r\n$7\r\npersist\r\n$1\r\nk\r\n");
    assert_eq!(resp, b":1\r\n");
    let resp = run(&p, b"*2\r\n$3\r\nttl\r\n$1\r\nk\r\n");
    assert_eq!(resp, b":-1\r\n");

    // Missing keys report -2.
    let resp = run(&p, b"*2\r\n$3\r\nttl\r\n$4\r\nnope\r\n");
    assert_eq!(resp, b":-2\r\n");
}

#[test]
fn test_setnx_and_set_options() {
    let p = new_processor();
    let resp = run(&p, b"*5\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\na\r\n$2\r\nEX\r\n$2\r\n50\r\n");
    assert_eq!(resp, b"+OK\r\n");
    let resp = run(&p, b"*4\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nb\r\n$2\r\nNX\r\n");
    assert_eq!(resp, b"$-1\r\n");
    let resp = run(&p, b"*4\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nb\r\n$2\r\nXX\r\n");
    assert_eq!(resp, b"+OK\r\n");
    let resp = run(&p, b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n");
    assert_eq!(resp, b"$1\r\nb\r\n");
}

#[test]
fn test_bitmap_and_hll() {
    let p = new_processor();
    let resp = run(&p, b"*4\r\n$6\r\nsetbit\r\n$1\r\nb\r\n$2\r\n13\r\n$1\r\n1\r\n");
    assert_eq!(resp, b":0\r\n");
    let resp = run(&p, b"*3\r\n$6\r\ngetbit\r\n$1\r\nb\r\n$2\r\n13\r\n");
    assert_eq!(resp, b":1\r\n");
    let resp = run(&p, b"*2\r\n$8\r\nbitcount\r\n$1\r\nb\r\n");
    assert_eq!(resp, b":1\r\n");

    let resp = run(&p, b"*4\r\n$5\r\npfadd\r\n$1\r\nh\r\n$1\r\nx\r\n$1\r\ny\r\n");
    assert_eq!(resp, b":1\r\n");
    let resp = run(&p, b"*2\r\n$7\r\npfcount\r\n$1\r\nh\r\n");
    assert_eq!(resp, b":2\r\n");
}

#[test]
fn test_tables_are_isolated() {
    let p = new_processor();
    p.handle(1, b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nv\r\n").unwrap();
    let (resp, _) = p.handle(2, b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n").unwrap();
    assert_eq!(resp, b"$-1\r\n");
    let (resp, _) = p.handle(1, b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n").unwrap();
    assert_eq!(resp, b"$1\r\nv\r\n");
}

#[test]
fn test_batch_is_returned_to_host() {
    // Without relying on the engine-side commit, the batch must carry the
    // request's mutations for the host to apply.
    let p = new_processor();
    let (_, batch) = p
        .handle(1, b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$1\r\n1\r\n")
        .unwrap();
    use engine_traits::WriteBatch;
    assert!(!batch.is_empty());
    assert!(batch.count() >= 1);
}
