// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_i64, parse_u64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::{Error, Result};
use crate::reply::Reply;
use crate::types::{StringDb, StringPair};

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("get", 2, "read-only", || Box::<CmdGet>::default());
    table.add("strlen", 2, "read-only", || Box::<CmdStrlen>::default());
    table.add("getrange", 4, "read-only", || Box::<CmdGetRange>::default());
    table.add("setrange", 4, "write", || Box::<CmdSetRange>::default());
    table.add("set", -3, "write", || Box::<CmdSet>::default());
    table.add("setex", 4, "write", || Box::<CmdSetEx>::default());
    table.add("setnx", 3, "write", || Box::<CmdSetNx>::default());
    table.add("append", 3, "write", || Box::<CmdAppend>::default());
    table.add("getset", 3, "write", || Box::<CmdGetSet>::default());
    table.add("incr", 2, "write", || Box::<CmdIncr>::default());
    table.add("decr", 2, "write", || Box::<CmdDecr>::default());
    table.add("incrby", 3, "write", || Box::<CmdIncrBy>::default());
    table.add("decrby", 3, "write", || Box::<CmdDecrBy>::default());
    table.add("incrbyfloat", 3, "write", || Box::<CmdIncrByFloat>::default());
    table.add("mget", -2, "read-only", || Box::<CmdMGet>::default());
    table.add("mset", -3, "write", || Box::<CmdMSet>::default());
    table.add("msetnx", -3, "write", || Box::<CmdMSetNx>::default());
    table.add("cas", -4, "write", || Box::<CmdCas>::default());
    table.add("cad", 3, "write", || Box::<CmdCad>::default());
}

fn absent_as<T>(result: Result<T>, fallback: Reply, f: impl FnOnce(T) -> Reply) -> Result<Reply> {
    match result {
        Ok(v) => Ok(f(v)),
        Err(ref e) if e.is_absent() => Ok(fallback),
        Err(e) => Err(e),
    }
}

#[derive(Default)]
struct CmdGet {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdGet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        absent_as(string.get(&self.key), Reply::Nil, Reply::Bulk)
    }
}

#[derive(Default)]
struct CmdStrlen {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdStrlen {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(string.strlen(&self.key)? as i64))
    }
}

#[derive(Default)]
struct CmdGetRange {
    key: Vec<u8>,
    start: i64,
    stop: i64,
}

impl<E: KvEngine> Commander<E> for CmdGetRange {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.start = parse_i64(&args[2])?;
        self.stop = parse_i64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Bulk(string.get_range(&self.key, self.start, self.stop)?))
    }
}

#[derive(Default)]
struct CmdSetRange {
    key: Vec<u8>,
    offset: u64,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSetRange {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.offset = parse_u64(&args[2])?;
        self.value = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let len = string.set_range(ctx.batch, &self.key, self.offset, &self.value)?;
        Ok(Reply::Integer(len as i64))
    }
}

#[derive(Default)]
struct CmdSet {
    key: Vec<u8>,
    value: Vec<u8>,
    ttl_secs: u64,
    nx: bool,
    xx: bool,
}

impl<E: KvEngine> Commander<E> for CmdSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.value = args[2].clone();
        let mut i = 3;
        while i < args.len() {
            let opt = &args[i];
            if opt.eq_ignore_ascii_case(b"ex") && i + 1 < args.len() {
                let secs = parse_i64(&args[i + 1])?;
                if secs <= 0 {
                    return Err(syntax_err("invalid expire time"));
                }
                self.ttl_secs = secs as u64;
                i += 2;
            } else if opt.eq_ignore_ascii_case(b"px") && i + 1 < args.len() {
                let millis = parse_i64(&args[i + 1])?;
                if millis <= 0 {
                    return Err(syntax_err("invalid expire time"));
                }
                // Second granularity storage; round up.
                self.ttl_secs = (millis as u64 + 999) / 1000;
                i += 2;
            } else if opt.eq_ignore_ascii_case(b"nx") {
                self.nx = true;
                i += 1;
            } else if opt.eq_ignore_ascii_case(b"xx") {
                self.xx = true;
                i += 1;
            } else {
                return Err(syntax_err("syntax error"));
            }
        }
        if self.nx && self.xx {
            return Err(syntax_err("syntax error"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        if self.nx {
            if string.set_nx(ctx.batch, &self.key, &self.value, self.ttl_secs)? {
                Ok(Reply::ok())
            } else {
                Ok(Reply::Nil)
            }
        } else if self.xx {
            if string.set_xx(ctx.batch, &self.key, &self.value, self.ttl_secs)? {
                Ok(Reply::ok())
            } else {
                Ok(Reply::Nil)
            }
        } else {
            string.set_ex(ctx.batch, &self.key, &self.value, self.ttl_secs)?;
            Ok(Reply::ok())
        }
    }
}

#[derive(Default)]
struct CmdSetEx {
    key: Vec<u8>,
    ttl_secs: u64,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSetEx {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        let secs = parse_i64(&args[2])?;
        if secs <= 0 {
            return Err(syntax_err("invalid expire time"));
        }
        self.ttl_secs = secs as u64;
        self.value = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        string.set_ex(ctx.batch, &self.key, &self.value, self.ttl_secs)?;
        Ok(Reply::ok())
    }
}

#[derive(Default)]
struct CmdSetNx {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSetNx {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.value = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let written = string.set_nx(ctx.batch, &self.key, &self.value, 0)?;
        Ok(Reply::Integer(i64::from(written)))
    }
}

#[derive(Default)]
struct CmdAppend {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdAppend {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.value = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let len = string.append(ctx.batch, &self.key, &self.value)?;
        Ok(Reply::Integer(len as i64))
    }
}

#[derive(Default)]
struct CmdGetSet {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdGetSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.value = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(match string.get_set(ctx.batch, &self.key, &self.value)? {
            Some(old) => Reply::Bulk(old),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdIncr {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdIncr {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(string.incr_by(ctx.batch, &self.key, 1)?))
    }
}

#[derive(Default)]
struct CmdDecr {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdDecr {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(string.incr_by(ctx.batch, &self.key, -1)?))
    }
}

#[derive(Default)]
struct CmdIncrBy {
    key: Vec<u8>,
    increment: i64,
}

impl<E: KvEngine> Commander<E> for CmdIncrBy {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.increment = parse_i64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(string.incr_by(
            ctx.batch,
            &self.key,
            self.increment,
        )?))
    }
}

#[derive(Default)]
struct CmdDecrBy {
    key: Vec<u8>,
    decrement: i64,
}

impl<E: KvEngine> Commander<E> for CmdDecrBy {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.decrement = parse_i64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let increment = self.decrement.checked_neg().ok_or(Error::Overflow)?;
        Ok(Reply::Integer(string.incr_by(ctx.batch, &self.key, increment)?))
    }
}

#[derive(Default)]
struct CmdIncrByFloat {
    key: Vec<u8>,
    increment: f64,
}

impl<E: KvEngine> Commander<E> for CmdIncrByFloat {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.increment = super::parse_f64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let value = string.incr_by_float(ctx.batch, &self.key, self.increment)?;
        Ok(Reply::double(value))
    }
}

#[derive(Default)]
struct CmdMGet {
    keys: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdMGet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.keys = args[1..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_slice()).collect();
        let values = string.mget(&keys)?;
        Ok(Reply::Array(
            values
                .into_iter()
                .map(|v| match v {
                    Some(v) => Reply::Bulk(v),
                    None => Reply::Nil,
                })
                .collect(),
        ))
    }
}

fn parse_pairs(args: &[Vec<u8>]) -> Result<Vec<StringPair>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(syntax_err("wrong number of arguments"));
    }
    Ok(args
        .chunks(2)
        .map(|c| StringPair {
            key: c[0].clone(),
            value: c[1].clone(),
        })
        .collect())
}

#[derive(Default)]
struct CmdMSet {
    pairs: Vec<StringPair>,
}

impl<E: KvEngine> Commander<E> for CmdMSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.pairs = parse_pairs(&args[1..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        string.mset(ctx.batch, &self.pairs, 0)?;
        Ok(Reply::ok())
    }
}

#[derive(Default)]
struct CmdMSetNx {
    pairs: Vec<StringPair>,
}

impl<E: KvEngine> Commander<E> for CmdMSetNx {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.pairs = parse_pairs(&args[1..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let written = string.msetnx(ctx.batch, &self.pairs, 0)?;
        Ok(Reply::Integer(i64::from(written)))
    }
}

#[derive(Default)]
struct CmdCas {
    key: Vec<u8>,
    old_value: Vec<u8>,
    new_value: Vec<u8>,
    ttl_secs: u64,
}

impl<E: KvEngine> Commander<E> for CmdCas {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.old_value = args[2].clone();
        self.new_value = args[3].clone();
        if args.len() > 4 {
            if args.len() != 6 || !args[4].eq_ignore_ascii_case(b"ex") {
                return Err(syntax_err("syntax error"));
            }
            let secs = parse_i64(&args[5])?;
            if secs <= 0 {
                return Err(syntax_err("invalid expire time"));
            }
            self.ttl_secs = secs as u64;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        let ret = string.cas(
            ctx.batch,
            &self.key,
            &self.old_value,
            &self.new_value,
            self.ttl_secs,
        )?;
        Ok(Reply::Integer(ret))
    }
}

#[derive(Default)]
struct CmdCad {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdCad {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.value = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let string = StringDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(string.cad(ctx.batch, &self.key, &self.value)?))
    }
}
