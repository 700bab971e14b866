// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_i64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::{Error, Result};
use crate::reply::Reply;
use crate::types::ListDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("llen", 2, "read-only", || Box::<CmdLLen>::default());
    table.add("lpush", -3, "write", || Box::new(CmdPush::new(true, true)));
    table.add("rpush", -3, "write", || Box::new(CmdPush::new(false, true)));
    table.add("lpushx", -3, "write", || Box::new(CmdPush::new(true, false)));
    table.add("rpushx", -3, "write", || Box::new(CmdPush::new(false, false)));
    table.add("lpop", 2, "write", || Box::new(CmdPop::new(true)));
    table.add("rpop", 2, "write", || Box::new(CmdPop::new(false)));
    table.add("lindex", 3, "read-only", || Box::<CmdLIndex>::default());
    table.add("lrange", 4, "read-only", || Box::<CmdLRange>::default());
    table.add("lset", 4, "write", || Box::<CmdLSet>::default());
    table.add("linsert", 5, "write", || Box::<CmdLInsert>::default());
    table.add("lrem", 4, "write", || Box::<CmdLRem>::default());
    table.add("ltrim", 4, "write", || Box::<CmdLTrim>::default());
    table.add("rpoplpush", 3, "write", || Box::<CmdRPopLPush>::default());
    table.add("lmove", 5, "write", || Box::<CmdLMove>::default());
}

#[derive(Default)]
struct CmdLLen {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdLLen {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(list.size(&self.key)?)))
    }
}

struct CmdPush {
    left: bool,
    create_if_missing: bool,
    key: Vec<u8>,
    elems: Vec<Vec<u8>>,
}

impl CmdPush {
    fn new(left: bool, create_if_missing: bool) -> CmdPush {
        CmdPush {
            left,
            create_if_missing,
            key: Vec::new(),
            elems: Vec::new(),
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdPush {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.elems = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        let elems: Vec<&[u8]> = self.elems.iter().map(|e| e.as_slice()).collect();
        let len = if self.create_if_missing {
            list.push(ctx.batch, &self.key, &elems, self.left)?
        } else {
            list.push_x(ctx.batch, &self.key, &elems, self.left)?
        };
        Ok(Reply::Integer(i64::from(len)))
    }
}

struct CmdPop {
    left: bool,
    key: Vec<u8>,
}

impl CmdPop {
    fn new(left: bool) -> CmdPop {
        CmdPop {
            left,
            key: Vec::new(),
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdPop {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        Ok(match list.pop(ctx.batch, &self.key, self.left)? {
            Some(elem) => Reply::Bulk(elem),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdLIndex {
    key: Vec<u8>,
    index: i64,
}

impl<E: KvEngine> Commander<E> for CmdLIndex {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.index = parse_i64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        match list.index(&self.key, self.index) {
            Ok(elem) => Ok(Reply::Bulk(elem)),
            Err(ref e) if e.is_absent() => Ok(Reply::Nil),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct CmdLRange {
    key: Vec<u8>,
    start: i64,
    stop: i64,
}

impl<E: KvEngine> Commander<E> for CmdLRange {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.start = parse_i64(&args[2])?;
        self.stop = parse_i64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        let elems = list.range(&self.key, self.start, self.stop)?;
        Ok(Reply::Array(elems.into_iter().map(Reply::Bulk).collect()))
    }
}

#[derive(Default)]
struct CmdLSet {
    key: Vec<u8>,
    index: i64,
    elem: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdLSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.index = parse_i64(&args[2])?;
        self.elem = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        match list.set(ctx.batch, &self.key, self.index, &self.elem) {
            Ok(()) => Ok(Reply::ok()),
            Err(ref e) if e.is_absent() => Err(Error::Other("no such key".to_owned())),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct CmdLInsert {
    key: Vec<u8>,
    before: bool,
    pivot: Vec<u8>,
    elem: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdLInsert {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.before = if args[2].eq_ignore_ascii_case(b"before") {
            true
        } else if args[2].eq_ignore_ascii_case(b"after") {
            false
        } else {
            return Err(syntax_err("syntax error"));
        };
        self.pivot = args[3].clone();
        self.elem = args[4].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        let len = list.insert(ctx.batch, &self.key, &self.pivot, &self.elem, self.before)?;
        Ok(Reply::Integer(len))
    }
}

#[derive(Default)]
struct CmdLRem {
    key: Vec<u8>,
    count: i64,
    elem: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdLRem {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.count = parse_i64(&args[2])?;
        self.elem = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(list.rem(
            ctx.batch,
            &self.key,
            self.count,
            &self.elem,
        )?))
    }
}

#[derive(Default)]
struct CmdLTrim {
    key: Vec<u8>,
    start: i64,
    stop: i64,
}

impl<E: KvEngine> Commander<E> for CmdLTrim {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.start = parse_i64(&args[2])?;
        self.stop = parse_i64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        list.trim(ctx.batch, &self.key, self.start, self.stop)?;
        Ok(Reply::ok())
    }
}

#[derive(Default)]
struct CmdRPopLPush {
    src: Vec<u8>,
    dst: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdRPopLPush {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.src = args[1].clone();
        self.dst = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        Ok(match list.rpoplpush(ctx.batch, &self.src, &self.dst)? {
            Some(elem) => Reply::Bulk(elem),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdLMove {
    src: Vec<u8>,
    dst: Vec<u8>,
    src_left: bool,
    dst_left: bool,
}

fn parse_side(arg: &[u8]) -> Result<bool> {
    if arg.eq_ignore_ascii_case(b"left") {
        Ok(true)
    } else if arg.eq_ignore_ascii_case(b"right") {
        Ok(false)
    } else {
        Err(syntax_err("syntax error"))
    }
}

impl<E: KvEngine> Commander<E> for CmdLMove {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.src = args[1].clone();
        self.dst = args[2].clone();
        self.src_left = parse_side(&args[3])?;
        self.dst_left = parse_side(&args[4])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let list = ListDb::new(ctx.storage, ctx.table_id);
        let moved = list.lmove(ctx.batch, &self.src, &self.dst, self.src_left, self.dst_left)?;
        Ok(match moved {
            Some(elem) => Reply::Bulk(elem),
            None => Reply::Nil,
        })
    }
}
