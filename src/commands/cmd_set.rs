// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_u64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::SetDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("sadd", -3, "write", || Box::<CmdSAdd>::default());
    table.add("srem", -3, "write", || Box::<CmdSRem>::default());
    table.add("scard", 2, "read-only", || Box::<CmdSCard>::default());
    table.add("sismember", 3, "read-only", || Box::<CmdSIsMember>::default());
    table.add("smembers", 2, "read-only", || Box::<CmdSMembers>::default());
    table.add("spop", -2, "write", || Box::new(CmdTake::new(true)));
    table.add("srandmember", -2, "read-only", || Box::new(CmdTake::new(false)));
    table.add("smove", 4, "write", || Box::<CmdSMove>::default());
    table.add("sdiff", -2, "read-only", || Box::new(CmdAlgebra::new(SetOp::Diff)));
    table.add("sunion", -2, "read-only", || Box::new(CmdAlgebra::new(SetOp::Union)));
    table.add("sinter", -2, "read-only", || Box::new(CmdAlgebra::new(SetOp::Inter)));
    table.add("sdiffstore", -3, "write", || {
        Box::new(CmdAlgebraStore::new(SetOp::Diff))
    });
    table.add("sunionstore", -3, "write", || {
        Box::new(CmdAlgebraStore::new(SetOp::Union))
    });
    table.add("sinterstore", -3, "write", || {
        Box::new(CmdAlgebraStore::new(SetOp::Inter))
    });
    table.add("sscan", -3, "read-only", || Box::<CmdSScan>::default());
}

#[derive(Clone, Copy)]
enum SetOp {
    Diff,
    Union,
    Inter,
}

#[derive(Default)]
struct CmdSAdd {
    key: Vec<u8>,
    members: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdSAdd {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.members = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let members: Vec<&[u8]> = self.members.iter().map(|m| m.as_slice()).collect();
        Ok(Reply::Integer(set.add(ctx.batch, &self.key, &members)?))
    }
}

#[derive(Default)]
struct CmdSRem {
    key: Vec<u8>,
    members: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdSRem {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.members = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let members: Vec<&[u8]> = self.members.iter().map(|m| m.as_slice()).collect();
        Ok(Reply::Integer(set.remove(ctx.batch, &self.key, &members)?))
    }
}

#[derive(Default)]
struct CmdSCard {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSCard {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(set.card(&self.key)?)))
    }
}

#[derive(Default)]
struct CmdSIsMember {
    key: Vec<u8>,
    member: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSIsMember {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.member = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(
            set.is_member(&self.key, &self.member)?,
        )))
    }
}

#[derive(Default)]
struct CmdSMembers {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSMembers {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let members = set.members(&self.key)?;
        Ok(Reply::Array(members.into_iter().map(Reply::Bulk).collect()))
    }
}

struct CmdTake {
    pop: bool,
    key: Vec<u8>,
    count: usize,
    count_given: bool,
}

impl CmdTake {
    fn new(pop: bool) -> CmdTake {
        CmdTake {
            pop,
            key: Vec::new(),
            count: 1,
            count_given: false,
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdTake {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        if let Some(count) = args.get(2) {
            self.count = parse_u64(count)? as usize;
            self.count_given = true;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let mut taken = set.take(ctx.batch, &self.key, self.count, self.pop)?;
        if self.count_given {
            Ok(Reply::Array(taken.into_iter().map(Reply::Bulk).collect()))
        } else {
            Ok(match taken.pop() {
                Some(member) => Reply::Bulk(member),
                None => Reply::Nil,
            })
        }
    }
}

#[derive(Default)]
struct CmdSMove {
    src: Vec<u8>,
    dst: Vec<u8>,
    member: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSMove {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.src = args[1].clone();
        self.dst = args[2].clone();
        self.member = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let moved = set.move_member(ctx.batch, &self.src, &self.dst, &self.member)?;
        Ok(Reply::Integer(i64::from(moved)))
    }
}

struct CmdAlgebra {
    op: SetOp,
    keys: Vec<Vec<u8>>,
}

impl CmdAlgebra {
    fn new(op: SetOp) -> CmdAlgebra {
        CmdAlgebra {
            op,
            keys: Vec::new(),
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdAlgebra {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.keys = args[1..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_slice()).collect();
        let members = match self.op {
            SetOp::Diff => set.diff(&keys)?,
            SetOp::Union => set.union(&keys)?,
            SetOp::Inter => set.inter(&keys)?,
        };
        Ok(Reply::Array(members.into_iter().map(Reply::Bulk).collect()))
    }
}

struct CmdAlgebraStore {
    op: SetOp,
    dst: Vec<u8>,
    keys: Vec<Vec<u8>>,
}

impl CmdAlgebraStore {
    fn new(op: SetOp) -> CmdAlgebraStore {
        CmdAlgebraStore {
            op,
            dst: Vec::new(),
            keys: Vec::new(),
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdAlgebraStore {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.dst = args[1].clone();
        self.keys = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_slice()).collect();
        let size = match self.op {
            SetOp::Diff => set.diff_store(ctx.batch, &self.dst, &keys)?,
            SetOp::Union => set.union_store(ctx.batch, &self.dst, &keys)?,
            SetOp::Inter => set.inter_store(ctx.batch, &self.dst, &keys)?,
        };
        Ok(Reply::Integer(size))
    }
}

#[derive(Default)]
struct CmdSScan {
    key: Vec<u8>,
    cursor: Vec<u8>,
    prefix: Vec<u8>,
    limit: u64,
}

impl<E: KvEngine> Commander<E> for CmdSScan {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.cursor = if args[2] == b"0" {
            Vec::new()
        } else {
            args[2].clone()
        };
        self.limit = 20;
        let mut i = 3;
        while i < args.len() {
            if args[i].eq_ignore_ascii_case(b"match") && i + 1 < args.len() {
                let pattern = &args[i + 1];
                self.prefix = if pattern.last() == Some(&b'*') {
                    pattern[..pattern.len() - 1].to_vec()
                } else {
                    pattern.clone()
                };
                i += 2;
            } else if args[i].eq_ignore_ascii_case(b"count") && i + 1 < args.len() {
                self.limit = parse_u64(&args[i + 1])?;
                i += 2;
            } else {
                return Err(syntax_err("syntax error"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let set = SetDb::new(ctx.storage, ctx.table_id);
        let (members, next_cursor) =
            match set.scan(&self.key, &self.cursor, self.limit, &self.prefix) {
                Ok(page) => page,
                Err(ref e) if e.is_absent() => (Vec::new(), Vec::new()),
                Err(e) => return Err(e),
            };
        let cursor = if next_cursor.is_empty() {
            b"0".to_vec()
        } else {
            next_cursor
        };
        Ok(Reply::Array(vec![
            Reply::Bulk(cursor),
            Reply::Array(members.into_iter().map(Reply::Bulk).collect()),
        ]))
    }
}
