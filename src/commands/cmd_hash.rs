// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_i64, parse_f64, parse_u64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::hash::FieldValue;
use crate::types::HashDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("hget", 3, "read-only", || Box::<CmdHGet>::default());
    table.add("hset", -4, "write", || Box::<CmdHSet>::default());
    table.add("hsetnx", 4, "write", || Box::<CmdHSetNx>::default());
    table.add("hdel", -3, "write", || Box::<CmdHDel>::default());
    table.add("hexists", 3, "read-only", || Box::<CmdHExists>::default());
    table.add("hlen", 2, "read-only", || Box::<CmdHLen>::default());
    table.add("hstrlen", 3, "read-only", || Box::<CmdHStrlen>::default());
    table.add("hmget", -3, "read-only", || Box::<CmdHMGet>::default());
    table.add("hmset", -4, "write", || Box::<CmdHMSet>::default());
    table.add("hgetall", 2, "read-only", || Box::<CmdHGetAll>::default());
    table.add("hkeys", 2, "read-only", || Box::<CmdHKeys>::default());
    table.add("hvals", 2, "read-only", || Box::<CmdHVals>::default());
    table.add("hincrby", 4, "write", || Box::<CmdHIncrBy>::default());
    table.add("hincrbyfloat", 4, "write", || Box::<CmdHIncrByFloat>::default());
    table.add("hscan", -3, "read-only", || Box::<CmdHScan>::default());
}

fn parse_field_values(args: &[Vec<u8>]) -> Result<Vec<FieldValue>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(syntax_err("wrong number of arguments"));
    }
    Ok(args
        .chunks(2)
        .map(|c| FieldValue {
            field: c[0].clone(),
            value: c[1].clone(),
        })
        .collect())
}

#[derive(Default)]
struct CmdHGet {
    key: Vec<u8>,
    field: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHGet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        match hash.get(&self.key, &self.field) {
            Ok(value) => Ok(Reply::Bulk(value)),
            Err(ref e) if e.is_absent() => Ok(Reply::Nil),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct CmdHSet {
    key: Vec<u8>,
    field_values: Vec<FieldValue>,
}

impl<E: KvEngine> Commander<E> for CmdHSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field_values = parse_field_values(&args[2..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let added = hash.mset(ctx.batch, &self.key, &self.field_values, false)?;
        Ok(Reply::Integer(added))
    }
}

#[derive(Default)]
struct CmdHSetNx {
    key: Vec<u8>,
    field: Vec<u8>,
    value: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHSetNx {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        self.value = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let added = hash.set_nx(ctx.batch, &self.key, &self.field, &self.value)?;
        Ok(Reply::Integer(added))
    }
}

#[derive(Default)]
struct CmdHDel {
    key: Vec<u8>,
    fields: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdHDel {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.fields = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let fields: Vec<&[u8]> = self.fields.iter().map(|f| f.as_slice()).collect();
        Ok(Reply::Integer(hash.delete(ctx.batch, &self.key, &fields)?))
    }
}

#[derive(Default)]
struct CmdHExists {
    key: Vec<u8>,
    field: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHExists {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(hash.exists(&self.key, &self.field)?)))
    }
}

#[derive(Default)]
struct CmdHLen {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHLen {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(hash.size(&self.key)?)))
    }
}

#[derive(Default)]
struct CmdHStrlen {
    key: Vec<u8>,
    field: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHStrlen {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        match hash.get(&self.key, &self.field) {
            Ok(value) => Ok(Reply::Integer(value.len() as i64)),
            Err(ref e) if e.is_absent() => Ok(Reply::Integer(0)),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct CmdHMGet {
    key: Vec<u8>,
    fields: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdHMGet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.fields = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let fields: Vec<&[u8]> = self.fields.iter().map(|f| f.as_slice()).collect();
        let values = match hash.mget(&self.key, &fields) {
            Ok(values) => values,
            Err(ref e) if e.is_absent() => vec![None; fields.len()],
            Err(e) => return Err(e),
        };
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

#[derive(Default)]
struct CmdHMSet {
    key: Vec<u8>,
    field_values: Vec<FieldValue>,
}

impl<E: KvEngine> Commander<E> for CmdHMSet {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field_values = parse_field_values(&args[2..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        hash.mset(ctx.batch, &self.key, &self.field_values, false)?;
        Ok(Reply::ok())
    }
}

fn get_all_as<E: KvEngine>(
    ctx: &mut CommandContext<'_, E>,
    key: &[u8],
    f: impl Fn(FieldValue, &mut Vec<Reply>),
) -> Result<Reply> {
    let hash = HashDb::new(ctx.storage, ctx.table_id);
    let field_values = match hash.get_all(key) {
        Ok(fvs) => fvs,
        Err(ref e) if e.is_absent() => Vec::new(),
        Err(e) => return Err(e),
    };
    let mut out = Vec::new();
    for fv in field_values {
        f(fv, &mut out);
    }
    Ok(Reply::Array(out))
}

#[derive(Default)]
struct CmdHGetAll {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHGetAll {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        get_all_as(ctx, &self.key, |fv, out| {
            out.push(Reply::Bulk(fv.field));
            out.push(Reply::Bulk(fv.value));
        })
    }
}

#[derive(Default)]
struct CmdHKeys {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHKeys {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        get_all_as(ctx, &self.key, |fv, out| out.push(Reply::Bulk(fv.field)))
    }
}

#[derive(Default)]
struct CmdHVals {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdHVals {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        get_all_as(ctx, &self.key, |fv, out| out.push(Reply::Bulk(fv.value)))
    }
}

#[derive(Default)]
struct CmdHIncrBy {
    key: Vec<u8>,
    field: Vec<u8>,
    increment: i64,
}

impl<E: KvEngine> Commander<E> for CmdHIncrBy {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        self.increment = parse_i64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let value = hash.incr_by(ctx.batch, &self.key, &self.field, self.increment)?;
        Ok(Reply::Integer(value))
    }
}

#[derive(Default)]
struct CmdHIncrByFloat {
    key: Vec<u8>,
    field: Vec<u8>,
    increment: f64,
}

impl<E: KvEngine> Commander<E> for CmdHIncrByFloat {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.field = args[2].clone();
        self.increment = parse_f64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let value = hash.incr_by_float(ctx.batch, &self.key, &self.field, self.increment)?;
        Ok(Reply::double(value))
    }
}

#[derive(Default)]
struct CmdHScan {
    key: Vec<u8>,
    cursor: Vec<u8>,
    prefix: Vec<u8>,
    limit: u64,
}

impl<E: KvEngine> Commander<E> for CmdHScan {
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
        let hash = HashDb::new(ctx.storage, ctx.table_id);
        let (field_values, next_cursor) =
            match hash.scan(&self.key, &self.cursor, self.limit, &self.prefix) {
                Ok(page) => page,
                Err(ref e) if e.is_absent() => (Vec::new(), Vec::new()),
                Err(e) => return Err(e),
            };
        let cursor = if next_cursor.is_empty() {
            b"0".to_vec()
        } else {
            next_cursor
        };
        let mut items = Vec::with_capacity(field_values.len() * 2);
        for fv in field_values {
            items.push(Reply::Bulk(fv.field));
            items.push(Reply::Bulk(fv.value));
        }
        Ok(Reply::Array(vec![Reply::Bulk(cursor), Reply::Array(items)]))
    }
}
