// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_i64, parse_u64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::SortedintDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("siadd", -3, "write", || Box::<CmdSiAdd>::default());
    table.add("sirem", -3, "write", || Box::<CmdSiRem>::default());
    table.add("sicard", 2, "read-only", || Box::<CmdSiCard>::default());
    table.add("siexists", -3, "read-only", || Box::<CmdSiExists>::default());
    table.add("sirange", -4, "read-only", || Box::new(CmdSiRange::new(false)));
    table.add("sirevrange", -4, "read-only", || Box::new(CmdSiRange::new(true)));
}

fn parse_ids(args: &[Vec<u8>]) -> Result<Vec<i64>> {
    args.iter().map(|a| parse_i64(a)).collect()
}

#[derive(Default)]
struct CmdSiAdd {
    key: Vec<u8>,
    ids: Vec<i64>,
}

impl<E: KvEngine> Commander<E> for CmdSiAdd {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.ids = parse_ids(&args[2..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let si = SortedintDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(si.add(ctx.batch, &self.key, &self.ids)?))
    }
}

#[derive(Default)]
struct CmdSiRem {
    key: Vec<u8>,
    ids: Vec<i64>,
}

impl<E: KvEngine> Commander<E> for CmdSiRem {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.ids = parse_ids(&args[2..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let si = SortedintDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(si.remove(ctx.batch, &self.key, &self.ids)?))
    }
}

#[derive(Default)]
struct CmdSiCard {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdSiCard {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let si = SortedintDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(si.card(&self.key)?)))
    }
}

#[derive(Default)]
struct CmdSiExists {
    key: Vec<u8>,
    ids: Vec<i64>,
}

impl<E: KvEngine> Commander<E> for CmdSiExists {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.ids = parse_ids(&args[2..])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let si = SortedintDb::new(ctx.storage, ctx.table_id);
        let found = si.exists(&self.key, &self.ids)?;
        Ok(Reply::Array(
            found
                .into_iter()
                .map(|ok| Reply::Integer(i64::from(ok)))
                .collect(),
        ))
    }
}

struct CmdSiRange {
    reversed: bool,
    key: Vec<u8>,
    offset: u64,
    count: u64,
    cursor_id: Option<i64>,
}

impl CmdSiRange {
    fn new(reversed: bool) -> CmdSiRange {
        CmdSiRange {
            reversed,
            key: Vec::new(),
            offset: 0,
            count: 0,
            cursor_id: None,
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdSiRange {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.offset = parse_u64(&args[2])?;
        self.count = parse_u64(&args[3])?;
        if let Some(opt) = args.get(4) {
            if !opt.eq_ignore_ascii_case(b"cursor") || args.len() != 6 {
                return Err(syntax_err("syntax error"));
            }
            self.cursor_id = Some(parse_i64(&args[5])?);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let si = SortedintDb::new(ctx.storage, ctx.table_id);
        let ids = si.range(
            &self.key,
            self.cursor_id,
            self.offset,
            self.count,
            self.reversed,
        )?;
        Ok(Reply::Array(
            ids.into_iter()
                .map(|id| Reply::Bulk(id.to_string().into_bytes()))
                .collect(),
        ))
    }
}
