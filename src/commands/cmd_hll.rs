// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::HyperloglogDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("pfadd", -2, "write", || Box::<CmdPfAdd>::default());
    table.add("pfcount", -2, "read-only", || Box::<CmdPfCount>::default());
    table.add("pfmerge", -2, "write", || Box::<CmdPfMerge>::default());
}

#[derive(Default)]
struct CmdPfAdd {
    key: Vec<u8>,
    elements: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdPfAdd {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.elements = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hll = HyperloglogDb::new(ctx.storage, ctx.table_id);
        if self.elements.is_empty() {
            return Ok(Reply::Integer(0));
        }
        let elements: Vec<&[u8]> = self.elements.iter().map(|e| e.as_slice()).collect();
        Ok(Reply::Integer(hll.add(ctx.batch, &self.key, &elements)?))
    }
}

#[derive(Default)]
struct CmdPfCount {
    keys: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdPfCount {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.keys = args[1..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hll = HyperloglogDb::new(ctx.storage, ctx.table_id);
        let count = if self.keys.len() == 1 {
            hll.count(&self.keys[0])?
        } else {
            let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_slice()).collect();
            hll.count_multi(&keys)?
        };
        Ok(Reply::Integer(count as i64))
    }
}

#[derive(Default)]
struct CmdPfMerge {
    dest: Vec<u8>,
    sources: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdPfMerge {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.dest = args[1].clone();
        self.sources = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let hll = HyperloglogDb::new(ctx.storage, ctx.table_id);
        let sources: Vec<&[u8]> = self.sources.iter().map(|k| k.as_slice()).collect();
        hll.merge(ctx.batch, &self.dest, &sources)?;
        Ok(Reply::ok())
    }
}
