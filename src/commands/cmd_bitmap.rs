// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_i64, parse_u64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::BitmapDb;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("setbit", 4, "write", || Box::<CmdSetBit>::default());
    table.add("getbit", 3, "read-only", || Box::<CmdGetBit>::default());
    table.add("bitcount", -2, "read-only", || Box::<CmdBitCount>::default());
    table.add("bitpos", -3, "read-only", || Box::<CmdBitPos>::default());
}

#[derive(Default)]
struct CmdSetBit {
    key: Vec<u8>,
    offset: u64,
    value: bool,
}

impl<E: KvEngine> Commander<E> for CmdSetBit {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.offset = parse_u64(&args[2])?;
        self.value = match args[3].as_slice() {
            b"0" => false,
            b"1" => true,
            _ => return Err(syntax_err("bit is not an integer or out of range")),
        };
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let bitmap = BitmapDb::new(ctx.storage, ctx.table_id);
        let old = bitmap.set_bit(ctx.batch, &self.key, self.offset, self.value)?;
        Ok(Reply::Integer(i64::from(old)))
    }
}

#[derive(Default)]
struct CmdGetBit {
    key: Vec<u8>,
    offset: u64,
}

impl<E: KvEngine> Commander<E> for CmdGetBit {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.offset = parse_u64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let bitmap = BitmapDb::new(ctx.storage, ctx.table_id);
        let bit = bitmap.get_bit(&self.key, self.offset)?;
        Ok(Reply::Integer(i64::from(bit)))
    }
}

#[derive(Default)]
struct CmdBitCount {
    key: Vec<u8>,
    start: Option<i64>,
    stop: Option<i64>,
}

impl<E: KvEngine> Commander<E> for CmdBitCount {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        match args.len() {
            2 => {}
            4 => {
                self.start = Some(parse_i64(&args[2])?);
                self.stop = Some(parse_i64(&args[3])?);
            }
            _ => return Err(syntax_err("syntax error")),
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let bitmap = BitmapDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(bitmap.bit_count(
            &self.key,
            self.start,
            self.stop,
        )?))
    }
}

#[derive(Default)]
struct CmdBitPos {
    key: Vec<u8>,
    bit: bool,
    start: Option<i64>,
    stop: Option<i64>,
}

impl<E: KvEngine> Commander<E> for CmdBitPos {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.bit = match args[2].as_slice() {
            b"0" => false,
            b"1" => true,
            _ => return Err(syntax_err("bit should be 0 or 1")),
        };
        if let Some(start) = args.get(3) {
            self.start = Some(parse_i64(start)?);
        }
        if let Some(stop) = args.get(4) {
            self.stop = Some(parse_i64(stop)?);
        }
        if args.len() > 5 {
            return Err(syntax_err("syntax error"));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let bitmap = BitmapDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(bitmap.bit_pos(
            &self.key, self.bit, self.start, self.stop,
        )?))
    }
}
