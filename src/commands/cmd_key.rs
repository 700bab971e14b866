// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Generic key commands and connection trivia.

use engine_traits::KvEngine;

use super::{now_secs, parse_i64, parse_u64, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::storage::Database;

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("ping", -1, "read-only", || Box::<CmdPing>::default());
    table.add("echo", 2, "read-only", || Box::<CmdEcho>::default());
    table.add("del", -2, "write", || Box::<CmdDel>::default());
    table.add("exists", -2, "read-only", || Box::<CmdExists>::default());
    table.add("expire", 3, "write", || Box::<CmdExpire>::default());
    table.add("expireat", 3, "write", || Box::<CmdExpireAt>::default());
    table.add("persist", 2, "write", || Box::<CmdPersist>::default());
    table.add("ttl", 2, "read-only", || Box::<CmdTtl>::default());
    table.add("type", 2, "read-only", || Box::<CmdType>::default());
    table.add("keys", 2, "read-only", || Box::<CmdKeys>::default());
    table.add("scan", -2, "read-only", || Box::<CmdScan>::default());
    table.add("randomkey", 1, "read-only", || Box::<CmdRandomKey>::default());
    table.add("dbsize", 1, "read-only", || Box::<CmdDbSize>::default());
    table.add("flushdb", 1, "write", || Box::<CmdFlushDb>::default());
}

#[derive(Default)]
struct CmdPing {
    msg: Option<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdPing {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.msg = args.get(1).cloned();
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        Ok(match self.msg.take() {
            Some(msg) => Reply::Bulk(msg),
            None => Reply::Simple("PONG"),
        })
    }
}

#[derive(Default)]
struct CmdEcho {
    msg: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdEcho {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.msg = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        Ok(Reply::Bulk(std::mem::take(&mut self.msg)))
    }
}

#[derive(Default)]
struct CmdDel {
    keys: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdDel {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.keys = args[1..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let mut removed = 0i64;
        for key in &self.keys {
            if db.del(ctx.batch, key)? {
                removed += 1;
            }
        }
        Ok(Reply::Integer(removed))
    }
}

#[derive(Default)]
struct CmdExists {
    keys: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdExists {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.keys = args[1..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_slice()).collect();
        Ok(Reply::Integer(db.exists(&keys)?))
    }
}

#[derive(Default)]
struct CmdExpire {
    key: Vec<u8>,
    seconds: i64,
}

impl<E: KvEngine> Commander<E> for CmdExpire {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.seconds = parse_i64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        // A non-positive TTL deletes the key right away.
        let ok = if self.seconds <= 0 {
            db.del(ctx.batch, &self.key)?
        } else {
            let timestamp = now_secs() + self.seconds as u64;
            db.expire(ctx.batch, &self.key, timestamp as u32)?
        };
        Ok(Reply::Integer(i64::from(ok)))
    }
}

#[derive(Default)]
struct CmdExpireAt {
    key: Vec<u8>,
    timestamp: u64,
}

impl<E: KvEngine> Commander<E> for CmdExpireAt {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.timestamp = parse_u64(&args[2])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let ok = if self.timestamp <= now_secs() {
            db.del(ctx.batch, &self.key)?
        } else {
            db.expire(ctx.batch, &self.key, self.timestamp as u32)?
        };
        Ok(Reply::Integer(i64::from(ok)))
    }
}

#[derive(Default)]
struct CmdPersist {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdPersist {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        if db.ttl(&self.key)? < 0 {
            return Ok(Reply::Integer(0));
        }
        let ok = db.expire(ctx.batch, &self.key, 0)?;
        Ok(Reply::Integer(i64::from(ok)))
    }
}

#[derive(Default)]
struct CmdTtl {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdTtl {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(db.ttl(&self.key)?))
    }
}

#[derive(Default)]
struct CmdType {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdType {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let redis_type = db.type_of(&self.key)?;
        Ok(Reply::Simple(redis_type.name()))
    }
}

#[derive(Default)]
struct CmdKeys {
    prefix: Vec<u8>,
    exact: Option<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdKeys {
    /// Only the prefix subset of glob patterns is supported: `*`,
    /// `prefix*`, or a literal key.
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        let pattern = &args[1];
        if pattern == b"*" {
            self.prefix = Vec::new();
        } else if pattern.last() == Some(&b'*') {
            self.prefix = pattern[..pattern.len() - 1].to_vec();
        } else {
            self.exact = Some(pattern.clone());
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let keys = match &self.exact {
            Some(key) => db
                .keys(key)?
                .into_iter()
                .filter(|k| k == key)
                .collect(),
            None => db.keys(&self.prefix)?,
        };
        Ok(Reply::Array(keys.into_iter().map(Reply::Bulk).collect()))
    }
}

#[derive(Default)]
struct CmdScan {
    cursor: Vec<u8>,
    prefix: Vec<u8>,
    limit: u64,
}

impl<E: KvEngine> Commander<E> for CmdScan {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.cursor = if args[1] == b"0" {
            Vec::new()
        } else {
            args[1].clone()
        };
        self.limit = 20;
        let mut i = 2;
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
                return Err(super::syntax_err("syntax error"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let (keys, next_cursor) = db.scan(&self.cursor, self.limit, &self.prefix)?;
        let cursor = if next_cursor.is_empty() {
            b"0".to_vec()
        } else {
            next_cursor
        };
        Ok(Reply::Array(vec![
            Reply::Bulk(cursor),
            Reply::Array(keys.into_iter().map(Reply::Bulk).collect()),
        ]))
    }
}

#[derive(Default)]
struct CmdRandomKey;

impl<E: KvEngine> Commander<E> for CmdRandomKey {
    fn parse(&mut self, _args: &[Vec<u8>]) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        Ok(match db.random_key()? {
            Some(key) => Reply::Bulk(key),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdDbSize;

impl<E: KvEngine> Commander<E> for CmdDbSize {
    fn parse(&mut self, _args: &[Vec<u8>]) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        let stats = db.get_key_num_stats()?;
        Ok(Reply::Integer(stats.n_key as i64))
    }
}

#[derive(Default)]
struct CmdFlushDb;

impl<E: KvEngine> Commander<E> for CmdFlushDb {
    fn parse(&mut self, _args: &[Vec<u8>]) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let db = Database::new(ctx.storage, ctx.table_id);
        db.flush_db(ctx.batch)?;
        Ok(Reply::ok())
    }
}
