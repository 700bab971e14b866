// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! Command table and dispatch.
//!
//! Every command is a small value implementing `Commander`: `parse` binds
//! the request tokens, `execute` runs the typed operation and yields a
//! reply. The table maps lowercased names to attributes (redis arity
//! convention: positive exact, negative minimum) and a factory producing a
//! fresh commander per invocation.

mod cmd_bitmap;
mod cmd_hash;
mod cmd_hll;
mod cmd_key;
mod cmd_list;
mod cmd_set;
mod cmd_sortedint;
mod cmd_string;
mod cmd_zset;

use std::collections::HashMap;

use engine_traits::KvEngine;

use crate::errors::{Error, Result};
use crate::reply::Reply;
use crate::storage::Storage;

pub struct CommandContext<'a, E: KvEngine> {
    pub storage: &'a Storage<E>,
    pub table_id: i64,
    pub batch: &'a mut E::WriteBatch,
}

pub trait Commander<E: KvEngine>: Send {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()>;
    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply>;
}

pub type CommanderFactory<E> = fn() -> Box<dyn Commander<E>>;

pub struct CommandAttributes<E: KvEngine> {
    pub name: &'static str,
    pub arity: i32,
    pub flags: &'static str,
    pub factory: CommanderFactory<E>,
}

impl<E: KvEngine> CommandAttributes<E> {
    pub fn check_arity(&self, argc: usize) -> bool {
        if self.arity > 0 {
            argc == self.arity as usize
        } else {
            argc >= (-self.arity) as usize
        }
    }
}

pub struct CommandTable<E: KvEngine> {
    commands: HashMap<&'static str, CommandAttributes<E>>,
}

impl<E: KvEngine> Default for CommandTable<E> {
    fn default() -> Self {
        CommandTable::new()
    }
}

impl<E: KvEngine> CommandTable<E> {
    pub fn new() -> CommandTable<E> {
        let mut table = CommandTable {
            commands: HashMap::new(),
        };
        cmd_key::register(&mut table);
        cmd_string::register(&mut table);
        cmd_hash::register(&mut table);
        cmd_list::register(&mut table);
        cmd_set::register(&mut table);
        cmd_zset::register(&mut table);
        cmd_bitmap::register(&mut table);
        cmd_sortedint::register(&mut table);
        cmd_hll::register(&mut table);
        table
    }

    pub(crate) fn add(
        &mut self,
        name: &'static str,
        arity: i32,
        flags: &'static str,
        factory: CommanderFactory<E>,
    ) {
        let attributes = CommandAttributes {
            name,
            arity,
            flags,
            factory,
        };
        self.commands.insert(name, attributes);
    }

    pub fn get(&self, name: &str) -> Option<&CommandAttributes<E>> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub(crate) fn parse_i64(arg: &[u8]) -> Result<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(Error::NotNumber)
}

pub(crate) fn parse_u64(arg: &[u8]) -> Result<u64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(Error::NotNumber)
}

pub(crate) fn parse_f64(arg: &[u8]) -> Result<f64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .ok_or(Error::NotNumber)
}

pub(crate) fn syntax_err(msg: &str) -> Error {
    Error::RedisParseErr(msg.to_owned())
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use engine_memory::MemoryEngine;

    use super::*;

    #[test]
    fn test_table_lookup_and_arity() {
        let table: CommandTable<MemoryEngine> = CommandTable::new();
        assert!(table.len() > 80);

        let get = table.get("get").unwrap();
        assert_eq!(get.arity, 2);
        assert!(get.check_arity(2));
        assert!(!get.check_arity(3));

        let set = table.get("set").unwrap();
        assert_eq!(set.arity, -3);
        assert!(set.check_arity(3));
        assert!(set.check_arity(5));
        assert!(!set.check_arity(2));

        assert!(table.get("nosuchcmd").is_none());
    }
}
