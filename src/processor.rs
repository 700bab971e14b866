// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! The request pipeline: tokenize, dispatch, execute, accumulate replies
//! and one write batch per request.

use std::sync::Arc;

use engine_traits::KvEngine;

use crate::commands::{CommandContext, CommandTable};
use crate::errors::{Error, Result};
use crate::metrics::{PROCESSOR_COMMANDS, PROCESSOR_ERRORS};
use crate::reply::Reply;
use crate::request::{CommandTokens, Request};
use crate::storage::Storage;

pub struct Processor<E: KvEngine> {
    storage: Arc<Storage<E>>,
    commands: CommandTable<E>,
}

impl<E: KvEngine> Processor<E> {
    pub fn new(storage: Arc<Storage<E>>) -> Processor<E> {
        Processor {
            storage,
            commands: CommandTable::new(),
        }
    }

    pub fn storage(&self) -> &Arc<Storage<E>> {
        &self.storage
    }

    /// Runs one RESP request buffer against the table. Per-command failures
    /// are encoded as RESP error replies and stop the pipeline; earlier
    /// commands keep their replies and their writes in the returned batch.
    /// Only protocol-level failures surface as `Err`.
    pub fn handle(&self, table_id: i64, request: &[u8]) -> Result<(Vec<u8>, E::WriteBatch)> {
        let mut parser = Request::new();
        parser.tokenize(request)?;

        let mut batch = self.storage.engine().write_batch();
        let mut resp = Vec::new();
        for tokens in parser.into_commands() {
            match self.execute_command(table_id, &tokens, &mut batch) {
                Ok(reply) => {
                    PROCESSOR_COMMANDS.inc();
                    reply.encode_to(&mut resp);
                }
                Err(e) => {
                    PROCESSOR_ERRORS.inc();
                    debug!("command failed"; "err" => %e);
                    Reply::Error(error_reply(&e)).encode_to(&mut resp);
                    break;
                }
            }
        }
        Ok((resp, batch))
    }

    fn execute_command(
        &self,
        table_id: i64,
        tokens: &CommandTokens,
        batch: &mut E::WriteBatch,
    ) -> Result<Reply> {
        let name = String::from_utf8_lossy(&tokens[0]).to_lowercase();
        let attributes = self
            .commands
            .get(&name)
            .ok_or_else(|| Error::RedisUnknownCmd(name.clone()))?;
        if !attributes.check_arity(tokens.len()) {
            return Err(Error::RedisInvalidCmd(name));
        }
        let mut commander = (attributes.factory)();
        commander.parse(tokens)?;
        let mut ctx = CommandContext {
            storage: self.storage.as_ref(),
            table_id,
            batch,
        };
        commander.execute(&mut ctx)
    }
}

/// Maps engine errors onto client-visible RESP error strings. `WRONGTYPE`
/// keeps its standard prefix, everything else gets `ERR`.
fn error_reply(e: &Error) -> String {
    match e {
        Error::WrongType => e.to_string(),
        _ => format!("ERR {}", e),
    }
}
