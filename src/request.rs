// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

//! RESP request tokenizer.
//!
//! A three-state machine over one request buffer. The buffer may carry
//! several back-to-back requests; a trailing unterminated line leaves the
//! parser state intact and returns cleanly.

use crate::errors::{Error, Result};

pub const PROTO_INLINE_MAX_SIZE: usize = 16 * 1024;
pub const PROTO_BULK_MAX_SIZE: u64 = 512 * 1024 * 1024;
pub const PROTO_MULTI_MAX_SIZE: i64 = 1024 * 1024;

pub type CommandTokens = Vec<Vec<u8>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParserState {
    ArrayLen,
    BulkLen,
    BulkData,
}

pub struct Request {
    state: ParserState,
    multi_bulk_len: i64,
    bulk_len: u64,
    tokens: CommandTokens,
    commands: Vec<CommandTokens>,
}

impl Default for Request {
    fn default() -> Request {
        Request::new()
    }
}

impl Request {
    pub fn new() -> Request {
        Request {
            state: ParserState::ArrayLen,
            multi_bulk_len: 0,
            bulk_len: 0,
            tokens: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[CommandTokens] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<CommandTokens> {
        self.commands
    }

    /// Tokenizes the request buffer (bulk string arrays or inline commands)
    /// into command token vectors.
    pub fn tokenize(&mut self, input: &[u8]) -> Result<()> {
        let mut pos = 0;
        loop {
            match self.state {
                ParserState::ArrayLen => {
                    let (line, next) = match find_line(input, pos) {
                        Some(v) => v,
                        None => return Ok(()),
                    };
                    pos = next;
                    if line.first() == Some(&b'*') {
                        self.multi_bulk_len = parse_i64(&line[1..]).ok_or(Error::ProtoMulti)?;
                        if self.multi_bulk_len <= 0 {
                            self.multi_bulk_len = 0;
                            continue;
                        }
                        if self.multi_bulk_len > PROTO_MULTI_MAX_SIZE {
                            return Err(Error::ProtoMulti);
                        }
                        self.state = ParserState::BulkLen;
                    } else {
                        if line.len() > PROTO_INLINE_MAX_SIZE {
                            return Err(Error::ProtoInline);
                        }
                        let tokens: CommandTokens = line
                            .split(|&b| b == b' ' || b == b'\t')
                            .filter(|t| !t.is_empty())
                            .map(|t| t.to_vec())
                            .collect();
                        if !tokens.is_empty() {
                            self.commands.push(tokens);
                        }
                    }
                }
                ParserState::BulkLen => {
                    let (line, next) = match find_line(input, pos) {
                        Some(v) => v,
                        None => return Ok(()),
                    };
                    pos = next;
                    if line.first() != Some(&b'$') {
                        return Err(Error::ProtoBulk);
                    }
                    let len = parse_i64(&line[1..]).ok_or(Error::ProtoBulk)?;
                    if len < 0 || len as u64 > PROTO_BULK_MAX_SIZE {
                        return Err(Error::ProtoBulk);
                    }
                    self.bulk_len = len as u64;
                    self.state = ParserState::BulkData;
                }
                ParserState::BulkData => {
                    let need = self.bulk_len as usize + 2;
                    if input.len() - pos < need {
                        return Ok(());
                    }
                    let token = input[pos..pos + self.bulk_len as usize].to_vec();
                    pos += need;
                    self.tokens.push(token);
                    self.multi_bulk_len -= 1;
                    if self.multi_bulk_len == 0 {
                        self.commands.push(std::mem::take(&mut self.tokens));
                        self.state = ParserState::ArrayLen;
                    } else {
                        self.state = ParserState::BulkLen;
                    }
                }
            }
        }
    }
}

fn find_line(input: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    if pos >= input.len() {
        return None;
    }
    let rest = &input[pos..];
    rest.windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| (&rest[..i], pos + i + 2))
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(cmds: &[&[&str]]) -> Vec<CommandTokens> {
        cmds.iter()
            .map(|c| c.iter().map(|t| t.as_bytes().to_vec()).collect())
            .collect()
    }

    #[test]
    fn test_parse_single_command() {
        let mut req = Request::new();
        req.tokenize(b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$4\r\n1234\r\n")
            .unwrap();
        assert_eq!(req.commands(), tokens(&[&["set", "a", "1234"]]).as_slice());
    }

    #[test]
    fn test_parse_command_array() {
        let mut req = Request::new();
        req.tokenize(b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$4\r\n1234\r\n*3\r\n$3\r\nget\r\n$1\r\nb\r\n$4\r\n5678\r\n")
            .unwrap();
        assert_eq!(
            req.commands(),
            tokens(&[&["set", "a", "1234"], &["get", "b", "5678"]]).as_slice()
        );
    }

    #[test]
    fn test_parse_inline_command() {
        let mut req = Request::new();
        req.tokenize(b"set hello world\r\nset\tabc\t123\r\n").unwrap();
        assert_eq!(
            req.commands(),
            tokens(&[&["set", "hello", "world"], &["set", "abc", "123"]]).as_slice()
        );
    }

    #[test]
    fn test_trailing_partial_line_is_ok() {
        let mut req = Request::new();
        req.tokenize(b"*2\r\n$4\r\nping\r\n").unwrap();
        assert!(req.commands().is_empty());
    }

    #[test]
    fn test_empty_multi_bulk_is_skipped() {
        let mut req = Request::new();
        req.tokenize(b"*0\r\n*1\r\n$4\r\nping\r\n").unwrap();
        assert_eq!(req.commands(), tokens(&[&["ping"]]).as_slice());
    }

    #[test]
    fn test_bad_multi_bulk_len() {
        let mut req = Request::new();
        assert!(matches!(
            req.tokenize(b"*abc\r\n"),
            Err(Error::ProtoMulti)
        ));

        let mut req = Request::new();
        let huge = format!("*{}\r\n", PROTO_MULTI_MAX_SIZE + 1);
        assert!(matches!(
            req.tokenize(huge.as_bytes()),
            Err(Error::ProtoMulti)
        ));
    }

    #[test]
    fn test_bad_bulk_len() {
        let mut req = Request::new();
        assert!(matches!(
            req.tokenize(b"*1\r\n%3\r\nfoo\r\n"),
            Err(Error::ProtoBulk)
        ));

        let mut req = Request::new();
        assert!(matches!(
            req.tokenize(b"*1\r\n$-1\r\n"),
            Err(Error::ProtoBulk)
        ));
    }

    #[test]
    fn test_oversized_inline() {
        let mut line = vec![b'a'; PROTO_INLINE_MAX_SIZE + 1];
        line.extend_from_slice(b"\r\n");
        let mut req = Request::new();
        assert!(matches!(req.tokenize(&line), Err(Error::ProtoInline)));
    }

    #[test]
    fn test_binary_safe_bulk() {
        let mut req = Request::new();
        req.tokenize(b"*2\r\n$3\r\nget\r\n$3\r\na\x00b\r\n").unwrap();
        assert_eq!(req.commands()[0][1], b"a\x00b".to_vec());
    }
}
