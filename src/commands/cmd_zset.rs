// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use engine_traits::KvEngine;

use super::{parse_f64, parse_i64, syntax_err, CommandContext, CommandTable, Commander};
use crate::errors::Result;
use crate::reply::Reply;
use crate::types::zset::{
    parse_range_lex_spec, parse_range_spec, RangeLexSpec, RangeSpec, ZAddFlags,
};
use crate::types::{MemberScore, ZSetDb};

pub(super) fn register<E: KvEngine>(table: &mut CommandTable<E>) {
    table.add("zadd", -4, "write", || Box::<CmdZAdd>::default());
    table.add("zcard", 2, "read-only", || Box::<CmdZCard>::default());
    table.add("zcount", 4, "read-only", || Box::<CmdZCount>::default());
    table.add("zincrby", 4, "write", || Box::<CmdZIncrBy>::default());
    table.add("zscore", 3, "read-only", || Box::<CmdZScore>::default());
    table.add("zmscore", -3, "read-only", || Box::<CmdZMScore>::default());
    table.add("zrange", -4, "read-only", || Box::new(CmdZRange::new(false)));
    table.add("zrevrange", -4, "read-only", || Box::new(CmdZRange::new(true)));
    table.add("zrangebyscore", -4, "read-only", || {
        Box::new(CmdZRangeByScore::new(false))
    });
    table.add("zrevrangebyscore", -4, "read-only", || {
        Box::new(CmdZRangeByScore::new(true))
    });
    table.add("zrangebylex", -4, "read-only", || Box::<CmdZRangeByLex>::default());
    table.add("zrank", 3, "read-only", || Box::new(CmdZRank::new(false)));
    table.add("zrevrank", 3, "read-only", || Box::new(CmdZRank::new(true)));
    table.add("zrem", -3, "write", || Box::<CmdZRem>::default());
    table.add("zremrangebyrank", 4, "write", || {
        Box::<CmdZRemRangeByRank>::default()
    });
    table.add("zremrangebyscore", 4, "write", || {
        Box::<CmdZRemRangeByScore>::default()
    });
    table.add("zremrangebylex", 4, "write", || {
        Box::<CmdZRemRangeByLex>::default()
    });
    table.add("zpopmin", -2, "write", || Box::new(CmdZPop::new(true)));
    table.add("zpopmax", -2, "write", || Box::new(CmdZPop::new(false)));
}

fn mscores_reply(mscores: Vec<MemberScore>, with_scores: bool) -> Reply {
    let mut out = Vec::new();
    for ms in mscores {
        out.push(Reply::Bulk(ms.member));
        if with_scores {
            out.push(Reply::double(ms.score));
        }
    }
    Reply::Array(out)
}

#[derive(Default)]
struct CmdZAdd {
    key: Vec<u8>,
    flags: ZAddFlags,
    incr: bool,
    mscores: Vec<MemberScore>,
}

impl<E: KvEngine> Commander<E> for CmdZAdd {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        let mut i = 2;
        while i < args.len() {
            if args[i].eq_ignore_ascii_case(b"nx") {
                self.flags.nx = true;
                i += 1;
            } else if args[i].eq_ignore_ascii_case(b"xx") {
                self.flags.xx = true;
                i += 1;
            } else if args[i].eq_ignore_ascii_case(b"incr") {
                self.incr = true;
                i += 1;
            } else {
                break;
            }
        }
        if self.flags.nx && self.flags.xx {
            return Err(syntax_err(
                "XX and NX options at the same time are not compatible",
            ));
        }
        let rest = &args[i..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(syntax_err("syntax error"));
        }
        for pair in rest.chunks(2) {
            self.mscores.push(MemberScore {
                score: parse_f64(&pair[0])?,
                member: pair[1].clone(),
            });
        }
        if self.incr && self.mscores.len() != 1 {
            return Err(syntax_err(
                "INCR option supports a single increment-element pair",
            ));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        if self.incr {
            let ms = &self.mscores[0];
            let new_score = zset.incr_by(ctx.batch, &self.key, &ms.member, ms.score, self.flags)?;
            return Ok(match new_score {
                Some(score) => Reply::double(score),
                None => Reply::Nil,
            });
        }
        let added = zset.add(ctx.batch, &self.key, self.flags, &self.mscores)?;
        Ok(Reply::Integer(added))
    }
}

#[derive(Default)]
struct CmdZCard {
    key: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdZCard {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        Ok(Reply::Integer(i64::from(zset.card(&self.key)?)))
    }
}

#[derive(Default)]
struct CmdZCount {
    key: Vec<u8>,
    spec: Option<RangeSpec>,
}

impl<E: KvEngine> Commander<E> for CmdZCount {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.spec = Some(parse_range_spec(&args[2], &args[3])?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let spec = self.spec.take().unwrap_or_default();
        Ok(Reply::Integer(zset.count(&self.key, &spec)?))
    }
}

#[derive(Default)]
struct CmdZIncrBy {
    key: Vec<u8>,
    increment: f64,
    member: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdZIncrBy {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.increment = parse_f64(&args[2])?;
        self.member = args[3].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let score = zset
            .incr_by(
                ctx.batch,
                &self.key,
                &self.member,
                self.increment,
                ZAddFlags::default(),
            )?
            .unwrap_or(self.increment);
        Ok(Reply::double(score))
    }
}

#[derive(Default)]
struct CmdZScore {
    key: Vec<u8>,
    member: Vec<u8>,
}

impl<E: KvEngine> Commander<E> for CmdZScore {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.member = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        Ok(match zset.score(&self.key, &self.member)? {
            Some(score) => Reply::double(score),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdZMScore {
    key: Vec<u8>,
    members: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdZMScore {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.members = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let members: Vec<&[u8]> = self.members.iter().map(|m| m.as_slice()).collect();
        let scores = zset.mget(&self.key, &members)?;
        Ok(Reply::Array(
            scores
                .into_iter()
                .map(|s| match s {
                    Some(score) => Reply::double(score),
                    None => Reply::Nil,
                })
                .collect(),
        ))
    }
}

struct CmdZRange {
    reversed: bool,
    key: Vec<u8>,
    start: i64,
    stop: i64,
    with_scores: bool,
}

impl CmdZRange {
    fn new(reversed: bool) -> CmdZRange {
        CmdZRange {
            reversed,
            key: Vec::new(),
            start: 0,
            stop: 0,
            with_scores: false,
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdZRange {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.start = parse_i64(&args[2])?;
        self.stop = parse_i64(&args[3])?;
        if let Some(opt) = args.get(4) {
            if !opt.eq_ignore_ascii_case(b"withscores") || args.len() > 5 {
                return Err(syntax_err("syntax error"));
            }
            self.with_scores = true;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let mscores = zset.range_by_rank(&self.key, self.start, self.stop, self.reversed)?;
        Ok(mscores_reply(mscores, self.with_scores))
    }
}

struct CmdZRangeByScore {
    reversed: bool,
    key: Vec<u8>,
    spec: RangeSpec,
    with_scores: bool,
}

impl CmdZRangeByScore {
    fn new(reversed: bool) -> CmdZRangeByScore {
        CmdZRangeByScore {
            reversed,
            key: Vec::new(),
            spec: RangeSpec::default(),
            with_scores: false,
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdZRangeByScore {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        // The reversed form takes (max, min).
        self.spec = if self.reversed {
            parse_range_spec(&args[3], &args[2])?
        } else {
            parse_range_spec(&args[2], &args[3])?
        };
        self.spec.reversed = self.reversed;
        let mut i = 4;
        while i < args.len() {
            if args[i].eq_ignore_ascii_case(b"withscores") {
                self.with_scores = true;
                i += 1;
            } else if args[i].eq_ignore_ascii_case(b"limit") && i + 2 < args.len() {
                self.spec.offset = parse_i64(&args[i + 1])?;
                self.spec.count = parse_i64(&args[i + 2])?;
                i += 3;
            } else {
                return Err(syntax_err("syntax error"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let mscores = zset.range_by_score(&self.key, &self.spec)?;
        Ok(mscores_reply(mscores, self.with_scores))
    }
}

#[derive(Default)]
struct CmdZRangeByLex {
    key: Vec<u8>,
    spec: RangeLexSpec,
}

impl<E: KvEngine> Commander<E> for CmdZRangeByLex {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.spec = parse_range_lex_spec(&args[2], &args[3])?;
        let mut i = 4;
        while i < args.len() {
            if args[i].eq_ignore_ascii_case(b"limit") && i + 2 < args.len() {
                self.spec.offset = parse_i64(&args[i + 1])?;
                self.spec.count = parse_i64(&args[i + 2])?;
                i += 3;
            } else {
                return Err(syntax_err("syntax error"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let members = zset.range_by_lex(&self.key, &self.spec)?;
        Ok(Reply::Array(members.into_iter().map(Reply::Bulk).collect()))
    }
}

struct CmdZRank {
    reversed: bool,
    key: Vec<u8>,
    member: Vec<u8>,
}

impl CmdZRank {
    fn new(reversed: bool) -> CmdZRank {
        CmdZRank {
            reversed,
            key: Vec::new(),
            member: Vec::new(),
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdZRank {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.member = args[2].clone();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        Ok(match zset.rank(&self.key, &self.member, self.reversed)? {
            Some(rank) => Reply::Integer(rank),
            None => Reply::Nil,
        })
    }
}

#[derive(Default)]
struct CmdZRem {
    key: Vec<u8>,
    members: Vec<Vec<u8>>,
}

impl<E: KvEngine> Commander<E> for CmdZRem {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.members = args[2..].to_vec();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let members: Vec<&[u8]> = self.members.iter().map(|m| m.as_slice()).collect();
        Ok(Reply::Integer(zset.remove(ctx.batch, &self.key, &members)?))
    }
}

#[derive(Default)]
struct CmdZRemRangeByRank {
    key: Vec<u8>,
    start: i64,
    stop: i64,
}

impl<E: KvEngine> Commander<E> for CmdZRemRangeByRank {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.start = parse_i64(&args[2])?;
        self.stop = parse_i64(&args[3])?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let removed = zset.remove_range_by_rank(ctx.batch, &self.key, self.start, self.stop)?;
        Ok(Reply::Integer(removed))
    }
}

#[derive(Default)]
struct CmdZRemRangeByScore {
    key: Vec<u8>,
    spec: Option<RangeSpec>,
}

impl<E: KvEngine> Commander<E> for CmdZRemRangeByScore {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.spec = Some(parse_range_spec(&args[2], &args[3])?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let spec = self.spec.take().unwrap_or_default();
        let removed = zset.remove_range_by_score(ctx.batch, &self.key, &spec)?;
        Ok(Reply::Integer(removed))
    }
}

#[derive(Default)]
struct CmdZRemRangeByLex {
    key: Vec<u8>,
    spec: Option<RangeLexSpec>,
}

impl<E: KvEngine> Commander<E> for CmdZRemRangeByLex {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        self.spec = Some(parse_range_lex_spec(&args[2], &args[3])?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let spec = self.spec.take().unwrap_or_default();
        let removed = zset.remove_range_by_lex(ctx.batch, &self.key, &spec)?;
        Ok(Reply::Integer(removed))
    }
}

struct CmdZPop {
    min: bool,
    key: Vec<u8>,
    count: i64,
}

impl CmdZPop {
    fn new(min: bool) -> CmdZPop {
        CmdZPop {
            min,
            key: Vec::new(),
            count: 1,
        }
    }
}

impl<E: KvEngine> Commander<E> for CmdZPop {
    fn parse(&mut self, args: &[Vec<u8>]) -> Result<()> {
        self.key = args[1].clone();
        if let Some(count) = args.get(2) {
            self.count = parse_i64(count)?;
            if self.count < 0 {
                return Err(syntax_err("count should be greater than 0"));
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, E>) -> Result<Reply> {
        let zset = ZSetDb::new(ctx.storage, ctx.table_id);
        let popped = zset.pop(ctx.batch, &self.key, self.count, self.min)?;
        Ok(mscores_reply(popped, true))
    }
}
