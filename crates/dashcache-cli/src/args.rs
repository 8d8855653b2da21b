//! Command-line parsing.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
Usage:
  dashcache accounts [--search TERM] [--role ROLE] [--page N] [--limit N]
  dashcache events   [--search TERM] [--category NAME] [--page N] [--limit N]
  dashcache stats
  dashcache watch <accounts|events> [--every SECS]

Environment:
  DASHCACHE_API_URL   API base URL (overrides config)
  DASHCACHE_TOKEN     Bearer token (overrides config)
  RUST_LOG            Log filter, e.g. dashcache_core=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Accounts,
    Events,
}

impl Collection {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "accounts" => Ok(Collection::Accounts),
            "events" => Ok(Collection::Events),
            other => bail!("Unknown collection '{}', expected accounts or events", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    pub search: Option<String>,
    /// `--role` for accounts, `--category` for events.
    pub category: Option<String>,
    pub page: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(Collection, ListArgs),
    Stats,
    Watch {
        collection: Collection,
        every: Option<Duration>,
    },
    Help,
}

pub fn parse(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "accounts" => parse_list(Collection::Accounts, "--role", rest),
        "events" => parse_list(Collection::Events, "--category", rest),
        "stats" => {
            if let Some(extra) = rest.first() {
                bail!("Unexpected argument '{}'", extra);
            }
            Ok(Command::Stats)
        }
        "watch" => parse_watch(rest),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!("Unknown command '{}'", other),
    }
}

fn parse_list(collection: Collection, category_flag: &str, rest: &[String]) -> Result<Command> {
    let mut list = ListArgs {
        page: 1,
        ..Default::default()
    };
    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag.as_str() {
            "--search" => list.search = Some(value()?),
            "--page" => list.page = parse_number(flag, &value()?)?,
            "--limit" => list.limit = Some(parse_number(flag, &value()?)?),
            f if f == category_flag => list.category = Some(value()?),
            other => bail!("Unknown option '{}'", other),
        }
    }
    Ok(Command::List(collection, list))
}

fn parse_watch(rest: &[String]) -> Result<Command> {
    let (target, flags) = rest
        .split_first()
        .ok_or_else(|| anyhow!("watch needs a collection (accounts or events)"))?;
    let collection = Collection::parse(target)?;

    let mut every = None;
    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--every" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow!("--every needs a value"))?;
                let secs: u64 = parse_number(flag, raw)?;
                if secs == 0 {
                    bail!("--every must be at least 1 second");
                }
                every = Some(Duration::from_secs(secs));
            }
            other => bail!("Unknown option '{}'", other),
        }
    }
    Ok(Command::Watch { collection, every })
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("{} expects a number, got '{}'", flag, raw))
}
