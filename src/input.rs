//! Splitting a transaction file between workers and parsing each share.
//!
//! The input holds one transaction per line, items separated by spaces.
//! Rank `r` owns the bytes `[r * my_size, (r + 1) * my_size)` and parses
//! every line that *starts* in that range, reading past its end to finish
//! the last line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use ahash::RandomState;
use tracing::debug;

use crate::error::{FpError, Result};
use crate::item::{Item, Transaction, TransactionsList};
use crate::support::SupportMap;

/// What a worker holds before any communication.
#[derive(Debug, Clone, Default)]
pub struct LocalShard {
    pub transactions: TransactionsList,
    pub support: SupportMap,
}

impl LocalShard {
    /// Counts the support of already parsed transactions. An item counts
    /// once per transaction it appears in.
    pub fn from_transactions(transactions: TransactionsList, max_key_len: usize) -> Result<Self> {
        let mut support = SupportMap::new(max_key_len);
        for tx in transactions.iter() {
            count_transaction(&mut support, tx)?;
        }
        Ok(Self {
            transactions,
            support,
        })
    }
}

fn count_transaction(support: &mut SupportMap, tx: &Transaction) -> Result<()> {
    let mut seen: HashSet<&Item, RandomState> = HashSet::default();
    for item in tx {
        if seen.insert(item) {
            support.increment(item.clone(), 1)?;
        }
    }
    Ok(())
}

/// The byte range a rank reads and the part of it it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardWindow {
    /// First byte read. One before the owned range for ranks above 0, so a
    /// line starting exactly at the range start can be recognised.
    pub start: u64,
    /// End (exclusive) of the owned range; lines starting here or later
    /// belong to the next rank.
    pub owned_end: u64,
    /// Whether the first, possibly partial, line must be skipped.
    pub skip_first: bool,
}

impl ShardWindow {
    /// Bytes to read up front: twice the share, as in most inputs a line is
    /// much shorter than a share.
    pub fn initial_len(&self) -> u64 {
        2 * (self.owned_end - self.start).max(1)
    }
}

pub fn shard_window(file_len: u64, rank: usize, world_size: usize) -> ShardWindow {
    debug_assert!(rank < world_size);
    if file_len == 0 {
        return ShardWindow {
            start: 0,
            owned_end: 0,
            skip_first: false,
        };
    }
    let my_size = (file_len - 1) / world_size as u64 + 1;
    let owned_start = (rank as u64 * my_size).min(file_len);
    let owned_end = ((rank as u64 + 1) * my_size).min(file_len);
    ShardWindow {
        start: owned_start.saturating_sub(1),
        owned_end,
        skip_first: rank > 0,
    }
}

/// Parses the lines of `chunk` that start before `limit`. With `skip_first`,
/// everything up to and including the first newline is ignored.
///
/// `chunk` must extend to the end of the last such line, or to the end of
/// the input.
pub fn parse_transactions(
    chunk: &[u8],
    skip_first: bool,
    limit: usize,
    max_key_len: usize,
) -> Result<LocalShard> {
    let mut i = 0;
    if skip_first {
        match chunk.iter().position(|&b| b == b'\n') {
            Some(nl) => i = nl + 1,
            None => return Ok(LocalShard::from_transactions(Vec::new(), max_key_len)?),
        }
    }

    let mut transactions = Vec::new();
    while i < limit.min(chunk.len()) {
        let line_end = chunk[i..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(chunk.len(), |p| i + p);
        let tx = parse_line(&chunk[i..line_end], max_key_len)?;
        if !tx.is_empty() {
            transactions.push(tx);
        }
        i = line_end + 1;
    }
    LocalShard::from_transactions(transactions, max_key_len)
}

fn parse_line(line: &[u8], max_key_len: usize) -> Result<Transaction> {
    line.split(|b| *b == b' ' || *b == b'\r' || *b == b'\t')
        .filter(|item| !item.is_empty())
        .map(|item| {
            if item.len() > max_key_len {
                return Err(FpError::KeyTooLong {
                    len: item.len(),
                    max: max_key_len,
                });
            }
            Ok(Item::from(item))
        })
        .collect()
}

/// The share of `rank` when the whole input is in memory.
pub fn shard_from_bytes(
    data: &[u8],
    rank: usize,
    world_size: usize,
    max_key_len: usize,
) -> Result<LocalShard> {
    check_rank(rank, world_size)?;
    let w = shard_window(data.len() as u64, rank, world_size);
    let chunk = &data[w.start as usize..];
    parse_transactions(chunk, w.skip_first, (w.owned_end - w.start) as usize, max_key_len)
}

/// Reads and parses the share of `rank` from the file at `path`.
pub fn read_shard(
    path: impl AsRef<Path>,
    rank: usize,
    world_size: usize,
    max_key_len: usize,
) -> Result<LocalShard> {
    check_rank(rank, world_size)?;
    let mut file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();
    let w = shard_window(file_len, rank, world_size);
    let limit = (w.owned_end - w.start) as usize;

    file.seek(SeekFrom::Start(w.start))?;
    let mut chunk = Vec::new();
    let mut want = w.initial_len();
    loop {
        let got = (&mut file).take(want).read_to_end(&mut chunk)?;
        let at_eof = (got as u64) < want || w.start + chunk.len() as u64 >= file_len;
        if at_eof || last_line_complete(&chunk, limit) {
            break;
        }
        want = chunk.len() as u64;
    }

    debug!(
        rank,
        start = w.start,
        read = chunk.len(),
        owned = limit,
        "read transaction shard"
    );
    parse_transactions(&chunk, w.skip_first, limit, max_key_len)
}

/// True if the line running across `limit - 1` ends inside `chunk`.
fn last_line_complete(chunk: &[u8], limit: usize) -> bool {
    let from = limit.saturating_sub(1).min(chunk.len());
    chunk[from..].contains(&b'\n')
}

fn check_rank(rank: usize, world_size: usize) -> Result<()> {
    if rank >= world_size {
        return Err(FpError::RankOutOfRange { rank, world_size });
    }
    Ok(())
}
