//! Local FP-tree construction.
//!
//! Each transaction becomes a single path of rank ids; the paths are then
//! merged pairwise, level by level, the same way workers are combined: at
//! level `pow` tree `i` is merged into tree `i - pow/2`.

use tracing::debug;

use crate::error::{FpError, Result};
use crate::index::IndexMap;
use crate::item::Transaction;
use crate::sort;
use crate::tree::Tree;
use crate::utils::share;

/// Builds the path of one transaction: its ranked items in ascending rank
/// id, unranked items dropped, each node with value 1.
pub fn build_transaction_tree(transaction: &Transaction, index: &IndexMap) -> Result<Tree> {
    let ranks: Vec<u32> = transaction
        .iter()
        .filter_map(|item| index.rank(item))
        .collect();
    let sorted = sort::sort_by_key(&ranks, 0..ranks.len(), 1, |r| *r)?;

    let mut path: Vec<u32> = sorted.into_iter().map(|i| ranks[i]).collect();
    path.dedup();
    Tree::from_path(&path)
}

/// Builds the FP-tree of all `transactions` using up to `num_threads` threads.
pub fn build_local_tree(
    transactions: &[Transaction],
    index: &IndexMap,
    num_threads: usize,
) -> Result<Tree> {
    if num_threads == 0 {
        return Err(FpError::Config("num_threads must be at least 1".into()));
    }
    let n = transactions.len();
    if n == 0 {
        return Ok(Tree::new());
    }

    let mut trees: Vec<Option<Tree>> = parallel_map(transactions.iter().collect(), num_threads, |tx| {
        build_transaction_tree(tx, index).map(Some)
    })?;

    let mut pow = 2;
    while pow < 2 * n {
        let half = pow / 2;
        let pairs: Vec<&mut [Option<Tree>]> = trees.chunks_mut(pow).filter(|c| c.len() > half).collect();
        let merged = pairs.len();
        parallel_map(pairs, num_threads, |pair| merge_pair(pair, half))?;
        debug!(pow, merged, "merged transaction trees");
        pow *= 2;
    }

    trees
        .first_mut()
        .and_then(Option::take)
        .ok_or_else(|| FpError::Structure("no tree left after combining transactions".into()))
}

/// Merges `pair[half]` into `pair[0]`.
fn merge_pair(pair: &mut [Option<Tree>], half: usize) -> Result<()> {
    let source = pair[half]
        .take()
        .ok_or_else(|| FpError::Structure("transaction tree merged twice".into()))?;
    let dest = pair[0]
        .as_mut()
        .ok_or_else(|| FpError::Structure("transaction tree missing at merge".into()))?;
    dest.merge(source)
}

/// Applies `f` to every job on a fixed set of threads, keeping job order.
fn parallel_map<T, R, F>(jobs: Vec<T>, num_threads: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Sync,
{
    let threads = num_threads.min(jobs.len()).max(1);
    if threads == 1 {
        return jobs.into_iter().map(f).collect();
    }

    let total = jobs.len();
    let mut groups: Vec<Vec<T>> = Vec::with_capacity(threads);
    let mut jobs = jobs.into_iter();
    for t in 0..threads {
        groups.push(jobs.by_ref().take(share(total, t, threads).len()).collect());
    }

    let f = &f;
    let results: Vec<Result<Vec<R>>> = std::thread::scope(|s| {
        let handles: Vec<_> = groups
            .into_iter()
            .map(|group| s.spawn(move || group.into_iter().map(f).collect::<Result<Vec<R>>>()))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(FpError::Structure("tree builder thread panicked".into())))
            })
            .collect()
    });

    let mut out = Vec::with_capacity(total);
    for r in results {
        out.extend(r?);
    }
    Ok(out)
}
