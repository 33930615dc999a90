//! One worker's full run, from its local shard to the global FP-tree.

use std::time::Instant;

use tracing::{info, info_span};

use crate::builder;
use crate::comm::Communicator;
use crate::config::Config;
use crate::error::{FpError, Result};
use crate::index::{self, IndexMap};
use crate::input::LocalShard;
use crate::item::ItemCount;
use crate::sort;
use crate::support;
use crate::tree::{self, Tree};
use crate::utils::share;

/// The state every worker holds at the end of a run. It is identical on
/// all workers.
#[derive(Debug, Clone)]
pub struct FpOutput {
    /// Frequent items with their global support, in broadcast order.
    pub items: Vec<ItemCount>,
    /// Positions into `items`, by ascending support.
    pub order: Vec<usize>,
    pub index: IndexMap,
    pub tree: Tree,
}

/// Runs every stage for the worker behind `comm`.
///
/// Any error leaves the run without a valid result; in a group the peers
/// notice the missing worker and fail as well.
pub fn run_worker<C>(comm: &C, config: &Config, shard: LocalShard) -> Result<FpOutput>
where
    C: Communicator + ?Sized,
{
    config.validate()?;
    if comm.world_size() != config.world_size {
        return Err(FpError::Config(format!(
            "communicator has {} ranks, configuration expects {}",
            comm.world_size(),
            config.world_size
        )));
    }
    let rank = comm.rank();
    let _span = info_span!("worker", rank).entered();
    let LocalShard {
        transactions,
        support,
    } = shard;

    let start = Instant::now();
    let local_items = support.len();
    let items = support::aggregate(comm, support, config)?;
    info!(
        local_items,
        global_items = items.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "support aggregated"
    );

    let start = Instant::now();
    let slice = share(items.len(), rank, comm.world_size());
    let local_order = sort::sort_counts(&items, slice.clone(), config.num_threads)?;
    let order = index::merge_indices(comm, &items, local_order)?;
    let index = IndexMap::from_order(&items, &order)?;
    info!(
        slice_start = slice.start,
        slice_end = slice.end,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "items ranked"
    );

    let start = Instant::now();
    let local_tree = builder::build_local_tree(&transactions, &index, config.num_threads)?;
    drop(transactions);
    info!(
        nodes = local_tree.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "local tree built"
    );

    let start = Instant::now();
    let tree = tree::reduce_tree(comm, local_tree)?;
    info!(
        nodes = tree.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "global tree reduced"
    );

    Ok(FpOutput {
        items,
        order,
        index,
        tree,
    })
}
