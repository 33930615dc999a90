#![doc = include_str!("../README.md")]
#![allow(clippy::len_without_is_empty)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod utils;

pub mod builder;
pub mod comm;
pub mod config;
pub mod index;
pub mod input;
pub mod item;
pub mod pipeline;
pub mod reduce;
pub mod sort;
pub mod support;
pub mod tree;
pub mod wire;

#[cfg(feature = "stats")]
#[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
pub mod stats;

#[cfg(test)]
mod tests;

pub use comm::{Communicator, LocalCluster, LocalComm};
pub use config::Config;
pub use error::{FpError, Result};
pub use index::IndexMap;
pub use input::LocalShard;
pub use item::{Item, ItemCount, Transaction, TransactionsList};
pub use pipeline::{run_worker, FpOutput};
pub use reduce::{all_reduce, broadcast, reduce, Codec, Reducer};
pub use support::SupportMap;
pub use tree::{Tree, TreeNode};
