//! Item support counting and the cross-worker support aggregation.

use std::collections::HashMap;

use ahash::RandomState;
use tracing::info;

use crate::comm::Communicator;
use crate::config::{Config, DEFAULT_MAX_KEY_LEN};
use crate::error::{FpError, Result};
use crate::item::{Item, ItemCount};
use crate::reduce::{self, Codec, Reducer};
use crate::wire::{ElementRecord, Frame};

/// Item to occurrence count.
#[derive(Debug, Clone)]
pub struct SupportMap {
    counts: HashMap<Item, u64, RandomState>,
    max_key_len: usize,
}

impl Default for SupportMap {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_LEN)
    }
}

impl PartialEq for SupportMap {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl Eq for SupportMap {}

impl SupportMap {
    pub fn new(max_key_len: usize) -> Self {
        Self {
            counts: HashMap::default(),
            max_key_len,
        }
    }

    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[inline]
    pub fn get(&self, item: &Item) -> Option<u64> {
        self.counts.get(item).copied()
    }

    /// Sets the count of `item`, returning the previous count.
    pub fn insert(&mut self, item: Item, count: u64) -> Result<Option<u64>> {
        self.check_key(&item)?;
        Ok(self.counts.insert(item, count))
    }

    /// Adds `by` to the count of `item`, inserting it with count `by` if absent.
    /// Returns the new count.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpmerge::{Item, SupportMap};
    /// let mut map = SupportMap::default();
    /// map.increment(Item::from("milk"), 1).unwrap();
    /// assert_eq!(map.increment(Item::from("milk"), 2).unwrap(), 3);
    /// ```
    pub fn increment(&mut self, item: Item, by: u64) -> Result<u64> {
        if let Some(count) = self.counts.get_mut(&item) {
            *count += by;
            return Ok(*count);
        }
        self.check_key(&item)?;
        self.counts.insert(item, by);
        Ok(by)
    }

    pub fn remove(&mut self, item: &Item) -> Option<u64> {
        self.counts.remove(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Item, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    /// Elements whose count is at least `min`.
    pub fn iter_min(&self, min: u64) -> impl Iterator<Item = (&Item, u64)> {
        self.iter().filter(move |(_, v)| *v >= min)
    }

    /// Adds every count of `other` into `self`.
    pub fn merge(&mut self, other: SupportMap) -> Result<()> {
        for (item, count) in other.counts {
            self.increment(item, count)?;
        }
        Ok(())
    }

    /// Drops the items below `min_support` and returns the rest, ordered by
    /// item so that the result does not depend on hashing.
    pub fn into_pruned(self, min_support: u64) -> Vec<ItemCount> {
        let mut items: Vec<ItemCount> = self
            .counts
            .into_iter()
            .filter(|(_, count)| *count >= min_support)
            .map(|(item, count)| ItemCount { item, count })
            .collect();
        items.sort_unstable_by(|a, b| a.item.cmp(&b.item));
        items
    }

    fn check_key(&self, item: &Item) -> Result<()> {
        if item.len() > self.max_key_len {
            return Err(FpError::KeyTooLong {
                len: item.len(),
                max: self.max_key_len,
            });
        }
        Ok(())
    }
}

/// Sums support maps across workers.
pub struct SupportReducer {
    pub max_key_len: usize,
}

impl Codec for SupportReducer {
    type Value = SupportMap;

    fn encode(&self, value: &SupportMap) -> Result<Frame> {
        let records = value
            .iter()
            .map(|(item, count)| ElementRecord::new(item, count, self.max_key_len))
            .collect::<Result<Vec<_>>>()?;
        Frame::encode_records(&records)
    }

    fn decode(&self, frame: Frame) -> Result<SupportMap> {
        let mut map = SupportMap::new(self.max_key_len);
        for record in frame.decode_records::<ElementRecord>()? {
            if let Some(ic) = record.into_item_count(self.max_key_len)? {
                map.increment(ic.item, ic.count)?;
            }
        }
        Ok(map)
    }
}

impl Reducer for SupportReducer {
    fn merge(&self, dest: &mut SupportMap, incoming: SupportMap) -> Result<()> {
        dest.merge(incoming)
    }
}

/// Wire form of the pruned, ordered support table.
pub struct ItemsCodec {
    pub max_key_len: usize,
}

impl Codec for ItemsCodec {
    type Value = Vec<ItemCount>;

    fn encode(&self, value: &Vec<ItemCount>) -> Result<Frame> {
        let records = value
            .iter()
            .map(|ic| ElementRecord::new(&ic.item, ic.count, self.max_key_len))
            .collect::<Result<Vec<_>>>()?;
        Frame::encode_records(&records)
    }

    fn decode(&self, frame: Frame) -> Result<Vec<ItemCount>> {
        frame
            .decode_records::<ElementRecord>()?
            .into_iter()
            .map(|record| {
                record.into_item_count(self.max_key_len)?.ok_or_else(|| {
                    FpError::Protocol("unused element in a support table".to_string())
                })
            })
            .collect()
    }
}

/// Combines the local support maps of all workers and returns, on every
/// worker, the same table of items whose global support reaches
/// `config.min_support`.
pub fn aggregate<C>(comm: &C, local: SupportMap, config: &Config) -> Result<Vec<ItemCount>>
where
    C: Communicator + ?Sized,
{
    let reducer = SupportReducer {
        max_key_len: config.max_key_len,
    };
    let global = reduce::reduce(comm, &reducer, local)?;
    let pruned = global.map(|map| {
        let total = map.len();
        let pruned = map.into_pruned(config.min_support);
        info!(
            total,
            kept = pruned.len(),
            min_support = config.min_support,
            "pruned global support table"
        );
        pruned
    });
    let codec = ItemsCodec {
        max_key_len: config.max_key_len,
    };
    reduce::broadcast(comm, &codec, pruned)
}
