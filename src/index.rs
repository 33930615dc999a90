//! Global item ranking: merging the per-worker sorted slices into one order
//! and the item to rank id lookup built from it.

use std::collections::HashMap;

use ahash::RandomState;

use crate::comm::Communicator;
use crate::error::{FpError, Result};
use crate::item::{Item, ItemCount};
use crate::reduce::{self, Codec, Reducer};
use crate::wire::{wire_index, Frame};

/// Merges index lists that are each sorted by ascending support of the
/// shared `items` table.
pub struct IndexReducer<'a> {
    pub items: &'a [ItemCount],
}

impl IndexReducer<'_> {
    #[inline]
    fn less(&self, a: usize, b: usize) -> bool {
        (self.items[a].count, a) < (self.items[b].count, b)
    }

    /// Two-way merge of two sorted index lists.
    pub fn merge_sorted(&self, a: &[usize], b: &[usize]) -> Vec<usize> {
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if self.less(b[j], a[i]) {
                out.push(b[j]);
                j += 1;
            } else {
                out.push(a[i]);
                i += 1;
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        out
    }
}

impl Codec for IndexReducer<'_> {
    type Value = Vec<usize>;

    fn encode(&self, value: &Vec<usize>) -> Result<Frame> {
        let records = value
            .iter()
            .map(|&i| wire_index(i))
            .collect::<Result<Vec<u32>>>()?;
        Frame::encode_records(&records)
    }

    fn decode(&self, frame: Frame) -> Result<Vec<usize>> {
        let records: Vec<u32> = frame.decode_records()?;
        records
            .into_iter()
            .map(|i| {
                let i = i as usize;
                if i < self.items.len() {
                    Ok(i)
                } else {
                    Err(FpError::Protocol(format!(
                        "item index {} out of range for {} items",
                        i,
                        self.items.len()
                    )))
                }
            })
            .collect()
    }
}

impl Reducer for IndexReducer<'_> {
    fn merge(&self, dest: &mut Vec<usize>, incoming: Vec<usize>) -> Result<()> {
        *dest = self.merge_sorted(dest, &incoming);
        Ok(())
    }
}

/// Combines every worker's sorted slice of `items` into the global order,
/// available on every worker.
pub fn merge_indices<C>(comm: &C, items: &[ItemCount], local: Vec<usize>) -> Result<Vec<usize>>
where
    C: Communicator + ?Sized,
{
    let reducer = IndexReducer { items };
    let order = reduce::all_reduce(comm, &reducer, local)?;
    if order.len() != items.len() {
        return Err(FpError::Structure(format!(
            "global order holds {} of {} items",
            order.len(),
            items.len()
        )));
    }
    Ok(order)
}

/// Item to rank id, where rank id 0 is the most supported item.
#[derive(Debug, Clone)]
pub struct IndexMap {
    ranks: HashMap<Item, u32, RandomState>,
    /// `by_rank[r]` is the item with rank id `r`.
    by_rank: Vec<ItemCount>,
}

impl IndexMap {
    /// Builds the map from a global order sorted by ascending support.
    pub fn from_order(items: &[ItemCount], order: &[usize]) -> Result<Self> {
        let mut seen = vec![false; items.len()];
        let mut by_rank = Vec::with_capacity(order.len());
        for &idx in order.iter().rev() {
            match seen.get_mut(idx) {
                Some(s) if !*s => *s = true,
                _ => {
                    return Err(FpError::Structure(format!(
                        "index {} is repeated or out of range in the global order",
                        idx
                    )))
                }
            }
            by_rank.push(items[idx].clone());
        }

        let ranks = by_rank
            .iter()
            .enumerate()
            .map(|(r, ic)| (ic.item.clone(), r as u32))
            .collect();
        Ok(Self { ranks, by_rank })
    }

    #[inline]
    pub fn rank(&self, item: &Item) -> Option<u32> {
        self.ranks.get(item).copied()
    }

    pub fn item(&self, rank: u32) -> Option<&ItemCount> {
        self.by_rank.get(rank as usize)
    }

    pub fn len(&self) -> usize {
        self.by_rank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }

    /// Items in rank order.
    pub fn ranked(&self) -> &[ItemCount] {
        &self.by_rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(counts: &[u64]) -> Vec<ItemCount> {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| ItemCount::new(format!("i{}", i).as_str(), *c))
            .collect()
    }

    #[test]
    fn merge_two_sorted_slices() {
        // values: 0->5, 1->1, 2->3, 3->6, 4->2
        let items = items(&[5, 1, 3, 6, 2]);
        let reducer = IndexReducer { items: &items };
        let merged = reducer.merge_sorted(&[1, 2, 0], &[4, 3]);
        assert_eq!(merged, vec![1, 4, 2, 0, 3]);
    }

    #[test]
    fn rank_zero_is_most_supported() {
        let items = items(&[5, 1, 3]);
        let map = IndexMap::from_order(&items, &[1, 2, 0]).unwrap();
        assert_eq!(map.rank(&Item::from("i0")), Some(0));
        assert_eq!(map.rank(&Item::from("i2")), Some(1));
        assert_eq!(map.rank(&Item::from("i1")), Some(2));
        assert_eq!(map.rank(&Item::from("nope")), None);
        assert_eq!(map.item(1).unwrap().count, 3);
        let counts: Vec<u64> = map.ranked().iter().map(|ic| ic.count).collect();
        assert_eq!(counts, vec![5, 3, 1]);
        assert_eq!(map.len(), 3);
        assert!(!map.is_empty());
        assert!(IndexMap::from_order(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn repeated_index_is_rejected() {
        let items = items(&[5, 1, 3]);
        let err = IndexMap::from_order(&items, &[1, 1, 0]).unwrap_err();
        assert!(matches!(err, FpError::Structure(_)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn encode_rejects_oversized_index() {
        let items = items(&[1]);
        let reducer = IndexReducer { items: &items };
        let err = reducer.encode(&vec![0, u32::MAX as usize + 1]).unwrap_err();
        assert!(matches!(err, FpError::Structure(_)));
    }

    #[test]
    fn decode_rejects_out_of_range() {
        let items = items(&[1, 2]);
        let reducer = IndexReducer { items: &items };
        let frame = Frame::encode_records(&[0u32, 5]).unwrap();
        assert!(matches!(reducer.decode(frame), Err(FpError::Protocol(_))));
    }
}
