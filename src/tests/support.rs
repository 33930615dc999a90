use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};

use crate::comm::{Communicator, LocalCluster};
use crate::config::{Config, DEFAULT_MAX_KEY_LEN};
use crate::error::FpError;
use crate::item::{Item, ItemCount};
use crate::support::{self, SupportMap};

fn map_of(entries: &[(&str, u64)]) -> SupportMap {
    let mut map = SupportMap::default();
    for (item, count) in entries {
        map.insert(Item::from(*item), *count).unwrap();
    }
    map
}

#[test]
fn merge_adds_counts() {
    let mut a = map_of(&[("a", 3), ("b", 2)]);
    a.merge(map_of(&[("a", 1), ("c", 4)])).unwrap();
    assert_eq!(a, map_of(&[("a", 4), ("b", 2), ("c", 4)]));

    let mut b = map_of(&[("a", 1), ("c", 4)]);
    b.merge(map_of(&[("a", 3), ("b", 2)])).unwrap();
    assert_eq!(a, b);
}

#[test]
fn over_long_key_is_rejected() {
    let mut map = SupportMap::new(4);
    map.increment(Item::from("four"), 1).unwrap();
    let err = map.increment(Item::from("fiver"), 1).unwrap_err();
    assert!(matches!(err, FpError::KeyTooLong { len: 5, max: 4 }));
    assert!(map.insert(Item::from("fiver"), 1).is_err());
    assert_eq!(map.len(), 1);
}

#[test]
fn remove_drops_an_item() {
    let mut map = map_of(&[("a", 3), ("b", 2)]);
    assert_eq!(map.remove(&Item::from("a")), Some(3));
    assert_eq!(map.remove(&Item::from("a")), None);
    assert_eq!(map, map_of(&[("b", 2)]));
    assert_eq!(map.remove(&Item::from("b")), Some(2));
    assert!(map.is_empty());
}

#[test]
fn pruning_keeps_min_support() {
    let map = map_of(&[("z", 5), ("b", 1), ("m", 2), ("a", 2)]);
    assert_eq!(map.iter_min(2).count(), 3);
    let pruned = map.into_pruned(2);
    assert_eq!(
        pruned,
        vec![
            ItemCount::new("a", 2),
            ItemCount::new("m", 2),
            ItemCount::new("z", 5)
        ]
    );
}

#[test]
fn aggregate_across_workers() {
    for world_size in [1, 2, 3, 5, 8] {
        let config = Config::default()
            .with_world_size(world_size)
            .with_min_support(world_size as u64 + 1);

        // rank r sees "common" once, "rank{r}" once and "pair" r times
        let outputs = LocalCluster::run(world_size, |comm| {
            let r = comm.rank();
            let mut local = SupportMap::new(DEFAULT_MAX_KEY_LEN);
            local.increment(Item::from("common"), 2)?;
            local.increment(Item::from(format!("rank{}", r).as_str()), 1)?;
            if r > 0 {
                local.increment(Item::from("pair"), r as u64)?;
            }
            support::aggregate(&comm, local, &config)
        })
        .unwrap();

        let pair: u64 = (0..world_size as u64).sum();
        let mut expected = vec![ItemCount::new("common", 2 * world_size as u64)];
        if pair > world_size as u64 {
            expected.push(ItemCount::new("pair", pair));
        }
        for out in outputs.iter() {
            assert_eq!(out, &expected, "world_size {}", world_size);
        }
    }
}

#[test]
fn aggregate_matches_sequential_sum() {
    let world_size = 5;
    let config = Config::default()
        .with_world_size(world_size)
        .with_min_support(10);

    let mut r = StdRng::seed_from_u64(42);
    let locals: Vec<SupportMap> = (0..world_size)
        .map(|_| {
            let mut m = SupportMap::default();
            for _ in 0..200 {
                let item = format!("i{}", r.gen_range(0..50));
                m.increment(Item::from(item.as_str()), 1).unwrap();
            }
            m
        })
        .collect();

    let mut total = SupportMap::default();
    for m in locals.iter() {
        total.merge(m.clone()).unwrap();
    }
    let expected = total.into_pruned(10);

    let outputs = LocalCluster::run(world_size, |comm| {
        support::aggregate(&comm, locals[comm.rank()].clone(), &config)
    })
    .unwrap();
    for out in outputs {
        assert_eq!(out, expected);
    }
}
