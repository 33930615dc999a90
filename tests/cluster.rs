use std::collections::{BTreeMap, BTreeSet, HashMap};

use fpmerge::{input, run_worker, Communicator, Config, FpError, FpOutput, LocalCluster};
use rand::{
    prelude::{SliceRandom, StdRng},
    Rng, SeedableRng,
};

/// Lines of random items with a skewed distribution, so that supports vary
/// and many items share a count.
fn random_dataset(r: &mut StdRng, lines: usize, n_items: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..lines {
        let len = r.gen_range(0..8);
        let mut words = Vec::with_capacity(len);
        for _ in 0..len {
            let a = r.gen_range(0..n_items);
            let b = r.gen_range(0..n_items);
            words.push(format!("item{}", a.min(b)));
        }
        words.shuffle(r);
        out.extend_from_slice(words.join(" ").as_bytes());
        out.push(b'\n');
    }
    out
}

fn run_cluster(data: &[u8], world_size: usize, num_threads: usize, min_support: u64) -> Vec<FpOutput> {
    let config = Config::default()
        .with_world_size(world_size)
        .with_num_threads(num_threads)
        .with_min_support(min_support);
    LocalCluster::run(world_size, |comm| {
        let shard =
            input::shard_from_bytes(data, comm.rank(), world_size, config.max_key_len)?;
        run_worker(&comm, &config, shard)
    })
    .unwrap()
}

/// Path counts computed directly from the whole input.
fn oracle(data: &[u8], min_support: u64) -> (BTreeMap<Vec<u32>, i64>, u64) {
    let transactions: Vec<BTreeSet<&[u8]>> = data
        .split(|b| *b == b'\n')
        .map(|l| l.split(|b| *b == b' ').filter(|w| !w.is_empty()).collect())
        .filter(|t: &BTreeSet<&[u8]>| !t.is_empty())
        .collect();

    let mut support: BTreeMap<&[u8], u64> = BTreeMap::new();
    for t in transactions.iter() {
        for item in t {
            *support.entry(*item).or_insert(0) += 1;
        }
    }
    let frequent: Vec<(&[u8], u64)> = support
        .into_iter()
        .filter(|(_, c)| *c >= min_support)
        .collect();

    // ascending by (support, position), most supported item gets rank 0
    let mut order: Vec<usize> = (0..frequent.len()).collect();
    order.sort_by_key(|i| (frequent[*i].1, *i));
    let ranks: HashMap<&[u8], u32> = order
        .iter()
        .rev()
        .enumerate()
        .map(|(rank, idx)| (frequent[*idx].0, rank as u32))
        .collect();
    let mass = frequent.iter().map(|(_, c)| *c).sum();

    let mut paths = BTreeMap::new();
    for t in transactions.iter() {
        let mut path: Vec<u32> = t.iter().filter_map(|i| ranks.get(i).copied()).collect();
        path.sort_unstable();
        for l in 1..=path.len() {
            *paths.entry(path[..l].to_vec()).or_insert(0) += 1;
        }
    }
    (paths, mass)
}

#[test]
fn small_basket() {
    let data = b"bread milk\nbread beer eggs\nmilk beer\nbread milk beer\n";
    let outputs = run_cluster(data, 3, 2, 2);

    let out = &outputs[0];
    let names: Vec<String> = out.items.iter().map(|ic| ic.item.to_string()).collect();
    assert_eq!(names, vec!["beer", "bread", "milk"]);
    assert!(out.items.iter().all(|ic| ic.count == 3));
    // equal supports: the last item in table order is ranked first
    assert_eq!(out.order, vec![0, 1, 2]);
    assert_eq!(out.index.item(0).unwrap().item.to_string(), "milk");
    assert_eq!(out.tree.total_mass(), 9);

    let (paths, mass) = oracle(data, 2);
    assert_eq!(mass, 9);
    for o in outputs.iter() {
        assert_eq!(o.tree.paths(), paths);
    }
}

#[test]
fn all_group_shapes_agree() {
    let mut r = StdRng::seed_from_u64(42);
    let data = random_dataset(&mut r, 3_000, 60);
    let min_support = 40;
    let (expected, mass) = oracle(&data, min_support);

    let reference = run_cluster(&data, 1, 1, min_support).remove(0);
    assert_eq!(reference.tree.paths(), expected);
    assert_eq!(reference.tree.total_mass() as u64, mass);

    for world_size in [1, 2, 3, 5, 8] {
        for num_threads in [1, 2, 4] {
            let outputs = run_cluster(&data, world_size, num_threads, min_support);
            assert_eq!(outputs.len(), world_size);
            for o in outputs.iter() {
                assert_eq!(o.items, reference.items);
                assert_eq!(o.order, reference.order);
                assert_eq!(o.tree.paths(), expected, "world {} threads {}", world_size, num_threads);
                o.tree.validate().unwrap();
            }
        }
    }
}

#[test]
fn more_workers_than_lines() {
    let data = b"a b\nb c\n";
    let (expected, _) = oracle(data, 1);
    for o in run_cluster(data, 8, 2, 1) {
        assert_eq!(o.tree.paths(), expected);
        assert_eq!(o.items.len(), 3);
    }
}

#[test]
fn nothing_frequent() {
    let data = b"a\nb\nc\n";
    for o in run_cluster(data, 3, 1, 2) {
        assert!(o.items.is_empty());
        assert!(o.tree.is_empty());
    }
}

#[test]
fn read_shards_from_file() {
    let mut r = StdRng::seed_from_u64(7);
    let data = random_dataset(&mut r, 500, 20);
    let path = std::env::temp_dir().join(format!("fpmerge-cluster-{}.txt", std::process::id()));
    std::fs::write(&path, &data).unwrap();

    let config = Config::default().with_world_size(4).with_num_threads(2).with_min_support(5);
    let outputs = LocalCluster::run(4, |comm| {
        let shard = input::read_shard(&path, comm.rank(), 4, config.max_key_len)?;
        run_worker(&comm, &config, shard)
    });
    std::fs::remove_file(&path).unwrap();

    let (expected, _) = oracle(&data, 5);
    for o in outputs.unwrap() {
        assert_eq!(o.tree.paths(), expected);
    }
}

#[test]
fn over_long_item_aborts_the_run() {
    let data = b"a b\nb c\nthis-item-is-long a\nc\n";
    let config = Config::default().with_world_size(4).with_max_key_len(8);
    let err = LocalCluster::run(4, |comm| {
        let shard = input::shard_from_bytes(data, comm.rank(), 4, config.max_key_len)?;
        run_worker(&comm, &config, shard)
    })
    .unwrap_err();
    assert!(matches!(err, FpError::KeyTooLong { len: 17, max: 8 }));
}

#[test]
fn mismatched_group_size_is_rejected() {
    let config = Config::default().with_world_size(3);
    let err = LocalCluster::run(2, |comm| {
        let shard = input::shard_from_bytes(b"a\n", comm.rank(), 2, config.max_key_len)?;
        run_worker(&comm, &config, shard)
    })
    .unwrap_err();
    assert!(matches!(err, FpError::Config(_)));
}
