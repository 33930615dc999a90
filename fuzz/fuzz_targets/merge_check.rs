#![no_main]
use arbitrary::Arbitrary;
use fpmerge::Tree;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

#[derive(Arbitrary, Debug)]
enum TreeOp {
    /// Merge a single path into tree `slot`.
    Path { slot: bool, keys: Vec<u8> },
    /// Merge the second tree into the first and start a new second tree.
    Fold,
    /// Send the first tree through its wire form.
    Wire,
}

fn path_of(keys: &[u8]) -> Vec<u32> {
    let mut p: Vec<u32> = keys.iter().map(|k| u32::from(*k % 16)).collect();
    p.sort_unstable();
    p.dedup();
    p
}

fn add_prefixes(oracle: &mut BTreeMap<Vec<u32>, i64>, path: &[u32]) {
    for l in 1..=path.len() {
        *oracle.entry(path[..l].to_vec()).or_insert(0) += 1;
    }
}

fuzz_target!(|ops: Vec<TreeOp>| {
    let mut trees = [Tree::new(), Tree::new()];
    let mut oracles = [BTreeMap::new(), BTreeMap::new()];

    for op in ops.iter() {
        match op {
            TreeOp::Path { slot, keys } => {
                let s = *slot as usize;
                let path = path_of(keys);
                trees[s].merge(Tree::from_path(&path).unwrap()).unwrap();
                add_prefixes(&mut oracles[s], &path);
            }
            TreeOp::Fold => {
                let second = std::mem::take(&mut trees[1]);
                trees[0].merge(second).unwrap();
                for (p, v) in std::mem::take(&mut oracles[1]) {
                    *oracles[0].entry(p).or_insert(0) += v;
                }
            }
            TreeOp::Wire => {
                trees[0] = Tree::from_wire(&trees[0].to_wire().unwrap()).unwrap();
            }
        }
    }

    for (tree, oracle) in trees.iter().zip(oracles.iter()) {
        tree.validate().unwrap();
        assert_eq!(&tree.paths(), oracle);
    }
});
