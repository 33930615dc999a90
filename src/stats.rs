use std::fmt::Display;

use crate::tree::{Tree, ROOT};

#[derive(Default, Debug, serde::Serialize)]
pub struct TreeStats(Vec<LevelStats>);

impl TreeStats {
    pub fn levels(&self) -> &[LevelStats] {
        &self.0
    }
}

impl Display for TreeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut total_nodes = 0;
        let mut total_leaves = 0;

        for l in self.0.iter() {
            total_nodes += l.nodes;
            total_leaves += l.leaves;

            let avg_value = if l.nodes == 0 {
                0.0
            } else {
                l.mass as f64 / l.nodes as f64
            };
            writeln!(
                f,
                "Depth: {:3} --- || nodes: {:8} || leaves: {:8} || mass: {:10} || avg value: {:8.2} ||",
                l.depth, l.nodes, l.leaves, l.mass, avg_value,
            )?;
        }

        let sharing = if total_nodes == 0 {
            0.0
        } else {
            total_leaves as f64 / total_nodes as f64
        };
        writeln!(
            f,
            "Nodes: {}, leaves: {} ({:.2} of all nodes)",
            total_nodes, total_leaves, sharing
        )?;

        Ok(())
    }
}

#[derive(Debug, serde::Serialize, Clone, PartialEq, Eq)]
pub struct LevelStats {
    pub depth: usize,
    pub nodes: usize,
    pub leaves: usize,
    /// Sum of node values at this depth.
    pub mass: i64,
}

impl LevelStats {
    fn new_level(depth: usize) -> Self {
        Self {
            depth,
            nodes: 0,
            leaves: 0,
            mass: 0,
        }
    }
}

impl Tree {
    /// Returns per-depth node statistics, the root excluded.
    pub fn stats(&self) -> TreeStats {
        let mut tree_stats = TreeStats::default();

        let mut sub_nodes = vec![(0usize, ROOT)];

        while let Some((depth, idx)) = sub_nodes.pop() {
            let node = match self.node(idx) {
                Some(n) => n,
                None => continue,
            };

            if idx != ROOT {
                let level = depth - 1;
                if tree_stats.0.len() <= level {
                    tree_stats.0.push(LevelStats::new_level(depth));
                }
                tree_stats.0[level].nodes += 1;
                tree_stats.0[level].mass += node.value;
                if node.num_children() == 0 {
                    tree_stats.0[level].leaves += 1;
                }
            }

            for (_k, child) in node.children() {
                sub_nodes.push((depth + 1, child));
            }
        }
        tree_stats
    }
}
