//! Arena-backed FP-tree and its structural merge.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use ahash::RandomState;

use crate::comm::Communicator;
use crate::error::{FpError, Result};
use crate::reduce::{self, Codec, Reducer};
use crate::wire::{wire_index, Frame, NodeRecord};

/// Arena index of the root.
pub const ROOT: usize = 0;

/// Key of the root node, which stands for no item.
pub const TREE_NODE_NULL: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Item rank id, [TREE_NODE_NULL] for the root.
    pub key: u32,
    /// Number of transactions whose path runs through this node.
    pub value: i64,
    /// Arena index of the parent; the root is its own parent.
    pub parent: usize,
    children: HashMap<u32, usize, RandomState>,
}

impl TreeNode {
    fn new(key: u32, value: i64, parent: usize) -> Self {
        Self {
            key,
            value,
            parent,
            children: HashMap::default(),
        }
    }

    /// Arena index of the child holding `key`.
    #[inline]
    pub fn child(&self, key: u32) -> Option<usize> {
        self.children.get(&key).copied()
    }

    /// `(key, arena index)` of every child, in no particular order.
    pub fn children(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.children.iter().map(|(k, v)| (*k, *v))
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

/// A prefix tree stored in one arena; node 0 is the root.
///
/// Every node is inserted after its parent, so a parent index is always
/// smaller than its child's index.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// A tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(TREE_NODE_NULL, -1, ROOT)],
        }
    }

    /// Builds a single path hanging off the root, one node of value 1 per key.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpmerge::Tree;
    /// let tree = Tree::from_path(&[2, 5]).unwrap();
    /// assert_eq!(tree.len(), 3);
    /// assert_eq!(tree.total_mass(), 2);
    /// ```
    pub fn from_path(keys: &[u32]) -> Result<Self> {
        let mut tree = Tree::new();
        let mut parent = ROOT;
        for &key in keys {
            parent = tree.add_node(key, 1, parent)?;
        }
        Ok(tree)
    }

    /// Number of nodes, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if only the root is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    #[inline]
    pub fn node(&self, idx: usize) -> Option<&TreeNode> {
        self.nodes.get(idx)
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[ROOT]
    }

    /// Appends a node below `parent` and returns its arena index.
    pub fn add_node(&mut self, key: u32, value: i64, parent: usize) -> Result<usize> {
        let new_id = self.nodes.len();
        let parent_node = self.nodes.get_mut(parent).ok_or_else(|| {
            FpError::Structure(format!("parent {} does not exist in a tree of {}", parent, new_id))
        })?;
        if key == TREE_NODE_NULL {
            return Err(FpError::Structure("the root key cannot label a node".into()));
        }
        if parent_node.children.contains_key(&key) {
            return Err(FpError::Structure(format!(
                "node {} already has a child with key {}",
                parent, key
            )));
        }
        parent_node.children.insert(key, new_id);
        self.nodes.push(TreeNode::new(key, value, parent));
        Ok(new_id)
    }

    /// Merges `source` into `self`.
    ///
    /// Children of matching nodes with the same key are merged by adding
    /// their values; a child with no match is moved over together with its
    /// whole subtree. `source` is consumed: each of its nodes is either
    /// folded into an existing node or moved, and never visited twice.
    pub fn merge(&mut self, source: Tree) -> Result<()> {
        let mut slots: Vec<Option<TreeNode>> = source.nodes.into_iter().map(Some).collect();
        let mut pending = vec![(ROOT, ROOT)];

        while let Some((nd, ns)) = pending.pop() {
            let node = take_slot(&mut slots, ns)?;
            for (key, sc) in node.children {
                if sc == ns {
                    return Err(FpError::Structure(format!("node {} is its own child", ns)));
                }
                let existing = self.nodes[nd].child(key);
                match existing {
                    Some(dc) => {
                        let value = slots
                            .get(sc)
                            .and_then(|s| s.as_ref())
                            .map(|n| n.value)
                            .ok_or_else(|| destroyed(sc))?;
                        self.nodes[dc].value += value;
                        pending.push((dc, sc));
                    }
                    None => self.transplant(&mut slots, nd, sc)?,
                }
            }
        }
        Ok(())
    }

    /// Moves the subtree rooted at `ns` out of `slots` and below `nd`.
    fn transplant(&mut self, slots: &mut [Option<TreeNode>], nd: usize, ns: usize) -> Result<()> {
        let mut pending = vec![(nd, ns)];
        while let Some((parent, src)) = pending.pop() {
            let mut node = take_slot(slots, src)?;
            let children = std::mem::take(&mut node.children);
            let new_id = self.add_node(node.key, node.value, parent)?;
            for (_, child) in children {
                if child == src {
                    return Err(FpError::Structure(format!("node {} is its own child", src)));
                }
                pending.push((new_id, child));
            }
        }
        Ok(())
    }

    /// Flattens the tree, root excluded, into arena order. Fails if a parent
    /// index does not fit a record.
    pub fn to_wire(&self) -> Result<Vec<NodeRecord>> {
        self.nodes[1..]
            .iter()
            .map(|n| {
                Ok(NodeRecord {
                    key: n.key,
                    value: n.value,
                    parent: wire_index(n.parent)?,
                })
            })
            .collect()
    }

    /// Rebuilds a tree from [Tree::to_wire] output. Record `i` becomes
    /// arena node `i + 1`.
    pub fn from_wire(records: &[NodeRecord]) -> Result<Self> {
        let mut tree = Tree {
            nodes: Vec::with_capacity(records.len() + 1),
        };
        tree.nodes.push(TreeNode::new(TREE_NODE_NULL, -1, ROOT));
        for (i, r) in records.iter().enumerate() {
            let parent = r.parent as usize;
            if parent > i {
                return Err(FpError::Structure(format!(
                    "record {} points to later parent {}",
                    i + 1,
                    parent
                )));
            }
            tree.add_node(r.key, r.value, parent)?;
        }
        Ok(tree)
    }

    /// Every root-to-node key path with the value of its last node.
    pub fn paths(&self) -> BTreeMap<Vec<u32>, i64> {
        let mut out = BTreeMap::new();
        let mut pending = vec![(ROOT, Vec::new())];
        while let Some((idx, path)) = pending.pop() {
            for (key, child) in self.nodes[idx].children() {
                let mut p = path.clone();
                p.push(key);
                out.insert(p.clone(), self.nodes[child].value);
                pending.push((child, p));
            }
        }
        out
    }

    /// Sum of all node values, root excluded.
    pub fn total_mass(&self) -> i64 {
        self.nodes[1..].iter().map(|n| n.value).sum()
    }

    /// Checks parent links, child maps and key uniqueness.
    pub fn validate(&self) -> Result<()> {
        let root = &self.nodes[ROOT];
        if root.key != TREE_NODE_NULL || root.parent != ROOT {
            return Err(FpError::Structure("malformed root".into()));
        }
        let mut links = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx != ROOT && node.parent >= idx {
                return Err(FpError::Structure(format!(
                    "node {} has parent {} not inserted before it",
                    idx, node.parent
                )));
            }
            for (key, child) in node.children() {
                let c = self.nodes.get(child).ok_or_else(|| {
                    FpError::Structure(format!("node {} links to missing child {}", idx, child))
                })?;
                if c.parent != idx || c.key != key {
                    return Err(FpError::Structure(format!(
                        "child link {} -> {} disagrees with the child",
                        idx, child
                    )));
                }
                links += 1;
            }
        }
        if links + 1 != self.nodes.len() {
            return Err(FpError::Structure(format!(
                "{} child links for {} nodes",
                links,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

fn take_slot(slots: &mut [Option<TreeNode>], idx: usize) -> Result<TreeNode> {
    slots
        .get_mut(idx)
        .and_then(Option::take)
        .ok_or_else(|| destroyed(idx))
}

fn destroyed(idx: usize) -> FpError {
    FpError::Structure(format!("source node {} is missing or was already consumed", idx))
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, node) in self.nodes.iter().enumerate() {
            let mut children: Vec<_> = node.children().collect();
            children.sort_unstable();
            let key = if node.key == TREE_NODE_NULL {
                -1
            } else {
                i64::from(node.key)
            };
            write!(f, "Node {} ({}: {}) ->", idx, key, node.value)?;
            for (key, child) in children {
                write!(f, " {}@{}", key, child)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Merges FP-trees across workers.
pub struct TreeReducer;

impl Codec for TreeReducer {
    type Value = Tree;

    fn encode(&self, value: &Tree) -> Result<Frame> {
        Frame::encode_records(&value.to_wire()?)
    }

    fn decode(&self, frame: Frame) -> Result<Tree> {
        Tree::from_wire(&frame.decode_records::<NodeRecord>()?)
    }
}

impl Reducer for TreeReducer {
    fn merge(&self, dest: &mut Tree, incoming: Tree) -> Result<()> {
        dest.merge(incoming)
    }
}

/// Merges the local FP-trees of all workers; every worker gets the result.
pub fn reduce_tree<C>(comm: &C, local: Tree) -> Result<Tree>
where
    C: Communicator + ?Sized,
{
    reduce::all_reduce(comm, &TreeReducer, local)
}
