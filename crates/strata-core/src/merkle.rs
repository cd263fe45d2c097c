//! Merkle history tree over a contiguous range of ledger indices
//!
//! A signature transaction carries the tree covering the entries it signs.
//! Leaves are entry digests, stored in index order starting at
//! `first_index`. Interior nodes are `SHA-256(left || right)`; when a level
//! has an odd number of nodes the unpaired node is promoted unchanged.

use crate::error::{CoreError, Result};
use crate::hash::Sha256Hash;
use serde::{Deserialize, Serialize};

/// Maximum number of leaves a deserialised tree may carry (2^32)
pub const MAX_TREE_LEAVES: u64 = 1 << 32;

/// Merkle tree over the entry digests of `[first_index, last_index]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTreeHistory {
    first_index: u64,
    leaves: Vec<Sha256Hash>,
}

impl MerkleTreeHistory {
    /// Create an empty tree whose first leaf will sit at `first_index`
    pub fn new(first_index: u64) -> Self {
        Self {
            first_index,
            leaves: Vec::new(),
        }
    }

    /// Build a tree from a sequence of leaves starting at `first_index`
    pub fn from_leaves(first_index: u64, leaves: Vec<Sha256Hash>) -> Self {
        Self {
            first_index,
            leaves,
        }
    }

    /// Append the digest of the next entry in sequence
    pub fn append(&mut self, leaf: Sha256Hash) {
        self.leaves.push(leaf);
    }

    /// Index covered by the first leaf
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    /// Index covered by the last leaf, `None` for an empty tree
    pub fn last_index(&self) -> Option<u64> {
        let len = self.leaves.len() as u64;
        (len > 0).then(|| self.first_index + len - 1)
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree has no leaves
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether `index` is covered by a leaf of this tree
    pub fn in_range(&self, index: u64) -> bool {
        match self.last_index() {
            Some(last) => index >= self.first_index && index <= last,
            None => false,
        }
    }

    /// Leaf digest recorded for `index`
    pub fn leaf(&self, index: u64) -> Option<Sha256Hash> {
        if !self.in_range(index) {
            return None;
        }
        let offset = usize::try_from(index - self.first_index).ok()?;
        self.leaves.get(offset).copied()
    }

    /// Recompute the root from the leaves
    ///
    /// An empty tree has the all-zero root.
    pub fn root(&self) -> Sha256Hash {
        if self.leaves.is_empty() {
            return Sha256Hash::default();
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    [left, right] => next.push(Sha256Hash::combine(left, right)),
                    [single] => next.push(*single),
                    _ => unreachable!("chunks(2) yields one or two elements"),
                }
            }
            level = next;
        }
        level[0]
    }

    /// Encode the tree for embedding in a signature transaction
    pub fn serialise(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CoreError::serialization(e.to_string()))
    }

    /// Decode and structurally validate a tree taken from a signature
    pub fn deserialise(bytes: &[u8]) -> Result<Self> {
        let tree: Self =
            bincode::deserialize(bytes).map_err(|e| CoreError::serialization(e.to_string()))?;
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> Result<()> {
        let len = self.leaves.len() as u64;
        if len == 0 {
            return Err(CoreError::InvalidTree("tree has no leaves".into()));
        }
        if len > MAX_TREE_LEAVES {
            return Err(CoreError::InvalidTree(format!(
                "tree has {len} leaves, maximum is {MAX_TREE_LEAVES}"
            )));
        }
        if self.first_index.checked_add(len - 1).is_none() {
            return Err(CoreError::InvalidTree(format!(
                "range starting at {} overflows the index space",
                self.first_index
            )));
        }
        Ok(())
    }
}
