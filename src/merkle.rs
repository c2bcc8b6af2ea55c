//! Merkle tree over the audit log's event hashes.
//!
//! The tree is rebuilt on demand from the ordered leaf hashes; no
//! incremental state is kept. Levels pair adjacent nodes with the ASCII-hex
//! node hash; an odd level duplicates its last node before combining. An
//! inclusion proof lists the sibling hash at each level together with the
//! side the SIBLING sits on, so verification is a straight fold from leaf
//! to root.

use serde::{Deserialize, Serialize};

use crate::crypto::node_hash;
use crate::error::{LedgerError, Result};

/// Which side of the combination the sibling occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

/// One step of an inclusion proof, leaf-side first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling_hash: String,
    pub position: Position,
}

/// Binary hash tree over an ordered list of hex digests.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All levels bottom-up; level 0 is the leaves, the last level holds
    /// the root. Empty when there are no leaves.
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build the tree. Zero leaves produce an empty tree; a single leaf is
    /// its own root.
    pub fn from_leaves(leaves: Vec<String>) -> Self {
        if leaves.is_empty() {
            return MerkleTree { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                if pair.len() == 2 {
                    next.push(node_hash(&pair[0], &pair[1]));
                } else {
                    // Odd level: the last node pairs with itself.
                    next.push(node_hash(&pair[0], &pair[0]));
                }
            }
            levels.push(next);
        }
        MerkleTree { levels }
    }

    pub fn root(&self) -> Option<&str> {
        self.levels.last().map(|level| level[0].as_str())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Inclusion proof for the leaf at `index`, ordered leaf to root.
    ///
    /// A one-leaf tree yields an empty proof: the leaf IS the root.
    pub fn prove(&self, index: usize) -> Result<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return Err(LedgerError::NotFound(format!(
                "no leaf at index {index} (tree has {} leaves)",
                self.leaf_count()
            )));
        }

        let mut proof = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, side) = if position % 2 == 0 {
                (position + 1, Position::Right)
            } else {
                (position - 1, Position::Left)
            };
            // Past the end of an odd level the sibling is the node itself.
            let sibling = level.get(sibling_index).unwrap_or(&level[position]);
            proof.push(ProofStep {
                sibling_hash: sibling.clone(),
                position: side,
            });
            position /= 2;
        }
        Ok(proof)
    }

    /// Fold a proof from `leaf_hash` and compare against `root`.
    pub fn verify(leaf_hash: &str, proof: &[ProofStep], root: &str) -> bool {
        let mut current = leaf_hash.to_string();
        for step in proof {
            current = match step.position {
                Position::Left => node_hash(&step.sibling_hash, &current),
                Position::Right => node_hash(&current, &step.sibling_hash),
            };
        }
        current == root
    }
}
