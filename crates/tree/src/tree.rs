//! Append-only Merkle tree over account leaf hashes

use thiserror::Error;

use crate::{
    hasher::Keccak256Hasher, history::RootHistory, proof::InclusionProof, Hash, EMPTY_HASH,
};

/// Tree-level errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("leaf index {index} out of range (tree holds {len} leaves)")]
    LeafOutOfRange { index: u64, len: u64 },
    #[error("leaf {index} is already nullified")]
    AlreadyNullified { index: u64 },
}

/// Append-only Merkle tree.
///
/// Leaf slots are assigned in append order and never removed. Consuming a
/// leaf overwrites its slot with a nullified marker, so the root advances
/// and any proof minted against the old slot content stops verifying.
#[derive(Clone, Debug)]
pub struct StateTree {
    /// Current slot hashes; nullified slots hold marker hashes
    leaves: Vec<Hash>,
    /// Parallel nullification flags
    nullified: Vec<bool>,
    /// Current root
    root: Hash,
    /// Monotonic sequence counter, bumped on every mutation.
    /// Doubles as the root index of the current root.
    seq: u64,
    /// Retained historical roots
    history: RootHistory,
}

impl StateTree {
    /// Create an empty tree retaining `root_window` historical roots
    pub fn new(root_window: usize) -> Self {
        let mut history = RootHistory::new(root_window);
        // The empty root is valid under index 0 so proofs against a
        // fresh tree have something to reference.
        history.record(0, EMPTY_HASH);

        Self {
            leaves: Vec::new(),
            nullified: Vec::new(),
            root: EMPTY_HASH,
            seq: 0,
            history,
        }
    }

    /// Current root hash
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Root index of the current root
    pub fn root_index(&self) -> u64 {
        self.seq
    }

    /// Historical root window
    pub fn history(&self) -> &RootHistory {
        &self.history
    }

    /// Number of leaf slots ever appended
    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Whether a leaf slot has been nullified
    pub fn is_nullified(&self, index: u64) -> bool {
        self.nullified.get(index as usize).copied().unwrap_or(false)
    }

    /// Append a new leaf, returning its index
    pub fn append(&mut self, leaf: Hash) -> u64 {
        let index = self.leaves.len() as u64;
        self.leaves.push(leaf);
        self.nullified.push(false);
        self.advance();
        index
    }

    /// Overwrite a leaf slot with its nullified marker
    pub fn nullify(&mut self, index: u64) -> Result<(), TreeError> {
        let len = self.leaves.len() as u64;
        if index >= len {
            return Err(TreeError::LeafOutOfRange { index, len });
        }
        let slot = index as usize;
        if self.nullified[slot] {
            return Err(TreeError::AlreadyNullified { index });
        }

        self.leaves[slot] = Keccak256Hasher::nullified_marker(&self.leaves[slot]);
        self.nullified[slot] = true;
        self.advance();
        Ok(())
    }

    /// Generate an inclusion proof for a leaf slot against the current root
    pub fn prove(&self, index: u64) -> Result<InclusionProof, TreeError> {
        let len = self.leaves.len() as u64;
        if index >= len {
            return Err(TreeError::LeafOutOfRange { index, len });
        }

        let mut siblings = Vec::new();
        let mut level = self.padded_level();
        let mut position = index as usize;

        while level.len() > 1 {
            let sibling_pos = position ^ 1;
            siblings.push(level[sibling_pos]);
            level = Self::fold(&level);
            position >>= 1;
        }

        Ok(InclusionProof {
            leaf_index: index,
            leaf_hash: self.leaves[index as usize],
            siblings,
        })
    }

    /// Bump the sequence counter and recompute + record the root
    fn advance(&mut self) {
        self.seq += 1;
        self.root = self.compute_root();
        self.history.record(self.seq, self.root);
    }

    fn compute_root(&self) -> Hash {
        if self.leaves.is_empty() {
            return EMPTY_HASH;
        }

        let mut level = self.padded_level();
        while level.len() > 1 {
            level = Self::fold(&level);
        }
        level[0]
    }

    /// Leaf level padded with empty hashes to the next power of two
    fn padded_level(&self) -> Vec<Hash> {
        let mut level = self.leaves.clone();
        let width = self.leaves.len().next_power_of_two().max(2);
        level.resize(width, EMPTY_HASH);
        level
    }

    fn fold(level: &[Hash]) -> Vec<Hash> {
        level
            .chunks(2)
            .map(|pair| Keccak256Hasher::hash_pair(&pair[0], &pair[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_ROOT_HISTORY;

    fn leaf(n: u8) -> Hash {
        Keccak256Hasher::hash(&[n])
    }

    #[test]
    fn test_root_advances_on_every_mutation() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);

        let r0 = tree.root();
        let idx = tree.append(leaf(1));
        let r1 = tree.root();
        assert_ne!(r0, r1);
        assert_eq!(tree.root_index(), 1);

        tree.nullify(idx).unwrap();
        assert_ne!(tree.root(), r1);
        assert_eq!(tree.root_index(), 2);
    }

    #[test]
    fn test_proofs_for_all_leaves() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        for n in 0..5 {
            tree.append(leaf(n));
        }

        let root = tree.root();
        for index in 0..5 {
            let proof = tree.prove(index).unwrap();
            assert!(proof.verify(&root), "leaf {index} failed to verify");
        }
    }

    #[test]
    fn test_nullify_twice_rejected() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        let idx = tree.append(leaf(7));

        tree.nullify(idx).unwrap();
        assert_eq!(
            tree.nullify(idx),
            Err(TreeError::AlreadyNullified { index: idx }),
        );
    }

    #[test]
    fn test_out_of_range() {
        let tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        assert!(matches!(
            tree.prove(3),
            Err(TreeError::LeafOutOfRange { index: 3, len: 0 }),
        ));
    }

    #[test]
    fn test_history_tracks_roots() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        tree.append(leaf(1));
        tree.append(leaf(2));

        assert!(tree.history().contains(0));
        assert!(tree.history().contains(1));
        assert_eq!(tree.history().get(2), Some(tree.root()));
    }
}
