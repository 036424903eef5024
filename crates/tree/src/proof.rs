//! Merkle inclusion proofs

use serde::{Deserialize, Serialize};

use crate::{hasher::Keccak256Hasher, Hash};

/// Inclusion proof for one leaf slot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the leaf in the append order
    pub leaf_index: u64,
    /// The leaf hash being proven
    pub leaf_hash: Hash,
    /// Sibling hashes from the leaf level up to the root
    pub siblings: Vec<Hash>,
}

impl InclusionProof {
    /// Verify this proof against a root hash
    pub fn verify(&self, root: &Hash) -> bool {
        self.compute_root() == *root
    }

    /// Fold the siblings up to a root, steering left/right by the bits of
    /// the leaf index
    pub fn compute_root(&self) -> Hash {
        let mut current = self.leaf_hash;
        let mut position = self.leaf_index;

        for sibling in &self.siblings {
            current = if position & 1 == 1 {
                Keccak256Hasher::hash_pair(sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, sibling)
            };
            position >>= 1;
        }

        current
    }
}
