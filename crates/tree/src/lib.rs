//! Append-only Merkle state tree for compressed accounts
//!
//! This crate provides the state commitment backing the account store:
//! - Append-only leaf vector: leaf slots are assigned once and never removed
//! - Nullification: a consumed leaf slot is overwritten with a
//!   domain-separated marker so stale inclusion proofs stop verifying
//! - Root history: a bounded window of historical roots, addressed by a
//!   monotonic root index, used to judge proof freshness

mod hasher;
mod history;
mod proof;
mod tree;

pub use hasher::Keccak256Hasher;
pub use history::RootHistory;
pub use proof::InclusionProof;
pub use tree::{StateTree, TreeError};

/// 32-byte hash type
pub type Hash = [u8; 32];

/// Default empty node hash (keccak256 of empty bytes)
pub const EMPTY_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c,
    0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b,
    0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Number of historical roots retained by default
pub const DEFAULT_ROOT_HISTORY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree() {
        let tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        assert_eq!(tree.root(), EMPTY_HASH);
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_append_and_prove() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);

        let leaf = Keccak256Hasher::hash(b"account-0");
        let index = tree.append(leaf);
        assert_eq!(index, 0);

        let proof = tree.prove(index).unwrap();
        assert!(proof.verify(&tree.root()));
    }

    #[test]
    fn test_proof_fails_after_nullify() {
        let mut tree = StateTree::new(DEFAULT_ROOT_HISTORY);
        let leaf = Keccak256Hasher::hash(b"account-0");
        let index = tree.append(leaf);
        let proof = tree.prove(index).unwrap();

        tree.nullify(index).unwrap();
        assert!(!proof.verify(&tree.root()));
    }
}
