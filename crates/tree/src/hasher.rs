//! Keccak256 hasher with domain-separated node types

use tiny_keccak::{Hasher, Keccak};

use crate::Hash;

/// Keccak256 hasher
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash arbitrary bytes
    pub fn hash(data: &[u8]) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash two child hashes into an interior node
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(&[0x01]); // Interior node prefix
        hasher.update(left);
        hasher.update(right);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash an (address, payload hash) pair into a leaf
    pub fn hash_leaf(address: &Hash, payload: &Hash) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(&[0x00]); // Leaf prefix
        hasher.update(address);
        hasher.update(payload);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Marker hash written over a nullified leaf slot
    ///
    /// Derived from the consumed leaf so distinct nullified slots stay
    /// distinguishable in the tree.
    pub fn nullified_marker(leaf: &Hash) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(&[0x02]); // Nullifier prefix
        hasher.update(leaf);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        let hash = Keccak256Hasher::hash_pair(&left, &right);
        assert_ne!(hash, [0u8; 32]);
        assert_ne!(hash, Keccak256Hasher::hash_pair(&right, &left));
    }

    #[test]
    fn test_domain_separation() {
        let a = [3u8; 32];
        let b = [4u8; 32];
        assert_ne!(
            Keccak256Hasher::hash_leaf(&a, &b),
            Keccak256Hasher::hash_pair(&a, &b),
        );
        assert_ne!(Keccak256Hasher::nullified_marker(&a), a);
    }
}
