//! Common types

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};
use zkcas_tree::Keccak256Hasher;

/// 32-byte hash type
pub type Hash = [u8; 32];

/// Account address (32 bytes, derived from program id + seeds)
pub type Address = [u8; 32];

/// Owning program identity
pub type ProgramId = [u8; 32];

/// State tree identity
pub type TreeId = [u8; 32];

/// Nullifier queue identity
pub type QueueId = [u8; 32];

/// Position of a leaf in the append order
pub type LeafIndex = u64;

/// Version identifier of a historical Merkle root
pub type RootIndex = u64;

/// Current live state of one logical account.
///
/// The authoritative copy is the Merkle leaf; this struct is the store's
/// materialized view of it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressedAccount {
    pub address: Address,
    pub owner: ProgramId,
    pub data: Vec<u8>,
    pub leaf_hash: Hash,
    pub tree_id: TreeId,
    pub leaf_index: LeafIndex,
}

impl CompressedAccount {
    /// Leaf hash committing to this account's address, owner and data
    pub fn leaf_hash_for(address: &Address, owner: &ProgramId, data: &[u8]) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(owner);
        hasher.update(data);
        let mut payload = [0u8; 32];
        hasher.finalize(&mut payload);

        Keccak256Hasher::hash_leaf(address, &payload)
    }
}

/// Opaque validity proof returned by the proof service.
///
/// The store never interprets the proof bytes; only the root indices are
/// checked against the validity window before a request is applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidityProof {
    pub proof: Vec<u8>,
    pub root_indices: Vec<RootIndex>,
}

impl ValidityProof {
    pub fn is_empty(&self) -> bool {
        self.proof.is_empty()
    }
}

/// Reference to an existing leaf consumed by an update or delete
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumedLeaf {
    pub leaf_hash: Hash,
    pub tree_id: TreeId,
    pub queue_id: QueueId,
}

/// Claim that a fresh address is not yet present in the tree
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressClaim {
    pub tree_id: TreeId,
    pub queue_id: QueueId,
    pub address: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_hash_covers_owner_and_data() {
        let address = [1u8; 32];
        let base = CompressedAccount::leaf_hash_for(&address, &[2u8; 32], b"data");

        assert_ne!(
            base,
            CompressedAccount::leaf_hash_for(&address, &[3u8; 32], b"data"),
        );
        assert_ne!(
            base,
            CompressedAccount::leaf_hash_for(&address, &[2u8; 32], b"other"),
        );
    }
}
