//! Atomic request assembly
//!
//! Packs a validity proof, the tree/queue accounts it touches, and the
//! operation payload into one all-or-nothing request. Tree references are
//! deduplicated into a compact index table so repeated references to the
//! same tree reuse one slot.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Address, Hash, LeafIndex, ProgramId, QueueId, TreeId, ValidityProof};

/// Identity of one tree/queue pair touched by a request
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeRef {
    pub tree_id: TreeId,
    pub queue_id: QueueId,
}

/// A `TreeRef` with its assigned slot in the request's account table
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackedTreeRef {
    pub tree_id: TreeId,
    pub queue_id: QueueId,
    pub index: u8,
}

/// Insertion-ordered dedup table assigning stable positional indices.
///
/// Re-inserting an identity yields the index assigned on first insertion.
#[derive(Clone, Debug, Default)]
pub struct TreeIndexTable {
    entries: Vec<TreeRef>,
}

impl TreeIndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for a reference, assigning the next slot on first sight
    pub fn insert(&mut self, tree_ref: TreeRef) -> u8 {
        if let Some(index) = self.get(&tree_ref) {
            return index;
        }
        self.entries.push(tree_ref);
        (self.entries.len() - 1) as u8
    }

    /// Index previously assigned to a reference
    pub fn get(&self, tree_ref: &TreeRef) -> Option<u8> {
        self.entries
            .iter()
            .position(|entry| entry == tree_ref)
            .map(|pos| pos as u8)
    }

    /// Table contents in assignment order
    pub fn into_packed(self) -> Vec<PackedTreeRef> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| PackedTreeRef {
                tree_id: entry.tree_id,
                queue_id: entry.queue_id,
                index: index as u8,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Operation payload carried by an atomic request.
///
/// Update and delete carry the caller's view of the live leaf; the
/// execution layer cross-checks it against the proven leaf before applying.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operation {
    Create {
        address: Address,
        owner: ProgramId,
        data: Vec<u8>,
    },
    Update {
        address: Address,
        expected_leaf_index: LeafIndex,
        current_leaf_hash: Hash,
        data: Vec<u8>,
    },
    Delete {
        address: Address,
        expected_leaf_index: LeafIndex,
        current_leaf_hash: Hash,
    },
}

impl Operation {
    /// Address this operation mutates
    pub fn address(&self) -> Address {
        match self {
            Self::Create { address, .. }
            | Self::Update { address, .. }
            | Self::Delete { address, .. } => *address,
        }
    }

    /// Whether this operation consumes an existing leaf
    pub fn consumes_leaf(&self) -> bool {
        matches!(self, Self::Update { .. } | Self::Delete { .. })
    }
}

/// One atomic state-transition request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtomicRequest {
    pub proof: ValidityProof,
    pub tree_accounts: Vec<PackedTreeRef>,
    pub op: Operation,
}

/// Request assembler
pub struct RequestAssembler;

impl RequestAssembler {
    /// Pack proof, tree references and operation into one request.
    ///
    /// Every operation carries a proof: consuming ops prove inclusion of
    /// the spent leaf, creates prove non-inclusion of the fresh address.
    pub fn assemble(
        proof: Option<ValidityProof>,
        tree_refs: &[TreeRef],
        op: Operation,
    ) -> Result<AtomicRequest, StoreError> {
        let proof = match proof {
            Some(proof) if !proof.is_empty() => proof,
            _ => return Err(StoreError::MissingProof),
        };

        let mut table = TreeIndexTable::new();
        for tree_ref in tree_refs {
            table.insert(*tree_ref);
        }

        Ok(AtomicRequest {
            proof,
            tree_accounts: table.into_packed(),
            op,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_ref(n: u8) -> TreeRef {
        TreeRef {
            tree_id: [n; 32],
            queue_id: [n.wrapping_add(100); 32],
        }
    }

    fn proof() -> ValidityProof {
        ValidityProof {
            proof: vec![1, 2, 3],
            root_indices: vec![0],
        }
    }

    #[test]
    fn test_index_assignment_is_idempotent() {
        let mut table = TreeIndexTable::new();

        assert_eq!(table.insert(tree_ref(1)), 0);
        assert_eq!(table.insert(tree_ref(2)), 1);
        assert_eq!(table.insert(tree_ref(1)), 0);
        assert_eq!(table.insert(tree_ref(2)), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_packed_order_matches_insertion() {
        let mut table = TreeIndexTable::new();
        table.insert(tree_ref(5));
        table.insert(tree_ref(3));
        table.insert(tree_ref(5));

        let packed = table.into_packed();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].tree_id, [5u8; 32]);
        assert_eq!(packed[0].index, 0);
        assert_eq!(packed[1].tree_id, [3u8; 32]);
        assert_eq!(packed[1].index, 1);
    }

    #[test]
    fn test_assemble_dedups_repeated_refs() {
        let request = RequestAssembler::assemble(
            Some(proof()),
            &[tree_ref(1), tree_ref(1), tree_ref(2)],
            Operation::Create {
                address: [7u8; 32],
                owner: [9u8; 32],
                data: vec![42],
            },
        )
        .unwrap();

        assert_eq!(request.tree_accounts.len(), 2);
    }

    #[test]
    fn test_missing_proof_rejected() {
        let op = Operation::Update {
            address: [7u8; 32],
            expected_leaf_index: 0,
            current_leaf_hash: [0u8; 32],
            data: vec![1],
        };

        assert_eq!(
            RequestAssembler::assemble(None, &[tree_ref(1)], op.clone()),
            Err(StoreError::MissingProof),
        );
        // An empty proof is as good as no proof.
        assert_eq!(
            RequestAssembler::assemble(Some(ValidityProof::default()), &[tree_ref(1)], op),
            Err(StoreError::MissingProof),
        );
    }
}
