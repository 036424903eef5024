//! Compressed account store
//!
//! Off-chain-addressable, proof-gated key-value store. Each account's
//! authoritative state is a leaf in the append-only state tree; this store
//! keeps the live address -> leaf mapping, the nullifier set, and the tree
//! itself. Per-address concurrency is optimistic: every mutation is fenced
//! on the leaf index the caller observed, and a mismatch surfaces as
//! `StaleLeaf` instead of blocking.

use std::collections::{HashMap, HashSet};

use zkcas_tree::{InclusionProof, RootHistory, StateTree};

use crate::error::StoreError;
use crate::types::{Address, CompressedAccount, Hash, LeafIndex, ProgramId, RootIndex, TreeId};

/// Account store backed by one state tree
#[derive(Clone, Debug)]
pub struct AccountStore {
    /// Identity of the backing tree, carried into account records
    tree_id: TreeId,
    /// Append-only leaf commitment
    tree: StateTree,
    /// Live leaf per address; exactly one entry per live account
    live: HashMap<Address, CompressedAccount>,
    /// Hashes of consumed leaves
    nullifiers: HashSet<Hash>,
}

impl AccountStore {
    /// Create an empty store retaining `root_window` historical roots
    pub fn new(tree_id: TreeId, root_window: usize) -> Self {
        Self {
            tree_id,
            tree: StateTree::new(root_window),
            live: HashMap::new(),
            nullifiers: HashSet::new(),
        }
    }

    /// Current live account at an address
    pub fn get_account(&self, address: &Address) -> Result<&CompressedAccount, StoreError> {
        self.live
            .get(address)
            .ok_or(StoreError::NotFound(*address))
    }

    /// Append a new leaf for a fresh address
    pub fn record_create(
        &mut self,
        address: Address,
        owner: ProgramId,
        data: Vec<u8>,
    ) -> Result<LeafIndex, StoreError> {
        if self.live.contains_key(&address) {
            return Err(StoreError::DuplicateAddress(address));
        }

        let leaf_hash = CompressedAccount::leaf_hash_for(&address, &owner, &data);
        let leaf_index = self.tree.append(leaf_hash);
        self.live.insert(
            address,
            CompressedAccount {
                address,
                owner,
                data,
                leaf_hash,
                tree_id: self.tree_id,
                leaf_index,
            },
        );
        Ok(leaf_index)
    }

    /// Nullify the live leaf and append a replacement with new data under
    /// the same address
    pub fn record_update(
        &mut self,
        address: Address,
        expected_leaf_index: LeafIndex,
        new_data: Vec<u8>,
    ) -> Result<LeafIndex, StoreError> {
        let current = self.fenced_live_leaf(&address, expected_leaf_index)?;
        let owner = current.owner;
        let old_hash = current.leaf_hash;

        self.consume_leaf(expected_leaf_index, old_hash)?;

        let leaf_hash = CompressedAccount::leaf_hash_for(&address, &owner, &new_data);
        let leaf_index = self.tree.append(leaf_hash);
        self.live.insert(
            address,
            CompressedAccount {
                address,
                owner,
                data: new_data,
                leaf_hash,
                tree_id: self.tree_id,
                leaf_index,
            },
        );
        Ok(leaf_index)
    }

    /// Nullify the live leaf with no replacement; subsequent lookups
    /// return `NotFound`
    pub fn record_delete(
        &mut self,
        address: Address,
        expected_leaf_index: LeafIndex,
    ) -> Result<(), StoreError> {
        let current = self.fenced_live_leaf(&address, expected_leaf_index)?;
        let old_hash = current.leaf_hash;

        self.consume_leaf(expected_leaf_index, old_hash)?;
        self.live.remove(&address);
        Ok(())
    }

    /// Inclusion proof for the live leaf at an address
    pub fn prove_account(&self, address: &Address) -> Result<InclusionProof, StoreError> {
        let account = self.get_account(address)?;
        self.tree
            .prove(account.leaf_index)
            .map_err(|e| StoreError::ExecutionRejected { reason: e.to_string() })
    }

    /// Whether a leaf hash has been consumed
    pub fn is_nullified(&self, leaf_hash: &Hash) -> bool {
        self.nullifiers.contains(leaf_hash)
    }

    /// Current root of the backing tree
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Root index of the current root
    pub fn root_index(&self) -> RootIndex {
        self.tree.root_index()
    }

    /// Historical root validity window
    pub fn root_history(&self) -> &RootHistory {
        self.tree.history()
    }

    /// Identity of the backing tree
    pub fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    /// Number of live accounts
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live leaf for an address, fenced on the leaf index the caller
    /// observed. A mismatch means a concurrent mutation won the race.
    fn fenced_live_leaf(
        &self,
        address: &Address,
        expected_leaf_index: LeafIndex,
    ) -> Result<&CompressedAccount, StoreError> {
        let current = self.get_account(address)?;
        if current.leaf_index != expected_leaf_index {
            return Err(StoreError::StaleLeaf {
                expected: expected_leaf_index,
                actual: current.leaf_index,
            });
        }
        Ok(current)
    }

    fn consume_leaf(&mut self, leaf_index: LeafIndex, leaf_hash: Hash) -> Result<(), StoreError> {
        self.tree
            .nullify(leaf_index)
            .map_err(|e| StoreError::ExecutionRejected { reason: e.to_string() })?;
        self.nullifiers.insert(leaf_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use zkcas_tree::DEFAULT_ROOT_HISTORY;

    const TREE: TreeId = [0xaa; 32];
    const OWNER: ProgramId = [9u8; 32];

    fn store() -> AccountStore {
        AccountStore::new(TREE, DEFAULT_ROOT_HISTORY)
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let mut store = store();
        let address = [1u8; 32];

        let index = store.record_create(address, OWNER, vec![42]).unwrap();
        assert_eq!(index, 0);

        let account = store.get_account(&address).unwrap();
        assert_eq!(account.data, vec![42]);
        assert_eq!(account.owner, OWNER);
        assert_eq!(account.tree_id, TREE);
    }

    #[test]
    fn test_duplicate_create_leaves_first_leaf_untouched() {
        let mut store = store();
        let address = [1u8; 32];

        store.record_create(address, OWNER, vec![42]).unwrap();
        let root_before = store.root();

        assert_eq!(
            store.record_create(address, OWNER, vec![7]),
            Err(StoreError::DuplicateAddress(address)),
        );
        assert_eq!(store.root(), root_before);
        assert_eq!(store.get_account(&address).unwrap().data, vec![42]);
    }

    #[test]
    fn test_update_replaces_data_and_nullifies_old_leaf() {
        let mut store = store();
        let address = [1u8; 32];

        let first = store.record_create(address, OWNER, vec![42]).unwrap();
        let old_hash = store.get_account(&address).unwrap().leaf_hash;
        let old_proof = store.prove_account(&address).unwrap();

        let second = store.record_update(address, first, vec![100]).unwrap();
        assert_ne!(first, second);

        let account = store.get_account(&address).unwrap();
        assert_eq!(account.data, vec![100]);
        assert_eq!(account.leaf_index, second);

        // The consumed leaf cannot back another proof.
        assert!(store.is_nullified(&old_hash));
        assert!(!old_proof.verify(&store.root()));
        // The replacement leaf proves against the new root.
        assert!(store.prove_account(&address).unwrap().verify(&store.root()));
    }

    #[test]
    fn test_delete_then_get_not_found() {
        let mut store = store();
        let address = [1u8; 32];

        let index = store.record_create(address, OWNER, vec![42]).unwrap();
        store.record_delete(address, index).unwrap();

        assert_eq!(
            store.get_account(&address),
            Err(StoreError::NotFound(address)),
        );
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_update_without_create_not_found() {
        let mut store = store();
        assert_eq!(
            store.record_update([5u8; 32], 0, vec![1]),
            Err(StoreError::NotFound([5u8; 32])),
        );
    }

    #[test]
    fn test_stale_leaf_fence() {
        let mut store = store();
        let address = [1u8; 32];
        let first = store.record_create(address, OWNER, vec![42]).unwrap();

        // Two writers observe leaf index `first`; the second loses the race.
        let winner = store.record_update(address, first, vec![100]).unwrap();
        let loser = store.record_update(address, first, vec![200]);

        assert_eq!(
            loser,
            Err(StoreError::StaleLeaf { expected: first, actual: winner }),
        );
        assert_eq!(store.get_account(&address).unwrap().data, vec![100]);
    }

    #[test]
    fn test_every_mutation_advances_root_and_sequence() {
        let mut store = store();
        let address = [1u8; 32];

        let mut roots = vec![store.root()];
        let index = store.record_create(address, OWNER, vec![1]).unwrap();
        roots.push(store.root());
        let index = store.record_update(address, index, vec![2]).unwrap();
        roots.push(store.root());
        store.record_delete(address, index).unwrap();
        roots.push(store.root());

        for pair in roots.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        // create = 1 append, update = nullify + append, delete = nullify
        assert_eq!(store.root_index(), 4);
    }

    #[test]
    fn test_independent_addresses_do_not_interfere() {
        let mut store = store();
        let mut rng = rand::thread_rng();

        let mut payloads = Vec::new();
        for n in 0..8u8 {
            let mut data = vec![0u8; 16];
            rng.fill_bytes(&mut data);
            store.record_create([n; 32], OWNER, data.clone()).unwrap();
            payloads.push(data);
        }

        let index = store.get_account(&[3u8; 32]).unwrap().leaf_index;
        store.record_delete([3u8; 32], index).unwrap();

        for n in 0..8u8 {
            if n == 3 {
                continue;
            }
            let account = store.get_account(&[n; 32]).unwrap();
            assert_eq!(account.data, payloads[n as usize]);
        }
    }
}
