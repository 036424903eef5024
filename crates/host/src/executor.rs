//! State transition executor
//!
//! Drives one account mutation end to end: derive/query, fetch a validity
//! proof, assemble the atomic request, submit it to the execution layer and
//! await a terminal outcome. Mutations on distinct addresses run fully in
//! parallel; a second mutation on an address with a request already in
//! flight fails fast with `Conflict`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use zkcas_core::{
    derive_address, AccountStore, Address, AddressClaim, AtomicRequest, CompressedAccount,
    ConsumedLeaf, LeafIndex, Operation, ProgramId, RequestAssembler, StoreError, TreeRef,
};

use crate::config::Config;
use crate::proof_service::ProofService;

/// Transaction identifier handed out by the execution layer
pub type TxId = u64;

/// Lifecycle of one atomic request
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RequestState {
    /// Assembled, not yet sent; can be discarded for free
    Pending,
    /// Sent to the execution layer; can only be awaited
    Submitted,
    /// Terminal success
    Confirmed,
    /// Terminal failure, no state change applied
    Rejected,
}

impl RequestState {
    /// Legal state machine edges
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Submitted)
                | (Self::Submitted, Self::Confirmed)
                | (Self::Submitted, Self::Rejected)
        )
    }
}

/// Tracks one request through the state machine, rejecting illegal edges
#[derive(Debug)]
struct RequestTracker {
    state: RequestState,
}

impl RequestTracker {
    fn new() -> Self {
        Self {
            state: RequestState::Pending,
        }
    }

    fn advance(&mut self, next: RequestState) -> Result<(), StoreError> {
        if !self.state.can_transition_to(next) {
            return Err(StoreError::ExecutionRejected {
                reason: format!("illegal transition {:?} -> {:?}", self.state, next),
            });
        }
        self.state = next;
        Ok(())
    }

    fn state(&self) -> RequestState {
        self.state
    }
}

/// Terminal outcome of a submitted request
#[derive(Clone, Debug)]
pub enum TxOutcome {
    Confirmed { leaf_index: Option<LeafIndex> },
    Rejected { error: StoreError },
}

/// Ledger-side collaborator accepting atomic requests.
///
/// `submit` accepts the request synchronously and returns an identifier;
/// `confirm` resolves to the terminal outcome. Rejections are guaranteed
/// to leave the underlying store unchanged.
#[async_trait]
pub trait ExecutionLayer: Send + Sync {
    async fn submit(&self, request: AtomicRequest) -> Result<TxId, StoreError>;
    async fn confirm(&self, tx: TxId) -> Result<TxOutcome, StoreError>;
}

/// In-process execution layer applying requests directly to the store.
///
/// Validates before applying, all-or-nothing: the proof's root indices
/// must be inside the store's validity window, and for consuming ops the
/// request's claimed leaf contents must match the proven live leaf.
pub struct LocalExecutionLayer {
    store: Arc<RwLock<AccountStore>>,
    outcomes: Mutex<HashMap<TxId, TxOutcome>>,
    next_id: AtomicU64,
}

impl LocalExecutionLayer {
    pub fn new(store: Arc<RwLock<AccountStore>>) -> Self {
        Self {
            store,
            outcomes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn apply(
        store: &mut AccountStore,
        request: &AtomicRequest,
    ) -> Result<Option<LeafIndex>, StoreError> {
        for root_index in &request.proof.root_indices {
            if !store.root_history().contains(*root_index) {
                return Err(StoreError::ExecutionRejected {
                    reason: format!("proof root index {root_index} outside validity window"),
                });
            }
        }

        match &request.op {
            Operation::Create { address, owner, data } => {
                let leaf_index = store.record_create(*address, *owner, data.clone())?;
                Ok(Some(leaf_index))
            }
            Operation::Update {
                address,
                expected_leaf_index,
                current_leaf_hash,
                data,
            } => {
                Self::check_consumed_leaf(store, address, *expected_leaf_index, current_leaf_hash)?;
                let leaf_index =
                    store.record_update(*address, *expected_leaf_index, data.clone())?;
                Ok(Some(leaf_index))
            }
            Operation::Delete {
                address,
                expected_leaf_index,
                current_leaf_hash,
            } => {
                Self::check_consumed_leaf(store, address, *expected_leaf_index, current_leaf_hash)?;
                store.record_delete(*address, *expected_leaf_index)?;
                Ok(None)
            }
        }
    }

    /// Verify the caller's claimed leaf against the live one before any
    /// mutation happens
    fn check_consumed_leaf(
        store: &AccountStore,
        address: &Address,
        expected_leaf_index: LeafIndex,
        current_leaf_hash: &[u8; 32],
    ) -> Result<(), StoreError> {
        let live = store.get_account(address)?;
        if live.leaf_index != expected_leaf_index {
            return Err(StoreError::StaleLeaf {
                expected: expected_leaf_index,
                actual: live.leaf_index,
            });
        }
        if live.leaf_hash != *current_leaf_hash {
            return Err(StoreError::ExecutionRejected {
                reason: "claimed account contents do not match the live leaf".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionLayer for LocalExecutionLayer {
    async fn submit(&self, request: AtomicRequest) -> Result<TxId, StoreError> {
        let tx = self.next_id.fetch_add(1, Ordering::SeqCst);

        let outcome = {
            let mut store = self.store.write().await;
            match Self::apply(&mut store, &request) {
                Ok(leaf_index) => TxOutcome::Confirmed { leaf_index },
                Err(error) => {
                    warn!(tx, %error, "request rejected");
                    TxOutcome::Rejected { error }
                }
            }
        };

        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tx, outcome);
        Ok(tx)
    }

    async fn confirm(&self, tx: TxId) -> Result<TxOutcome, StoreError> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tx)
            .cloned()
            .ok_or_else(|| StoreError::ExecutionRejected {
                reason: format!("unknown transaction {tx}"),
            })
    }
}

/// Report for a request that reached a terminal state
#[derive(Clone, Debug)]
pub struct Submission {
    pub address: Address,
    pub tx_id: TxId,
    pub state: RequestState,
    pub leaf_index: Option<LeafIndex>,
}

/// Releases the in-flight reservation for an address on drop
struct AddressGuard {
    in_flight: Arc<Mutex<HashSet<Address>>>,
    address: Address,
}

impl Drop for AddressGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.address);
    }
}

/// End-to-end pipeline for account mutations
pub struct StateTransitionExecutor<P, E> {
    store: Arc<RwLock<AccountStore>>,
    proof_service: P,
    execution: E,
    config: Config,
    tree_ref: TreeRef,
    in_flight: Arc<Mutex<HashSet<Address>>>,
}

impl<P: ProofService, E: ExecutionLayer> StateTransitionExecutor<P, E> {
    pub fn new(
        store: Arc<RwLock<AccountStore>>,
        proof_service: P,
        execution: E,
        config: Config,
        tree_ref: TreeRef,
    ) -> Self {
        Self {
            store,
            proof_service,
            execution,
            config,
            tree_ref,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a compressed account at the address derived from
    /// `(program_id, seeds)`
    pub async fn create_account(
        &self,
        program_id: &ProgramId,
        seeds: &[&[u8]],
        owner: ProgramId,
        data: Vec<u8>,
    ) -> Result<Submission, StoreError> {
        let address = derive_address(program_id, seeds)?;
        let guard = self.reserve(address)?;

        let claims = [AddressClaim {
            tree_id: self.tree_ref.tree_id,
            queue_id: self.tree_ref.queue_id,
            address,
        }];
        let op = Operation::Create {
            address,
            owner,
            data,
        };
        self.run(guard, address, &[], &claims, op).await
    }

    /// Replace the live account data at an address
    pub async fn update_account(
        &self,
        address: Address,
        new_data: Vec<u8>,
    ) -> Result<Submission, StoreError> {
        let guard = self.reserve(address)?;
        let live = self.get_account(&address).await?;

        let consumed = [ConsumedLeaf {
            leaf_hash: live.leaf_hash,
            tree_id: self.tree_ref.tree_id,
            queue_id: self.tree_ref.queue_id,
        }];
        let op = Operation::Update {
            address,
            expected_leaf_index: live.leaf_index,
            current_leaf_hash: live.leaf_hash,
            data: new_data,
        };
        self.run(guard, address, &consumed, &[], op).await
    }

    /// Delete the live account at an address
    pub async fn delete_account(&self, address: Address) -> Result<Submission, StoreError> {
        let guard = self.reserve(address)?;
        let live = self.get_account(&address).await?;

        let consumed = [ConsumedLeaf {
            leaf_hash: live.leaf_hash,
            tree_id: self.tree_ref.tree_id,
            queue_id: self.tree_ref.queue_id,
        }];
        let op = Operation::Delete {
            address,
            expected_leaf_index: live.leaf_index,
            current_leaf_hash: live.leaf_hash,
        };
        self.run(guard, address, &consumed, &[], op).await
    }

    /// Read-through to the store
    pub async fn get_account(&self, address: &Address) -> Result<CompressedAccount, StoreError> {
        self.store.read().await.get_account(address).cloned()
    }

    /// Reserve an address for one in-flight mutation
    fn reserve(&self, address: Address) -> Result<AddressGuard, StoreError> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(address) {
            return Err(StoreError::Conflict(address));
        }
        Ok(AddressGuard {
            in_flight: Arc::clone(&self.in_flight),
            address,
        })
    }

    async fn run(
        &self,
        _guard: AddressGuard,
        address: Address,
        consumed: &[ConsumedLeaf],
        claims: &[AddressClaim],
        op: Operation,
    ) -> Result<Submission, StoreError> {
        let mut tracker = RequestTracker::new();

        let proof = self.fetch_proof(consumed, claims).await?;
        let request = RequestAssembler::assemble(Some(proof), &[self.tree_ref], op)?;

        let tx_id = self.execution.submit(request).await?;
        tracker.advance(RequestState::Submitted)?;
        info!(tx = tx_id, address = %hex::encode(address), "request submitted");

        match self.execution.confirm(tx_id).await? {
            TxOutcome::Confirmed { leaf_index } => {
                tracker.advance(RequestState::Confirmed)?;
                info!(tx = tx_id, ?leaf_index, "request confirmed");
                Ok(Submission {
                    address,
                    tx_id,
                    state: tracker.state(),
                    leaf_index,
                })
            }
            TxOutcome::Rejected { error } => {
                tracker.advance(RequestState::Rejected)?;
                warn!(tx = tx_id, %error, "request rejected by execution layer");
                Err(error)
            }
        }
    }

    /// Fetch a proof with a per-call timeout, retrying retryable failures
    /// with exponential backoff. Each retry issues a fresh request; a
    /// timed-out proof is never resubmitted.
    async fn fetch_proof(
        &self,
        consumed: &[ConsumedLeaf],
        claims: &[AddressClaim],
    ) -> Result<zkcas_core::ValidityProof, StoreError> {
        let timeout = Duration::from_millis(self.config.proof_timeout_ms);
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0u32;

        loop {
            let result = match tokio::time::timeout(
                timeout,
                self.proof_service.get_validity_proof(consumed, claims),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(StoreError::ProofServiceTimeout {
                    timeout_ms: self.config.proof_timeout_ms,
                }),
            };

            match result {
                Ok(proof) => return Ok(proof),
                Err(error) if error.is_retryable() && attempt < self.config.max_proof_retries => {
                    attempt += 1;
                    warn!(attempt, %error, "proof fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
