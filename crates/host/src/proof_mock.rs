//! Mock proof service for testing without a prover

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use zkcas_core::{AccountStore, AddressClaim, ConsumedLeaf, StoreError, ValidityProof};
use zkcas_tree::Keccak256Hasher;

use crate::proof_service::{check_request_shape, ProofService};

/// Canned proof provider.
///
/// Proof bytes are derived from the request so distinct requests yield
/// distinct proofs; the root index echoes the store's current root, which
/// is what a live prover tracking the tree would answer.
pub struct MockProofService {
    store: Arc<RwLock<AccountStore>>,
    /// Number of upcoming calls that fail with a timeout
    fail_timeouts: AtomicU32,
    /// Simulated prover latency
    delay: Option<Duration>,
}

impl MockProofService {
    /// Create a mock prover tracking the given store
    pub fn new(store: Arc<RwLock<AccountStore>>) -> Self {
        info!("Using mock proof service (no actual proving)");
        Self {
            store,
            fail_timeouts: AtomicU32::new(0),
            delay: None,
        }
    }

    /// Simulate prover latency on every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next `n` calls fail with `ProofServiceTimeout`
    pub fn fail_next(&self, n: u32) {
        self.fail_timeouts.store(n, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ProofService for MockProofService {
    async fn get_validity_proof(
        &self,
        consumed: &[ConsumedLeaf],
        new_addresses: &[AddressClaim],
    ) -> Result<ValidityProof, StoreError> {
        check_request_shape(consumed, new_addresses)?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_injected_failure() {
            return Err(StoreError::ProofServiceTimeout { timeout_ms: 0 });
        }

        let encoded = bincode::serialize(&(consumed, new_addresses))
            .map_err(|e| StoreError::ProofServiceError { reason: e.to_string() })?;
        let digest = Keccak256Hasher::hash(&encoded);

        let root_index = self.store.read().await.root_index();

        Ok(ValidityProof {
            proof: digest.repeat(8),
            root_indices: vec![root_index],
        })
    }
}
