//! Error taxonomy for the compressed account pipeline

use thiserror::Error;

use crate::types::Address;

/// Errors surfaced by the store, assembler and host pipeline.
///
/// `StaleLeaf`, `Conflict` and the proof-service errors are recoverable by
/// re-querying current state and fetching a fresh proof; the rest are
/// caller-input errors or terminal rejections.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("seed must contain at least one non-empty part")]
    InvalidSeed,

    #[error("live account already exists at address {}", hex::encode(.0))]
    DuplicateAddress(Address),

    #[error("no live account at address {}", hex::encode(.0))]
    NotFound(Address),

    #[error("live leaf index {actual} no longer matches expected {expected}")]
    StaleLeaf { expected: u64, actual: u64 },

    #[error("a mutation is already in flight for address {}", hex::encode(.0))]
    Conflict(Address),

    #[error("operation requires a validity proof but none was supplied")]
    MissingProof,

    #[error("proof request must carry consumed leaves or address claims, not both")]
    InvalidProofRequest,

    #[error("proof service did not answer within {timeout_ms}ms")]
    ProofServiceTimeout { timeout_ms: u64 },

    #[error("proof service failed: {reason}")]
    ProofServiceError { reason: String },

    #[error("execution layer rejected the request: {reason}")]
    ExecutionRejected { reason: String },
}

impl StoreError {
    /// Whether the caller may retry after re-querying state and fetching a
    /// fresh proof. Stale proofs are never resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StaleLeaf { .. }
                | Self::Conflict(_)
                | Self::ProofServiceTimeout { .. }
                | Self::ProofServiceError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(StoreError::StaleLeaf { expected: 0, actual: 1 }.is_retryable());
        assert!(StoreError::Conflict([0u8; 32]).is_retryable());
        assert!(StoreError::ProofServiceTimeout { timeout_ms: 100 }.is_retryable());

        assert!(!StoreError::InvalidSeed.is_retryable());
        assert!(!StoreError::DuplicateAddress([0u8; 32]).is_retryable());
        assert!(!StoreError::MissingProof.is_retryable());
        assert!(!StoreError::ExecutionRejected { reason: "bad proof".into() }.is_retryable());
    }
}
