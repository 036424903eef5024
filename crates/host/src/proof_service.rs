//! Validity proof service client
//!
//! The prover is an external collaborator: given leaves claimed spent or
//! fresh addresses claimed unused, it answers with an opaque proof plus the
//! root indices it proved against. The store never interprets the proof.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use zkcas_core::{AddressClaim, ConsumedLeaf, StoreError, ValidityProof};

/// Proof provider abstraction.
///
/// A logical operation carries at most one of the two argument kinds:
/// creates claim fresh addresses, updates and deletes consume leaves.
/// Mixed or empty calls are rejected before any network traffic.
#[async_trait]
pub trait ProofService: Send + Sync {
    async fn get_validity_proof(
        &self,
        consumed: &[ConsumedLeaf],
        new_addresses: &[AddressClaim],
    ) -> Result<ValidityProof, StoreError>;
}

/// Reject calls that mix consumed leaves with address claims, or carry
/// neither
pub(crate) fn check_request_shape(
    consumed: &[ConsumedLeaf],
    new_addresses: &[AddressClaim],
) -> Result<(), StoreError> {
    if consumed.is_empty() == new_addresses.is_empty() {
        return Err(StoreError::InvalidProofRequest);
    }
    Ok(())
}

#[derive(Serialize)]
struct ProofRequest<'a> {
    consumed: &'a [ConsumedLeaf],
    new_addresses: &'a [AddressClaim],
}

#[derive(Deserialize)]
struct ProofResponse {
    proof: Vec<u8>,
    root_indices: Vec<u64>,
}

/// HTTP client for a remote prover
pub struct HttpProofService {
    client: reqwest::Client,
    url: String,
    timeout_ms: u64,
}

impl HttpProofService {
    /// Create a client against `url` with a per-call timeout
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            timeout_ms,
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::ProofServiceTimeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            StoreError::ProofServiceError {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ProofService for HttpProofService {
    async fn get_validity_proof(
        &self,
        consumed: &[ConsumedLeaf],
        new_addresses: &[AddressClaim],
    ) -> Result<ValidityProof, StoreError> {
        check_request_shape(consumed, new_addresses)?;

        debug!(
            consumed = consumed.len(),
            claims = new_addresses.len(),
            "requesting validity proof"
        );

        let response = self
            .client
            .post(format!("{}/prove", self.url))
            .json(&ProofRequest {
                consumed,
                new_addresses,
            })
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            // Provers answer errors as {"error": "..."} when they can.
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(String::from));
            return Err(StoreError::ProofServiceError {
                reason: match detail {
                    Some(detail) => format!("prover returned status {status}: {detail}"),
                    None => format!("prover returned status {status}"),
                },
            });
        }

        let body: ProofResponse =
            response
                .json()
                .await
                .map_err(|e| StoreError::ProofServiceError {
                    reason: format!("malformed prover response: {e}"),
                })?;

        Ok(ValidityProof {
            proof: body.proof,
            root_indices: body.root_indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumed() -> ConsumedLeaf {
        ConsumedLeaf {
            leaf_hash: [1u8; 32],
            tree_id: [2u8; 32],
            queue_id: [3u8; 32],
        }
    }

    fn claim() -> AddressClaim {
        AddressClaim {
            tree_id: [2u8; 32],
            queue_id: [3u8; 32],
            address: [4u8; 32],
        }
    }

    #[test]
    fn test_request_shape() {
        assert!(check_request_shape(&[consumed()], &[]).is_ok());
        assert!(check_request_shape(&[], &[claim()]).is_ok());

        assert_eq!(
            check_request_shape(&[], &[]),
            Err(StoreError::InvalidProofRequest),
        );
        assert_eq!(
            check_request_shape(&[consumed()], &[claim()]),
            Err(StoreError::InvalidProofRequest),
        );
    }
}
