//! Host-side pipeline for the compressed account store
//!
//! Wires the core store to its external collaborators: the validity proof
//! service (HTTP client or mock) and the execution layer that applies
//! atomic requests. The `StateTransitionExecutor` drives the full
//! derive -> prove -> assemble -> submit -> confirm flow.

pub mod config;
pub mod executor;
pub mod proof_mock;
pub mod proof_service;

pub use config::{Config, ProofMode};
pub use executor::{
    ExecutionLayer, LocalExecutionLayer, RequestState, StateTransitionExecutor, Submission,
    TxId, TxOutcome,
};
pub use proof_mock::MockProofService;
pub use proof_service::{HttpProofService, ProofService};
