//! Compressed account store core
//!
//! This crate contains the proof-gated account model shared between the
//! host pipeline and tests:
//! - Address derivation (stable identity independent of storage location)
//! - The account store backed by an append-only Merkle tree
//! - Atomic request assembly (proof + deduplicated tree references + op)
//! - The error taxonomy for the whole pipeline

pub mod address;
pub mod assembler;
pub mod error;
pub mod store;
pub mod types;

pub use address::derive_address;
pub use assembler::{AtomicRequest, Operation, PackedTreeRef, RequestAssembler, TreeIndexTable, TreeRef};
pub use error::StoreError;
pub use store::AccountStore;
pub use types::*;
