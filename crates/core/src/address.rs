//! Deterministic address derivation
//!
//! An address is a stable identity for an account across its whole
//! create/update/delete history, independent of where its leaf currently
//! lives in the tree.

use tiny_keccak::{Hasher, Keccak};

use crate::error::StoreError;
use crate::types::{Address, ProgramId};

/// Domain tag separating derived addresses from other keccak usage
const ADDRESS_DOMAIN: &[u8] = b"zkcas:address:v1";

/// Derive the account address for `(program_id, seed_parts)`.
///
/// Each seed part is framed with its length, so both the ordering and the
/// part boundaries contribute to the result: `["ab", "c"]` and
/// `["a", "bc"]` derive different addresses.
pub fn derive_address(
    program_id: &ProgramId,
    seed_parts: &[&[u8]],
) -> Result<Address, StoreError> {
    if seed_parts.is_empty() || seed_parts.iter().all(|part| part.is_empty()) {
        return Err(StoreError::InvalidSeed);
    }

    let mut hasher = Keccak::v256();
    hasher.update(ADDRESS_DOMAIN);
    hasher.update(program_id);
    for part in seed_parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }

    let mut address = [0u8; 32];
    hasher.finalize(&mut address);
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: ProgramId = [9u8; 32];

    #[test]
    fn test_deterministic() {
        let a = derive_address(&PROGRAM, &[b"compressed_data", &[1u8; 32]]).unwrap();
        let b = derive_address(&PROGRAM, &[b"compressed_data", &[1u8; 32]]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_inputs_distinct_addresses() {
        let base = derive_address(&PROGRAM, &[b"seed"]).unwrap();

        assert_ne!(base, derive_address(&[8u8; 32], &[b"seed"]).unwrap());
        assert_ne!(base, derive_address(&PROGRAM, &[b"seed2"]).unwrap());
    }

    #[test]
    fn test_order_and_boundaries_matter() {
        let ab_c = derive_address(&PROGRAM, &[b"ab", b"c"]).unwrap();
        let a_bc = derive_address(&PROGRAM, &[b"a", b"bc"]).unwrap();
        let c_ab = derive_address(&PROGRAM, &[b"c", b"ab"]).unwrap();

        assert_ne!(ab_c, a_bc);
        assert_ne!(ab_c, c_ab);
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert_eq!(derive_address(&PROGRAM, &[]), Err(StoreError::InvalidSeed));
        assert_eq!(
            derive_address(&PROGRAM, &[b"", b""]),
            Err(StoreError::InvalidSeed),
        );
    }
}
