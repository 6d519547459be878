//! Poseidon hashing over the BN254 scalar field
//!
//! The sponge is parameterized identically to the circuit library's Poseidon
//! (standard round constants and MDS matrix for t = n + 1); any deviation
//! here invalidates every commitment and proof in flight

use constants::Scalar;
use light_poseidon::{Poseidon, PoseidonHasher};

/// The largest input arity used anywhere in the system (order commitments)
pub const MAX_POSEIDON_ARITY: usize = 6;

/// Compute a Poseidon hash of the given input sequence
///
/// Supported arities are 1 through [`MAX_POSEIDON_ARITY`]; the output is
/// canonicalized to its least residue. Deterministic and pure
pub fn compute_poseidon_hash(inputs: &[Scalar]) -> Scalar {
    assert!(
        !inputs.is_empty() && inputs.len() <= MAX_POSEIDON_ARITY,
        "poseidon arity must be in 1..={MAX_POSEIDON_ARITY}"
    );

    let mut hasher =
        Poseidon::<Scalar>::new_circom(inputs.len()).expect("arity bounds checked above");
    hasher.hash(inputs).expect("input count matches the sponge arity")
}
