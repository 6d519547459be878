//! Defines system-wide constants for the dark pool core

#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(missing_docs)]

// -------------------------
// | System-Wide Constants |
// -------------------------

/// The height of the compliance whitelist Merkle tree
///
/// The tree is padded to this fixed depth regardless of how many
/// participants are registered, so the circuit sees a constant-depth
/// opening
pub const WHITELIST_HEIGHT: usize = 20;

/// The fixed-point scaling factor applied to trader-facing quantities and
/// prices; a decimal value maps to `value * PRICE_SCALE` at the engine
/// boundary
pub const PRICE_SCALE: u128 = 10_000_000; // 1e7

/// The Poseidon arity used for order commitments
pub const COMMITMENT_ARITY: usize = 6;

/// The Poseidon arity used for nullifier derivation
pub const NULLIFIER_ARITY: usize = 4;

/// The byte length of an encoded Groth16 proof as consumed by the on-chain
/// verifier: `A.x || A.y || B.x1 || B.x0 || B.y1 || B.y0 || C.x || C.y`
pub const PROOF_BYTES_LEN: usize = 256;

/// The byte length of a single big-endian encoded scalar
pub const SCALAR_BYTES_LEN: usize = 32;

/// The required length of a compliance-whitelisted account address
pub const ADDRESS_LEN: usize = 56;

/// The required leading character of a compliance-whitelisted address
pub const ADDRESS_PREFIX: char = 'C';

/// The maximum length of an asset symbol
pub const MAX_SYMBOL_LEN: usize = 12;

// ------------------------------------
// | System Specific Type Definitions |
// ------------------------------------

/// The curve that the settlement proof system operates over
pub type SystemCurve = ark_bn254::Bn254;

/// The scalar field that commitments, nullifiers, and Merkle nodes live in
pub type Scalar = ark_bn254::Fr;

// ----------------------
// | Pubsub Topic Names |
// ----------------------

/// Get the topic streaming order and match events for a given asset
pub fn orderbook_topic(asset: &str) -> String {
    format!("orderbook:{asset}")
}

/// Get the topic streaming events relevant to a given trader
pub fn trader_topic(address: &str) -> String {
    format!("trader:{address}")
}

/// Get the topic streaming all events scoped to a given match
pub fn settlement_topic(match_id: &str) -> String {
    format!("settlement:{match_id}")
}
