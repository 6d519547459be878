//! The proof bundle returned by the proof generation worker

use constants::Scalar;

/// A generated settlement proof, encoded for the on-chain verifier
#[derive(Clone, Debug)]
pub struct SettlementProofBundle {
    /// The encoded Groth16 proof:
    /// `A.x || A.y || B.x1 || B.x0 || B.y1 || B.y0 || C.x || C.y`
    pub proof_bytes: Vec<u8>,
    /// The public signals: a 4-byte big-endian count followed by each
    /// signal as a 32-byte big-endian scalar; the final signal is the
    /// nullifier
    pub public_signals: Vec<u8>,
    /// The pair's nullifier, extracted from the final public signal
    pub nullifier: Scalar,
    /// A short hash of the proof bytes, surfaced in events
    pub proof_hash: String,
}
