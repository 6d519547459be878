//! On-chain encodings of Groth16 proofs and their public signals
//!
//! The verifier contract consumes the proof as a fixed 256-byte buffer
//! `A.x || A.y || B.x1 || B.x0 || B.y1 || B.y0 || C.x || C.y` with every
//! coordinate big-endian; note the Fp2 coordinates are ordered `c1 || c0`
//! to match the verifier's convention. Public signals are length-prefixed

use ark_bn254::Fq;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::Proof;
use constants::{Scalar, SystemCurve, PROOF_BYTES_LEN, SCALAR_BYTES_LEN};
use umbra_crypto::fields::scalar_to_be_bytes;

/// Encode a base-field coordinate as a fixed 32-byte big-endian buffer
fn fq_to_be_bytes(x: &Fq) -> [u8; SCALAR_BYTES_LEN] {
    x.into_bigint()
        .to_bytes_be()
        .try_into()
        .expect("base field encoding is always 32 bytes")
}

/// Encode a proof for the on-chain verifier
pub fn encode_proof(proof: &Proof<SystemCurve>) -> Vec<u8> {
    let mut out = Vec::with_capacity(PROOF_BYTES_LEN);
    out.extend_from_slice(&fq_to_be_bytes(&proof.a.x));
    out.extend_from_slice(&fq_to_be_bytes(&proof.a.y));
    out.extend_from_slice(&fq_to_be_bytes(&proof.b.x.c1));
    out.extend_from_slice(&fq_to_be_bytes(&proof.b.x.c0));
    out.extend_from_slice(&fq_to_be_bytes(&proof.b.y.c1));
    out.extend_from_slice(&fq_to_be_bytes(&proof.b.y.c0));
    out.extend_from_slice(&fq_to_be_bytes(&proof.c.x));
    out.extend_from_slice(&fq_to_be_bytes(&proof.c.y));
    out
}

/// Encode the public signals: a 4-byte big-endian count followed by each
/// signal as a 32-byte big-endian scalar
pub fn encode_public_signals(signals: &[Scalar]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + signals.len() * SCALAR_BYTES_LEN);
    out.extend_from_slice(&(signals.len() as u32).to_be_bytes());
    for signal in signals {
        out.extend_from_slice(&scalar_to_be_bytes(signal));
    }
    out
}

#[cfg(test)]
mod encoding_tests {
    use ark_bn254::{G1Affine, G2Affine};
    use ark_ec::AffineRepr;

    use super::*;

    /// A proof built from the curve generators, sufficient to pin the
    /// encoding layout
    fn generator_proof() -> Proof<SystemCurve> {
        Proof {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: G1Affine::generator(),
        }
    }

    /// Tests the fixed 256-byte proof length
    #[test]
    fn test_proof_encoding_length() {
        let encoded = encode_proof(&generator_proof());
        assert_eq!(encoded.len(), PROOF_BYTES_LEN);
    }

    /// Tests the word layout, including the c1-before-c0 Fp2 order
    #[test]
    fn test_proof_encoding_layout() {
        let proof = generator_proof();
        let encoded = encode_proof(&proof);

        // A occupies the first two words
        assert_eq!(&encoded[0..32], &fq_to_be_bytes(&proof.a.x));
        assert_eq!(&encoded[32..64], &fq_to_be_bytes(&proof.a.y));

        // B follows with each Fp2 coordinate ordered c1 then c0
        assert_eq!(&encoded[64..96], &fq_to_be_bytes(&proof.b.x.c1));
        assert_eq!(&encoded[96..128], &fq_to_be_bytes(&proof.b.x.c0));
        assert_eq!(&encoded[128..160], &fq_to_be_bytes(&proof.b.y.c1));
        assert_eq!(&encoded[160..192], &fq_to_be_bytes(&proof.b.y.c0));

        // C closes the buffer
        assert_eq!(&encoded[192..224], &fq_to_be_bytes(&proof.c.x));
        assert_eq!(&encoded[224..256], &fq_to_be_bytes(&proof.c.y));
    }

    /// Tests the count-prefixed public signal layout
    #[test]
    fn test_public_signal_encoding() {
        let signals = vec![Scalar::from(1u8), Scalar::from(2u8), Scalar::from(3u8)];
        let encoded = encode_public_signals(&signals);

        // 4-byte count prefix then 32 bytes per signal
        assert_eq!(encoded.len(), 4 + 3 * SCALAR_BYTES_LEN);
        assert_eq!(&encoded[0..4], &3u32.to_be_bytes());
        assert_eq!(&encoded[4..36], &scalar_to_be_bytes(&signals[0]));
        assert_eq!(encoded[35], 1);
        assert_eq!(encoded[67], 2);
    }

    /// Tests encoding an empty signal list
    #[test]
    fn test_empty_signal_encoding() {
        let encoded = encode_public_signals(&[]);
        assert_eq!(encoded, 0u32.to_be_bytes().to_vec());
    }
}
