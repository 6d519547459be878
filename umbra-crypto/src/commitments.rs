//! The order commitment scheme and nullifier derivation
//!
//! An order is committed as `Poseidon([assetHash, side, quantity, price,
//! nonce, secret])`; the secret and nonce blind the order's parameters until
//! settlement. A matched pair derives a deterministic nullifier that the
//! settlement contract records to prevent double-settlement

use ark_ff::UniformRand;
use constants::Scalar;
use rand::rngs::OsRng;

use crate::{fields::scalar_from_be_bytes, hash::compute_poseidon_hash};

/// A freshly generated order commitment along with the blinders that opened
/// it; the blinders must be retained by the trader to settle the order
#[derive(Clone, Copy, Debug)]
pub struct OrderCommitment {
    /// The commitment hash submitted to the book
    pub commitment: Scalar,
    /// The blinding secret, drawn uniformly from the field
    pub secret: Scalar,
    /// The commitment nonce, drawn uniformly from the field
    pub nonce: Scalar,
}

/// Hash an asset address into the field
///
/// The address bytes are interpreted as a big-endian integer, reduced into
/// the field, then hashed at arity one
pub fn compute_asset_hash(asset_address: &str) -> Scalar {
    let elem = scalar_from_be_bytes(asset_address.as_bytes());
    compute_poseidon_hash(&[elem])
}

/// Embed a raw participant identifier into the field
///
/// The whitelist tree hashes this element into its leaf, which is the
/// `idHash` the circuit checks membership of
pub fn compute_id_element(raw_id: &str) -> Scalar {
    scalar_from_be_bytes(raw_id.as_bytes())
}

/// Deterministically recompute an order commitment from its opening
pub fn compute_order_commitment(
    asset_hash: Scalar,
    side: u8,
    quantity: u128,
    price: u128,
    nonce: Scalar,
    secret: Scalar,
) -> Scalar {
    compute_poseidon_hash(&[
        asset_hash,
        Scalar::from(side),
        Scalar::from(quantity),
        Scalar::from(price),
        nonce,
        secret,
    ])
}

/// Generate a fresh order commitment, drawing the secret and nonce from the
/// OS entropy source
///
/// Both blinders are sampled uniformly over the field; predictable values
/// here would leak order intent to anyone who can grind commitments
pub fn generate_order_commitment(
    asset_hash: Scalar,
    side: u8,
    quantity: u128,
    price: u128,
) -> OrderCommitment {
    let mut rng = OsRng;
    let secret = Scalar::rand(&mut rng);
    let nonce = Scalar::rand(&mut rng);

    let commitment = compute_order_commitment(asset_hash, side, quantity, price, nonce, secret);
    OrderCommitment { commitment, secret, nonce }
}

/// Derive the nullifier for a matched order pair
///
/// The two traders' secrets enter additively, so the nullifier is symmetric
/// in the counterparties and deterministic in (commitments, quantity,
/// secrets); the on-chain nullifier set rejects a second settlement of the
/// same pair
pub fn compute_nullifier(
    buy_commitment: Scalar,
    sell_commitment: Scalar,
    quantity: u128,
    buyer_secret: Scalar,
    seller_secret: Scalar,
) -> Scalar {
    compute_poseidon_hash(&[
        buy_commitment,
        sell_commitment,
        Scalar::from(quantity),
        buyer_secret + seller_secret,
    ])
}

#[cfg(test)]
mod commitment_tests {
    use ark_ff::UniformRand;
    use rand::thread_rng;

    use super::*;

    /// A fixed asset address for testing
    const TEST_ASSET: &str = "CBQHNAXSI55GX2GN6D67GK7BHVPSLJUGZQEU7WJ5LKR5PNUCGLIMAO4K";

    /// Tests that identical openings yield identical commitments
    #[test]
    fn test_commitment_determinism() {
        let mut rng = thread_rng();
        let asset_hash = compute_asset_hash(TEST_ASSET);
        let (secret, nonce) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));

        let c1 = compute_order_commitment(asset_hash, 0, 100, 50, nonce, secret);
        let c2 = compute_order_commitment(asset_hash, 0, 100, 50, nonce, secret);
        assert_eq!(c1, c2);
    }

    /// Tests that the commitment binds every order parameter
    #[test]
    fn test_commitment_binds_parameters() {
        let mut rng = thread_rng();
        let asset_hash = compute_asset_hash(TEST_ASSET);
        let (secret, nonce) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));

        let base = compute_order_commitment(asset_hash, 0, 100, 50, nonce, secret);
        let diff_side = compute_order_commitment(asset_hash, 1, 100, 50, nonce, secret);
        let diff_qty = compute_order_commitment(asset_hash, 0, 101, 50, nonce, secret);
        let diff_price = compute_order_commitment(asset_hash, 0, 100, 51, nonce, secret);

        assert_ne!(base, diff_side);
        assert_ne!(base, diff_qty);
        assert_ne!(base, diff_price);
    }

    /// Tests that a generated commitment opens with its blinders
    #[test]
    fn test_generated_commitment_reproducible() {
        let asset_hash = compute_asset_hash(TEST_ASSET);
        let generated = generate_order_commitment(asset_hash, 1, 250, 75);

        let recomputed = compute_order_commitment(
            asset_hash,
            1,
            250,
            75,
            generated.nonce,
            generated.secret,
        );
        assert_eq!(generated.commitment, recomputed);
    }

    /// Tests that repeated generation draws fresh blinders
    #[test]
    fn test_fresh_blinders_per_commitment() {
        let asset_hash = compute_asset_hash(TEST_ASSET);
        let a = generate_order_commitment(asset_hash, 0, 100, 50);
        let b = generate_order_commitment(asset_hash, 0, 100, 50);

        // Same parameters, fresh entropy: everything must differ
        assert_ne!(a.secret, b.secret);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.commitment, b.commitment);
    }

    /// Tests that the nullifier is symmetric in the two secrets
    #[test]
    fn test_nullifier_symmetry() {
        let mut rng = thread_rng();
        let (buy, sell) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));
        let (s1, s2) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));

        // Secrets enter via their sum, so swapping them is a no-op
        let n1 = compute_nullifier(buy, sell, 100, s1, s2);
        let n2 = compute_nullifier(buy, sell, 100, s2, s1);
        assert_eq!(n1, n2);
    }

    /// Tests that the nullifier binds the pair and quantity
    #[test]
    fn test_nullifier_binds_pair() {
        let mut rng = thread_rng();
        let (buy, sell) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));
        let (s1, s2) = (Scalar::rand(&mut rng), Scalar::rand(&mut rng));

        let base = compute_nullifier(buy, sell, 100, s1, s2);
        assert_ne!(base, compute_nullifier(sell, buy, 100, s1, s2));
        assert_ne!(base, compute_nullifier(buy, sell, 99, s1, s2));
    }
}
