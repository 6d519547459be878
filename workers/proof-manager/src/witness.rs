//! Marshals a matched pair into the witness map consumed by the settlement
//! circuit's WASM witness generator
//!
//! Signal names here must match the circuit's input names exactly; the
//! generator resolves inputs by name

use std::collections::HashMap;

use common::types::MatchResult;
use constants::Scalar;
use num_bigint::BigInt;
use umbra_crypto::{fields::scalar_to_biguint, merkle::MerkleOpening};

/// A witness input map: circuit signal name to its value list
pub type WitnessMap = HashMap<String, Vec<BigInt>>;

/// Convert a scalar to the signed big integer representation the witness
/// generator expects
fn scalar_to_bigint(s: &Scalar) -> BigInt {
    BigInt::from(scalar_to_biguint(s))
}

/// Convert an opening's scalars into a witness value list
fn opening_to_bigints(values: &[Scalar]) -> Vec<BigInt> {
    values.iter().map(scalar_to_bigint).collect()
}

/// Build the settlement circuit's witness map
///
/// Private signals: both traders' hashed identifiers with their whitelist
/// openings, and both orders' blinders. Public signals: the two
/// commitments, the asset hash, the matched quantity, the execution price,
/// and the whitelist root
#[allow(clippy::too_many_arguments)]
pub fn build_settlement_witness(
    match_result: &MatchResult,
    asset_hash: Scalar,
    buyer_id_hash: Scalar,
    seller_id_hash: Scalar,
    buyer_opening: &MerkleOpening,
    seller_opening: &MerkleOpening,
    whitelist_root: Scalar,
) -> WitnessMap {
    let buy = &match_result.buy_order;
    let sell = &match_result.sell_order;

    let mut witness = WitnessMap::new();

    // -- Private signals -- //
    witness.insert("buyerIdHash".to_string(), vec![scalar_to_bigint(&buyer_id_hash)]);
    witness.insert("sellerIdHash".to_string(), vec![scalar_to_bigint(&seller_id_hash)]);
    witness
        .insert("buyerMerkleProof".to_string(), opening_to_bigints(&buyer_opening.elems));
    witness.insert(
        "buyerMerkleIndices".to_string(),
        opening_to_bigints(&buyer_opening.indices),
    );
    witness
        .insert("sellerMerkleProof".to_string(), opening_to_bigints(&seller_opening.elems));
    witness.insert(
        "sellerMerkleIndices".to_string(),
        opening_to_bigints(&seller_opening.indices),
    );
    witness.insert("buySecret".to_string(), vec![scalar_to_bigint(&buy.secret)]);
    witness.insert("buyNonce".to_string(), vec![scalar_to_bigint(&buy.nonce)]);
    witness.insert("sellSecret".to_string(), vec![scalar_to_bigint(&sell.secret)]);
    witness.insert("sellNonce".to_string(), vec![scalar_to_bigint(&sell.nonce)]);

    // -- Public signals -- //
    witness.insert("buyCommitment".to_string(), vec![scalar_to_bigint(&buy.commitment)]);
    witness.insert("sellCommitment".to_string(), vec![scalar_to_bigint(&sell.commitment)]);
    witness.insert("assetHash".to_string(), vec![scalar_to_bigint(&asset_hash)]);
    witness.insert(
        "matchedQuantity".to_string(),
        vec![BigInt::from(match_result.execution_quantity)],
    );
    witness.insert(
        "executionPrice".to_string(),
        vec![BigInt::from(match_result.execution_price)],
    );
    witness.insert("whitelistRoot".to_string(), vec![scalar_to_bigint(&whitelist_root)]);

    witness
}

#[cfg(test)]
mod witness_tests {
    use common::types::{mocks::mock_order, now_millis, OrderSide};
    use constants::WHITELIST_HEIGHT;
    use umbra_crypto::{commitments::compute_asset_hash, merkle::WhitelistTree};

    use super::*;

    /// Tests the witness map against the circuit signal layout
    #[test]
    fn test_witness_signal_names_and_shapes() {
        let buy = mock_order("buyer", OrderSide::Buy, 100, 50);
        let sell = mock_order("seller", OrderSide::Sell, 100, 50);
        let asset_hash = compute_asset_hash(&buy.asset_address);
        let match_result = MatchResult::new(buy, sell, now_millis());

        let tree =
            WhitelistTree::new(&[Scalar::from(11u8), Scalar::from(22u8)]);
        let buyer_opening = tree.opening(0).unwrap();
        let seller_opening = tree.opening(1).unwrap();

        let witness = build_settlement_witness(
            &match_result,
            asset_hash,
            tree.leaf(0).unwrap(),
            tree.leaf(1).unwrap(),
            &buyer_opening,
            &seller_opening,
            tree.root(),
        );

        // Every signal the circuit resolves by name must be present
        for name in [
            "buyerIdHash",
            "sellerIdHash",
            "buyerMerkleProof",
            "buyerMerkleIndices",
            "sellerMerkleProof",
            "sellerMerkleIndices",
            "buySecret",
            "buyNonce",
            "sellSecret",
            "sellNonce",
            "buyCommitment",
            "sellCommitment",
            "assetHash",
            "matchedQuantity",
            "executionPrice",
            "whitelistRoot",
        ] {
            assert!(witness.contains_key(name), "missing signal {name}");
        }

        // Openings span the full fixed tree height
        assert_eq!(witness["buyerMerkleProof"].len(), WHITELIST_HEIGHT);
        assert_eq!(witness["sellerMerkleIndices"].len(), WHITELIST_HEIGHT);

        // Scalar signals carry exactly one value
        assert_eq!(witness["buyCommitment"].len(), 1);
        assert_eq!(
            witness["buyCommitment"][0],
            scalar_to_bigint(&match_result.buy_order.commitment)
        );
        assert_eq!(witness["matchedQuantity"][0], BigInt::from(100u32));
    }
}
