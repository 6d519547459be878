//! An immutable snapshot of the compliance whitelist
//!
//! A snapshot couples the Poseidon Merkle tree over participant identifiers
//! with the address registry used to resolve leaf indices. Rebuilds create
//! a fresh snapshot; readers keep the one they observed at the start of
//! their work

use std::collections::HashMap;

use constants::Scalar;
use umbra_crypto::{
    commitments::compute_id_element,
    merkle::{MerkleOpening, WhitelistTree},
};

/// A built whitelist: the Merkle tree plus its address registry
#[derive(Clone, Debug)]
pub struct WhitelistSnapshot {
    /// The Poseidon Merkle tree over the participant identifier elements
    tree: WhitelistTree,
    /// The registered addresses in leaf order
    members: Vec<String>,
    /// The leaf index of each registered address
    index_by_address: HashMap<String, usize>,
}

impl WhitelistSnapshot {
    /// Build a snapshot over an ordered list of participant addresses
    pub fn build(addresses: &[String]) -> Self {
        let ids: Vec<Scalar> =
            addresses.iter().map(|addr| compute_id_element(addr)).collect();
        let tree = WhitelistTree::new(&ids);

        let index_by_address = addresses
            .iter()
            .enumerate()
            .map(|(index, addr)| (addr.clone(), index))
            .collect();

        Self { tree, members: addresses.to_vec(), index_by_address }
    }

    /// The whitelist root the circuit verifies openings against
    pub fn root(&self) -> Scalar {
        self.tree.root()
    }

    /// The number of registered participants
    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    /// Whether the given address is registered
    pub fn contains(&self, address: &str) -> bool {
        self.index_by_address.contains_key(address)
    }

    /// Resolve the leaf index of a registered address
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.index_by_address.get(address).copied()
    }

    /// The hashed identifier (leaf value) at the given index
    pub fn id_hash(&self, index: usize) -> Option<Scalar> {
        self.tree.leaf(index)
    }

    /// The inclusion opening for the member at the given index
    pub fn opening(&self, index: usize) -> Option<MerkleOpening> {
        self.tree.opening(index)
    }
}

#[cfg(test)]
mod whitelist_snapshot_tests {
    use umbra_crypto::merkle::verify_opening;

    use super::*;

    /// Build a snapshot over `n` synthetic addresses
    fn build_snapshot(n: usize) -> WhitelistSnapshot {
        let addresses: Vec<String> =
            (0..n).map(|i| format!("C{:0>55}", i)).collect();
        WhitelistSnapshot::build(&addresses)
    }

    /// Tests address-to-index resolution
    #[test]
    fn test_index_resolution() {
        let snapshot = build_snapshot(3);

        assert_eq!(snapshot.index_of(&format!("C{:0>55}", 1)), Some(1));
        assert_eq!(snapshot.index_of("Cunknown"), None);
        assert!(snapshot.contains(&format!("C{:0>55}", 0)));
    }

    /// Tests that every member's opening verifies against the root
    #[test]
    fn test_openings_verify_against_root() {
        let snapshot = build_snapshot(3);

        for index in 0..3 {
            let leaf = snapshot.id_hash(index).unwrap();
            let opening = snapshot.opening(index).unwrap();
            assert!(verify_opening(leaf, &opening, snapshot.root()));
        }
    }
}
