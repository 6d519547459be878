//! The compliance whitelist as a fixed-depth Poseidon Merkle tree
//!
//! Participant identifiers are hashed into leaves, packed into a dense tree
//! of the least sufficient depth, then extended to the circuit's fixed
//! height with a precomputed ladder of zero-subtree hashes. A tree is
//! immutable once built; rebuilds publish a fresh snapshot and never touch
//! openings handed out earlier

use constants::{Scalar, WHITELIST_HEIGHT};

use crate::hash::compute_poseidon_hash;

/// A fully specified opening from a hashed leaf to the whitelist root
///
/// The first `dense_depth` entries are real sibling hashes; the remainder
/// are zero-ladder nodes with the leaf's subtree always on the left
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerkleOpening {
    /// The sibling hashes from the leaf to the root
    pub elems: [Scalar; WHITELIST_HEIGHT],
    /// The position bits from the leaf to the root; zero indicates the
    /// current node is a left child, one a right child
    pub indices: [Scalar; WHITELIST_HEIGHT],
}

/// A built whitelist tree over a set of participant identifiers
#[derive(Clone, Debug)]
pub struct WhitelistTree {
    /// Every level of the dense subtree, leaves first; the last level holds
    /// only the dense root
    levels: Vec<Vec<Scalar>>,
    /// The zero ladder: `Z[0] = 0`, `Z[k] = Poseidon([Z[k-1], Z[k-1]])`
    zero_ladder: [Scalar; WHITELIST_HEIGHT + 1],
    /// The depth of the dense subtree
    dense_depth: usize,
    /// The number of real (non-padding) members
    n_members: usize,
    /// The root at the fixed tree height
    root: Scalar,
}

impl WhitelistTree {
    /// Build a tree over the given ordered participant identifiers
    pub fn new(ids: &[Scalar]) -> Self {
        let n_members = ids.len();
        let zero = Scalar::from(0u8);

        // Hash each identifier into its leaf
        let mut leaves: Vec<Scalar> =
            ids.iter().map(|id| compute_poseidon_hash(&[*id])).collect();

        // The dense depth is the least d such that 2^d >= max(len, 2)
        let mut dense_depth = 1;
        while (1usize << dense_depth) < leaves.len() {
            dense_depth += 1;
        }

        let mut zero_ladder = [zero; WHITELIST_HEIGHT + 1];
        for k in 1..=WHITELIST_HEIGHT {
            zero_ladder[k] =
                compute_poseidon_hash(&[zero_ladder[k - 1], zero_ladder[k - 1]]);
        }

        // Pad with zero leaves and hash the dense levels pairwise
        leaves.resize(1 << dense_depth, zero);
        let mut levels = vec![leaves];
        for k in 0..dense_depth {
            let next = levels[k]
                .chunks(2)
                .map(|pair| compute_poseidon_hash(&[pair[0], pair[1]]))
                .collect();
            levels.push(next);
        }

        // Extend the dense root to the fixed height; the zero subtree is
        // always the right sibling
        let mut root = levels[dense_depth][0];
        for ladder_node in zero_ladder.iter().take(WHITELIST_HEIGHT).skip(dense_depth) {
            root = compute_poseidon_hash(&[root, *ladder_node]);
        }

        Self { levels, zero_ladder, dense_depth, n_members, root }
    }

    // -----------
    // | Getters |
    // -----------

    /// The root of the tree at the fixed height
    pub fn root(&self) -> Scalar {
        self.root
    }

    /// The number of registered members, excluding padding
    pub fn n_members(&self) -> usize {
        self.n_members
    }

    /// The hashed leaf at the given index, if it belongs to a member
    pub fn leaf(&self, index: usize) -> Option<Scalar> {
        if index >= self.n_members {
            return None;
        }
        Some(self.levels[0][index])
    }

    // ------------
    // | Openings |
    // ------------

    /// Produce the inclusion opening for the member at the given leaf index
    pub fn opening(&self, index: usize) -> Option<MerkleOpening> {
        if index >= self.n_members {
            return None;
        }

        let zero = Scalar::from(0u8);
        let one = Scalar::from(1u8);
        let mut elems = [zero; WHITELIST_HEIGHT];
        let mut indices = [zero; WHITELIST_HEIGHT];

        // Walk the dense subtree recording real siblings and positions
        let mut node = index;
        for k in 0..self.dense_depth {
            elems[k] = self.levels[k][node ^ 1];
            indices[k] = if node & 1 == 1 { one } else { zero };
            node >>= 1;
        }

        // The padded levels always extend to the right with ladder nodes
        for k in self.dense_depth..WHITELIST_HEIGHT {
            elems[k] = self.zero_ladder[k];
        }

        Some(MerkleOpening { elems, indices })
    }
}

/// Verify an opening against a leaf and an expected root
///
/// Total and decidable in `WHITELIST_HEIGHT` hash invocations
pub fn verify_opening(leaf: Scalar, opening: &MerkleOpening, root: Scalar) -> bool {
    let one = Scalar::from(1u8);

    let mut current = leaf;
    for k in 0..WHITELIST_HEIGHT {
        current = if opening.indices[k] == one {
            compute_poseidon_hash(&[opening.elems[k], current])
        } else {
            compute_poseidon_hash(&[current, opening.elems[k]])
        };
    }

    current == root
}

#[cfg(test)]
mod whitelist_tree_tests {
    use ark_ff::UniformRand;
    use itertools::Itertools;
    use rand::thread_rng;

    use super::*;

    /// Draw `n` random participant identifiers
    fn random_ids(n: usize) -> Vec<Scalar> {
        let mut rng = thread_rng();
        (0..n).map(|_| Scalar::rand(&mut rng)).collect_vec()
    }

    /// Tests that every member's opening verifies, across tree sizes
    #[test]
    fn test_openings_verify_for_all_members() {
        for n in 1..=8 {
            let ids = random_ids(n);
            let tree = WhitelistTree::new(&ids);

            for index in 0..n {
                let leaf = tree.leaf(index).unwrap();
                let opening = tree.opening(index).unwrap();
                assert!(
                    verify_opening(leaf, &opening, tree.root()),
                    "opening failed for member {index} of {n}"
                );
            }
        }
    }

    /// Tests that out-of-range indices yield no opening
    #[test]
    fn test_opening_out_of_range() {
        let tree = WhitelistTree::new(&random_ids(3));
        assert!(tree.opening(3).is_none());
        assert!(tree.leaf(3).is_none());
    }

    /// Tests that leaves are the Poseidon hash of the identifier
    #[test]
    fn test_leaf_is_hashed_identifier() {
        let ids = random_ids(2);
        let tree = WhitelistTree::new(&ids);

        assert_eq!(tree.leaf(0).unwrap(), compute_poseidon_hash(&[ids[0]]));
        assert_eq!(tree.leaf(1).unwrap(), compute_poseidon_hash(&[ids[1]]));
    }

    /// Tests that a forged leaf fails verification
    #[test]
    fn test_wrong_leaf_fails_verification() {
        let mut rng = thread_rng();
        let tree = WhitelistTree::new(&random_ids(4));

        let opening = tree.opening(0).unwrap();
        let forged_leaf = Scalar::rand(&mut rng);
        assert!(!verify_opening(forged_leaf, &opening, tree.root()));
    }

    /// Tests that a foreign root fails verification
    #[test]
    fn test_wrong_root_fails_verification() {
        let mut rng = thread_rng();
        let tree = WhitelistTree::new(&random_ids(4));

        let leaf = tree.leaf(1).unwrap();
        let opening = tree.opening(1).unwrap();
        assert!(!verify_opening(leaf, &opening, Scalar::rand(&mut rng)));
    }

    /// Tests that a single member pads against a zero sibling
    #[test]
    fn test_singleton_tree_pads_to_pair() {
        // A single member still builds a depth >= 1 dense subtree with a
        // zero sibling
        let ids = random_ids(1);
        let tree = WhitelistTree::new(&ids);

        let opening = tree.opening(0).unwrap();
        assert_eq!(opening.elems[0], Scalar::from(0u8));
        assert!(verify_opening(tree.leaf(0).unwrap(), &opening, tree.root()));
    }

    /// Tests that rebuilding never invalidates an old snapshot
    #[test]
    fn test_rebuild_leaves_old_snapshot_valid() {
        let ids = random_ids(3);
        let original = WhitelistTree::new(&ids);
        let original_root = original.root();
        let opening = original.opening(1).unwrap();

        // Rebuild with an extra member; the original snapshot's opening
        // must still verify against the original root
        let mut grown = ids.clone();
        grown.extend(random_ids(1));
        let rebuilt = WhitelistTree::new(&grown);

        assert_ne!(rebuilt.root(), original_root);
        assert!(verify_opening(original.leaf(1).unwrap(), &opening, original_root));
    }

    /// Tests a dense tree with no padding leaves
    #[test]
    fn test_power_of_two_membership() {
        // Exactly 2^k members leaves no padding in the dense subtree
        let ids = random_ids(4);
        let tree = WhitelistTree::new(&ids);

        for index in 0..4 {
            let opening = tree.opening(index).unwrap();
            assert!(verify_opening(tree.leaf(index).unwrap(), &opening, tree.root()));
        }
    }
}
