//! Cryptographic primitives for the dark pool core
//!
//! Covers scalar field helpers, Poseidon hashing parameterized identically
//! to the settlement circuit's hash gadget, the order commitment scheme
//! with its nullifier derivation, and the compliance whitelist Merkle tree

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod commitments;
pub mod fields;
pub mod hash;
pub mod merkle;
