//! The proof generation worker handles the core of producing Groth16
//! settlement proofs for matched pairs
//!
//! A bounded pool of workers drains the job queue; each job marshals a
//! witness for the settlement circuit, invokes the prover over the
//! out-of-band artifacts (WASM witness generator plus proving key), and
//! encodes the proof and public signals for the on-chain verifier

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod encoding;
pub mod error;
pub mod proof_manager;
pub mod prover;
pub mod witness;
pub mod worker;
