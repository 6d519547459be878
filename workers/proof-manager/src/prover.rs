//! Abstracts the Groth16 prover behind a trait so that the execution loop
//! is testable without the multi-second proving path
//!
//! The production implementation consumes the circuit artifacts supplied
//! out of band: `settlement_proof.wasm` (witness generator) and
//! `settlement_proof_final.zkey` (proving key)

use std::{fs::File, path::PathBuf};

use ark_circom::{read_zkey, CircomReduction, WitnessCalculator};
use ark_ff::UniformRand;
use ark_groth16::{Groth16, Proof};
use constants::{Scalar, SystemCurve};
use rand::thread_rng;

use crate::{error::ProofManagerError, witness::WitnessMap};

/// The proving interface over the settlement circuit
///
/// Returns the proof along with the circuit's public signals in witness
/// order; the final signal is the nullifier output
pub trait SettlementProver: Send + Sync {
    /// Generate a proof for the given witness inputs
    fn prove(
        &self,
        witness: WitnessMap,
    ) -> Result<(Proof<SystemCurve>, Vec<Scalar>), ProofManagerError>;
}

/// A Groth16 prover over snarkjs-style circuit artifacts
///
/// The artifacts are parsed per proof; parsing is a small fraction of
/// proving time and keeps the prover handle trivially shareable across the
/// pool
pub struct CircomGroth16Prover {
    /// The path to the WASM witness generator
    wasm_path: PathBuf,
    /// The path to the proving key artifact
    zkey_path: PathBuf,
}

impl CircomGroth16Prover {
    /// Validate the circuit artifacts and build a prover over them
    pub fn new(wasm_path: PathBuf, zkey_path: PathBuf) -> Result<Self, ProofManagerError> {
        // Parse the proving key once up front so a bad artifact fails the
        // worker at startup rather than the first match
        let mut zkey_file = open_zkey(&zkey_path)?;
        read_zkey(&mut zkey_file)
            .map_err(|err| ProofManagerError::Setup(format!("cannot parse zkey: {err}")))?;

        if !wasm_path.exists() {
            return Err(ProofManagerError::Setup(format!(
                "witness generator {} not found",
                wasm_path.display()
            )));
        }

        Ok(Self { wasm_path, zkey_path })
    }
}

/// Open the proving key artifact for reading
fn open_zkey(zkey_path: &PathBuf) -> Result<File, ProofManagerError> {
    File::open(zkey_path).map_err(|err| {
        ProofManagerError::Setup(format!(
            "cannot open proving key {}: {err}",
            zkey_path.display()
        ))
    })
}

impl SettlementProver for CircomGroth16Prover {
    fn prove(
        &self,
        witness: WitnessMap,
    ) -> Result<(Proof<SystemCurve>, Vec<Scalar>), ProofManagerError> {
        let mut zkey_file = open_zkey(&self.zkey_path)
            .map_err(|err| ProofManagerError::Prover(err.to_string()))?;
        let (proving_key, matrices) = read_zkey(&mut zkey_file)
            .map_err(|err| ProofManagerError::Prover(err.to_string()))?;

        let mut store = wasmer::Store::default();
        let mut calculator = WitnessCalculator::new(&mut store, &self.wasm_path)
            .map_err(|err| ProofManagerError::Prover(err.to_string()))?;
        let full_assignment = calculator
            .calculate_witness_element::<Scalar, _>(&mut store, witness, false /* sanity_check */)
            .map_err(|err| ProofManagerError::Prover(err.to_string()))?;

        let mut rng = thread_rng();
        let r = Scalar::rand(&mut rng);
        let s = Scalar::rand(&mut rng);

        let proof =
            Groth16::<SystemCurve, CircomReduction>::create_proof_with_reduction_and_matrices(
                &proving_key,
                r,
                s,
                &matrices,
                matrices.num_instance_variables,
                matrices.num_constraints,
                full_assignment.as_slice(),
            )
            .map_err(|err| ProofManagerError::Prover(err.to_string()))?;

        // The instance variables follow the constant-one wire; the circuit
        // orders outputs first, so the nullifier is the final entry
        let public_signals =
            full_assignment[1..matrices.num_instance_variables].to_vec();

        Ok((proof, public_signals))
    }
}

/// Prover mocks for testing the execution loop without circuit artifacts
#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use ark_bn254::{G1Affine, G2Affine};
    use ark_ec::AffineRepr;
    use umbra_crypto::fields::biguint_to_scalar;

    use super::*;

    /// A prover that echoes the witness's public signals under a fixed
    /// generator proof, or fails with a configured error
    pub struct MockProver {
        /// An error to fail every proof with, if set
        pub failure: Option<String>,
    }

    impl SettlementProver for MockProver {
        fn prove(
            &self,
            witness: WitnessMap,
        ) -> Result<(Proof<SystemCurve>, Vec<Scalar>), ProofManagerError> {
            if let Some(err) = &self.failure {
                return Err(ProofManagerError::Prover(err.clone()));
            }

            let proof = Proof {
                a: G1Affine::generator(),
                b: G2Affine::generator(),
                c: G1Affine::generator(),
            };

            // Mirror the circuit's public signal layout from the witness
            let mut signals = Vec::new();
            for name in [
                "buyCommitment",
                "sellCommitment",
                "assetHash",
                "matchedQuantity",
                "executionPrice",
                "whitelistRoot",
            ] {
                let val = witness[name][0].to_biguint().expect("witness values unsigned");
                signals.push(biguint_to_scalar(&val));
            }

            Ok((proof, signals))
        }
    }
}
