//! The proof manager manages a job queue of settlement proof requests and
//! schedules them onto a bounded thread pool
//!
//! Per-match steps are strictly sequential (the settlement coordinator
//! awaits each response); ordering across different matches is irrelevant,
//! so the pool drains the queue concurrently

use std::{sync::Arc, thread::JoinHandle};

use common::{
    types::{MatchResult, SettlementProofBundle},
    CancelChannel,
};
use constants::Scalar;
use job_types::proof_manager::{ProofJob, ProofManagerJob, ProofManagerReceiver};
use rayon::ThreadPool;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use umbra_crypto::{
    commitments::{compute_asset_hash, compute_nullifier, compute_order_commitment},
    merkle::{verify_opening, MerkleOpening},
};

use crate::{
    encoding::{encode_proof, encode_public_signals},
    error::ProofManagerError,
    prover::SettlementProver,
    witness::build_settlement_witness,
};

/// Error message when sending a proof response fails
const ERR_SENDING_RESPONSE: &str = "error sending proof response, channel closed";

// --------------------
// | Proof Generation |
// --------------------

/// The proof manager provides a messaging interface and implementation for
/// proving settlement statements about matched pairs
pub struct ProofManager {
    /// The queue on which the proof manager receives new jobs
    pub(crate) job_queue: Option<ProofManagerReceiver>,
    /// The handle of the main driver thread in the proof generation module
    pub(crate) join_handle: Option<JoinHandle<ProofManagerError>>,
    /// The threadpool of workers generating proofs for the system
    pub(crate) thread_pool: Arc<ThreadPool>,
    /// The prover over the settlement circuit artifacts
    pub(crate) prover: Arc<dyn SettlementProver>,
    /// The channel on which a coordinator may cancel execution
    pub(crate) cancel_channel: CancelChannel,
}

impl ProofManager {
    /// The execution loop blocks on the job queue then schedules proof
    /// generation jobs onto the thread pool
    pub(crate) fn execution_loop(
        job_queue: ProofManagerReceiver,
        thread_pool: Arc<ThreadPool>,
        prover: Arc<dyn SettlementProver>,
        cancel_channel: CancelChannel,
    ) -> Result<(), ProofManagerError> {
        loop {
            // Check the cancel channel before blocking on a job
            if cancel_channel
                .has_changed()
                .map_err(|err| ProofManagerError::Cancelled(err.to_string()))?
            {
                info!("proof manager cancelled, shutting down...");
                return Err(ProofManagerError::Cancelled(
                    "received cancel signal".to_string(),
                ));
            }

            // Dequeue the next job and hand it to the thread pool
            let job = job_queue
                .recv()
                .map_err(|err| ProofManagerError::JobQueueClosed(err.to_string()))?;

            let prover_clone = prover.clone();
            thread_pool.spawn(move || {
                if let Err(e) = Self::handle_proof_job(job, prover_clone) {
                    error!("error handling proof manager job: {e}");
                }
            });
        }
    }

    /// The main job handler, run by a thread in the pool
    fn handle_proof_job(
        job: ProofManagerJob,
        prover: Arc<dyn SettlementProver>,
    ) -> Result<(), ProofManagerError> {
        let ProofJob::SettlementProof {
            match_result,
            buyer_id_hash,
            seller_id_hash,
            buyer_opening,
            seller_opening,
            whitelist_root,
        } = job.type_;

        let res = Self::prove_settlement(
            prover.as_ref(),
            &match_result,
            buyer_id_hash,
            seller_id_hash,
            &buyer_opening,
            &seller_opening,
            whitelist_root,
        )
        .map_err(|err| err.to_string());

        job.response_channel
            .send(res)
            .map_err(|_| ProofManagerError::Response(ERR_SENDING_RESPONSE.to_string()))
    }

    /// Prove that a matched pair is consistent with its commitments and that
    /// both counterparties are whitelist members
    pub(crate) fn prove_settlement(
        prover: &dyn SettlementProver,
        match_result: &MatchResult,
        buyer_id_hash: Scalar,
        seller_id_hash: Scalar,
        buyer_opening: &MerkleOpening,
        seller_opening: &MerkleOpening,
        whitelist_root: Scalar,
    ) -> Result<SettlementProofBundle, ProofManagerError> {
        let buy = &match_result.buy_order;
        let sell = &match_result.sell_order;
        let match_id = &match_result.match_id;

        // Consistency checks: the matcher guarantees these under the
        // exact-quantity policy; a violated price equality means the
        // commitments were bound to different values than the public
        // execution price and the circuit will reject the witness
        if match_result.execution_price != buy.price
            || match_result.execution_price != sell.price
        {
            warn!(
                "match {match_id} crosses prices ({} / {}); commitments bind the originals",
                buy.price, sell.price,
            );
        }
        if match_result.execution_quantity != buy.quantity
            || match_result.execution_quantity != sell.quantity
        {
            warn!("match {match_id} quantity diverges from its orders");
        }

        // Both counterparties must open into the whitelist snapshot
        if !verify_opening(buyer_id_hash, buyer_opening, whitelist_root) {
            return Err(ProofManagerError::MerkleVerification(format!(
                "buyer opening does not verify for match {match_id}"
            )));
        }
        if !verify_opening(seller_id_hash, seller_opening, whitelist_root) {
            return Err(ProofManagerError::MerkleVerification(format!(
                "seller opening does not verify for match {match_id}"
            )));
        }

        // Reproduce both commitments from the public execution values; an
        // irreproducible commitment is exactly what the circuit would
        // reject, surfaced here before burning prover time
        let asset_hash = compute_asset_hash(&buy.asset_address);
        let expected_buy = compute_order_commitment(
            asset_hash,
            buy.side.to_u8(),
            match_result.execution_quantity,
            match_result.execution_price,
            buy.nonce,
            buy.secret,
        );
        if expected_buy != buy.commitment {
            return Err(ProofManagerError::CommitmentMismatch(format!(
                "buy commitment for match {match_id} is not reproducible from the matched parameters"
            )));
        }
        let expected_sell = compute_order_commitment(
            asset_hash,
            sell.side.to_u8(),
            match_result.execution_quantity,
            match_result.execution_price,
            sell.nonce,
            sell.secret,
        );
        if expected_sell != sell.commitment {
            return Err(ProofManagerError::CommitmentMismatch(format!(
                "sell commitment for match {match_id} is not reproducible from the matched parameters"
            )));
        }

        let nullifier = compute_nullifier(
            buy.commitment,
            sell.commitment,
            match_result.execution_quantity,
            buy.secret,
            sell.secret,
        );

        let witness = build_settlement_witness(
            match_result,
            asset_hash,
            buyer_id_hash,
            seller_id_hash,
            buyer_opening,
            seller_opening,
            whitelist_root,
        );
        let (proof, public_signals) = prover.prove(witness)?;

        // The nullifier is the circuit's output signal; cross-check it
        // against the local derivation
        if let Some(output) = public_signals.last() {
            if *output != nullifier {
                warn!("match {match_id}: circuit nullifier differs from local derivation");
            }
        }

        let proof_bytes = encode_proof(&proof);
        let public_signals_bytes = encode_public_signals(&public_signals);
        let proof_hash = hex::encode(Sha256::digest(&proof_bytes));

        Ok(SettlementProofBundle {
            proof_bytes,
            public_signals: public_signals_bytes,
            nullifier,
            proof_hash,
        })
    }
}
