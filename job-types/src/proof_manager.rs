//! Defines job types that may be enqueued for the proof generation module

use common::types::{MatchResult, SettlementProofBundle};
use constants::Scalar;
use crossbeam::channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;
use umbra_crypto::merkle::MerkleOpening;

/// The queue type on which proof jobs are sent
pub type ProofManagerQueue = Sender<ProofManagerJob>;
/// The receiver type for the proof manager's job queue
pub type ProofManagerReceiver = Receiver<ProofManagerJob>;

/// Create a new proof manager queue and receiver
pub fn new_proof_manager_queue() -> (ProofManagerQueue, ProofManagerReceiver) {
    unbounded()
}

/// The channel on which the proof manager responds to a job
///
/// Errors cross the channel as strings; the settlement coordinator converts
/// them into a typed state transition
pub type ProofResponseChannel = oneshot::Sender<Result<SettlementProofBundle, String>>;

/// Represents a job enqueued in the proof manager's work queue
#[derive(Debug)]
pub struct ProofManagerJob {
    /// The type of job being requested
    pub type_: ProofJob,
    /// The response channel to send the proof back along
    pub response_channel: ProofResponseChannel,
}

/// The job type and parameterization
#[derive(Clone, Debug)]
pub enum ProofJob {
    /// A request to prove that a matched pair is consistent with its
    /// commitments and that both counterparties are whitelist members
    SettlementProof {
        /// The match to prove
        match_result: MatchResult,
        /// The buyer's hashed identifier (whitelist leaf)
        buyer_id_hash: Scalar,
        /// The seller's hashed identifier (whitelist leaf)
        seller_id_hash: Scalar,
        /// The buyer's whitelist inclusion opening
        buyer_opening: MerkleOpening,
        /// The seller's whitelist inclusion opening
        seller_opening: MerkleOpening,
        /// The root the openings verify against
        whitelist_root: Scalar,
    },
}
