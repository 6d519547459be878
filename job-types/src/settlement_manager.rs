//! Defines job types that may be enqueued for the settlement manager

use common::types::{MatchResult, SignatureRole};
use tokio::sync::{mpsc, oneshot};

/// The queue type on which settlement manager jobs are sent
pub type SettlementManagerQueue = mpsc::UnboundedSender<SettlementManagerJob>;
/// The receiver type for the settlement manager's job queue
pub type SettlementManagerReceiver = mpsc::UnboundedReceiver<SettlementManagerJob>;

/// Create a new settlement manager queue and receiver
pub fn new_settlement_manager_queue() -> (SettlementManagerQueue, SettlementManagerReceiver) {
    mpsc::unbounded_channel()
}

/// The rendezvous state after a signature upload
#[derive(Clone, Copy, Debug)]
pub struct SignatureStatus {
    /// Whether the buyer slot is filled
    pub buyer_signed: bool,
    /// Whether the seller slot is filled
    pub seller_signed: bool,
}

/// Represents a job enqueued in the settlement manager's work queue
#[derive(Debug)]
pub enum SettlementManagerJob {
    /// Drive a freshly struck match through its settlement lifecycle
    NewMatch {
        /// The match to settle
        match_result: MatchResult,
    },
    /// Record one party's signature over a settlement intent
    ///
    /// Idempotent per role; a signature for an unknown match or a role the
    /// sender does not hold is rejected
    SubmitSignature {
        /// The match being signed
        match_id: String,
        /// The signer's role
        role: SignatureRole,
        /// The signature over the settlement intent
        signature: String,
        /// The channel to respond on with the updated rendezvous state
        response_channel: oneshot::Sender<Result<SignatureStatus, String>>,
    },
    /// Drive any matches still sitting in the pending queue; responds with
    /// the number picked up
    ProcessPending {
        /// The channel to respond on
        response_channel: oneshot::Sender<usize>,
    },
}
