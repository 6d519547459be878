//! Defines job types that may be enqueued for the matching engine
//!
//! All book mutations flow through these jobs so that price-time ordering
//! and claim semantics stay race-free on the engine's single thread

use common::types::{BookSnapshot, MatchResult, PrivateOrder};
use crossbeam::channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;

/// The queue type on which matching engine jobs are sent
pub type MatchingEngineQueue = Sender<MatchingEngineJob>;
/// The receiver type for the matching engine's job queue
pub type MatchingEngineReceiver = Receiver<MatchingEngineJob>;

/// Create a new matching engine queue and receiver
pub fn new_matching_engine_queue() -> (MatchingEngineQueue, MatchingEngineReceiver) {
    unbounded()
}

/// The channel on which the engine responds to an order submission
pub type OrderSubmissionResponse = oneshot::Sender<OrderSubmissionResult>;

/// The outcome of an order submission
#[derive(Debug)]
pub struct OrderSubmissionResult {
    /// Any matches struck by the submission
    pub matches: Vec<MatchResult>,
    /// A snapshot of the asset's book after the submission
    pub book_snapshot: BookSnapshot,
    /// A structured reason populated when counterparties exist but no
    /// exact-quantity match was found
    pub no_match_reason: Option<String>,
}

/// Represents a job enqueued in the matching engine's work queue
#[derive(Debug)]
pub enum MatchingEngineJob {
    /// Ingest a new order, attempt matching on its asset, and respond with
    /// the submission outcome
    SubmitOrder {
        /// The validated order to ingest; the engine assigns its timestamp
        order: PrivateOrder,
        /// The channel to respond on
        response_channel: OrderSubmissionResponse,
    },
    /// Sweep expired orders off every book
    ExpireOrders {
        /// The timestamp to evaluate expiries against, in milliseconds
        now_ms: u64,
    },
}
