//! The per-match settlement actor
//!
//! Each actor owns one match's state machine end to end. Proof results,
//! signatures, and sink callbacks all arrive as typed messages through the
//! actor's mailbox, so transitions are serialized by construction. Exactly
//! one terminal transition occurs per match

use std::{sync::Arc, time::Duration};

use common::types::{
    now_millis, MatchResult, SettlementPacket, SettlementProofBundle, SettlementRecord,
    SettlementStatus, SignatureRole,
};
use external_api::bus_message::{publish_event, SystemBusMessage};
use job_types::{
    proof_manager::{ProofJob, ProofManagerJob, ProofManagerQueue},
    settlement_manager::SignatureStatus,
};
use state::State;
use system_bus::SystemBus;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::sink::{SettlementSink, SinkError};

/// The failure reason recorded when the rendezvous deadline passes
const ERR_SIGNATURE_TIMEOUT: &str = "signature-timeout";

/// The retry policy for transient on-chain submission errors
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// The initial backoff in milliseconds
    pub initial_backoff_ms: u64,
    /// The multiplicative increase applied after each failed attempt
    pub backoff_factor: u32,
    /// The maximum number of submission attempts
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { initial_backoff_ms: 1_000, backoff_factor: 2, max_attempts: 5 }
    }
}

/// A typed message delivered to a settlement actor's mailbox
#[derive(Debug)]
pub enum SettlementMessage {
    /// The proof worker produced a settlement proof
    ProofGenerated(Box<SettlementProofBundle>),
    /// The proof worker rejected the match
    ProofFailed(String),
    /// One counterparty submitted a signature
    Signature {
        /// The signer's role
        role: SignatureRole,
        /// The signature over the settlement intent
        signature: String,
        /// The channel to respond on with the rendezvous state
        response_channel: oneshot::Sender<Result<SignatureStatus, String>>,
    },
    /// The sink confirmed the settlement on-chain
    Confirmed {
        /// The confirming transaction's hash
        tx_hash: String,
    },
    /// The sink failed the settlement permanently
    Failed {
        /// The failure reason
        error: String,
    },
}

/// The mailbox sender handle for a settlement actor
pub type SettlementMailbox = mpsc::UnboundedSender<SettlementMessage>;

/// The actor driving one match's settlement
pub struct SettlementActor {
    /// The match being settled
    match_result: MatchResult,
    /// The actor's mailbox
    mailbox: mpsc::UnboundedReceiver<SettlementMessage>,
    /// A sender onto the actor's own mailbox, handed to spawned sub-tasks
    self_sender: SettlementMailbox,
    /// The proof manager's job queue
    proof_queue: ProofManagerQueue,
    /// The settlement sink
    sink: Arc<dyn SettlementSink>,
    /// A handle on the global state; the actor is the record's sole mutator
    state: State,
    /// The system bus for lifecycle events
    bus: SystemBus<SystemBusMessage>,
    /// The signature rendezvous deadline, absolute milliseconds
    deadline_ms: u64,
    /// The retry policy for transient sink errors
    retry_policy: RetryPolicy,
    /// The actor's mirror of the record status
    status: SettlementStatus,
}

impl SettlementActor {
    /// Create an actor and its mailbox handle
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        match_result: MatchResult,
        proof_queue: ProofManagerQueue,
        sink: Arc<dyn SettlementSink>,
        state: State,
        bus: SystemBus<SystemBusMessage>,
        signature_timeout_ms: Option<u64>,
        retry_policy: RetryPolicy,
    ) -> (Self, SettlementMailbox) {
        let (self_sender, mailbox) = mpsc::unbounded_channel();

        // The deadline defaults to the earliest order expiry
        let deadline_ms = signature_timeout_ms
            .map(|timeout| now_millis() + timeout)
            .unwrap_or_else(|| match_result.earliest_expiry());

        let actor = Self {
            match_result,
            mailbox,
            self_sender: self_sender.clone(),
            proof_queue,
            sink,
            state,
            bus,
            deadline_ms,
            retry_policy,
            status: SettlementStatus::Matched,
        };
        (actor, self_sender)
    }

    /// Drive the match to its terminal state
    pub async fn run(mut self) {
        let match_id = self.match_result.match_id.clone();
        info!(match_id = %match_id, "starting settlement actor");

        self.begin_proving();

        // The deadline only binds until both signatures land
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.deadline_ms.saturating_sub(now_millis()));
        let timeout = tokio::time::sleep_until(deadline);
        tokio::pin!(timeout);

        while !self.status.is_terminal() {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(msg) => self.handle_message(msg),
                    // All senders dropped mid-flight; treat as shutdown
                    None => break,
                },
                () = &mut timeout, if self.awaiting_signatures() => {
                    warn!(match_id = %match_id, "signature rendezvous timed out");
                    self.fail(ERR_SIGNATURE_TIMEOUT.to_string());
                },
            }
        }

        info!(match_id = %match_id, status = %self.status, "settlement actor finished");
    }

    /// Whether the actor is still collecting signatures
    fn awaiting_signatures(&self) -> bool {
        matches!(
            self.status,
            SettlementStatus::Matched
                | SettlementStatus::Proving
                | SettlementStatus::AwaitingSignatures
                | SettlementStatus::PartiallySigned
        )
    }

    // ---------------------
    // | Message Handling |
    // ---------------------

    /// Dispatch a mailbox message against the current state
    fn handle_message(&mut self, message: SettlementMessage) {
        match message {
            SettlementMessage::ProofGenerated(bundle) => self.handle_proof_generated(*bundle),
            SettlementMessage::ProofFailed(error) => self.handle_proof_failed(error),
            SettlementMessage::Signature { role, signature, response_channel } => {
                let res = self.handle_signature(role, signature);
                let _ = response_channel.send(res);
            },
            SettlementMessage::Confirmed { tx_hash } => self.handle_confirmed(tx_hash),
            SettlementMessage::Failed { error } => self.fail(error),
        }
    }

    /// Transition into `Proving` and dispatch the proof job
    fn begin_proving(&mut self) {
        self.transition(SettlementStatus::Proving, |_| {});
        publish_event(
            &self.bus,
            SystemBusMessage::ProofGenerating {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                timestamp: now_millis(),
            },
        );

        // Resolve both parties' openings against the whitelist snapshot
        // observed now; the snapshot is immutable for the actor's lifetime
        let whitelist = self.state.whitelist();
        let buy = &self.match_result.buy_order;
        let sell = &self.match_result.sell_order;

        let buyer_leaf = whitelist.id_hash(buy.whitelist_index);
        let seller_leaf = whitelist.id_hash(sell.whitelist_index);
        let buyer_opening = whitelist.opening(buy.whitelist_index);
        let seller_opening = whitelist.opening(sell.whitelist_index);

        let (buyer_id_hash, buyer_opening, seller_id_hash, seller_opening) =
            match (buyer_leaf, buyer_opening, seller_leaf, seller_opening) {
                (Some(bl), Some(bo), Some(sl), Some(so)) => (bl, bo, sl, so),
                _ => {
                    let _ = self.self_sender.send(SettlementMessage::ProofFailed(
                        "merkle verification failed: whitelist index out of range".to_string(),
                    ));
                    return;
                },
            };

        let (response_tx, response_rx) = oneshot::channel();
        let job = ProofManagerJob {
            type_: ProofJob::SettlementProof {
                match_result: self.match_result.clone(),
                buyer_id_hash,
                seller_id_hash,
                buyer_opening,
                seller_opening,
                whitelist_root: whitelist.root(),
            },
            response_channel: response_tx,
        };

        if self.proof_queue.send(job).is_err() {
            let _ = self
                .self_sender
                .send(SettlementMessage::ProofFailed("proof worker pool is down".to_string()));
            return;
        }

        // Forward the proof response into the mailbox so it serializes with
        // signatures and the deadline
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            let message = match response_rx.await {
                Ok(Ok(bundle)) => SettlementMessage::ProofGenerated(Box::new(bundle)),
                Ok(Err(error)) => SettlementMessage::ProofFailed(error),
                Err(_) => {
                    SettlementMessage::ProofFailed("proof worker dropped the job".to_string())
                },
            };
            let _ = sender.send(message);
        });
    }

    /// Record a generated proof and open the signature rendezvous
    fn handle_proof_generated(&mut self, bundle: SettlementProofBundle) {
        if self.status != SettlementStatus::Proving {
            return;
        }

        let nullifier = bundle.nullifier;
        let proof_hash = bundle.proof_hash.clone();
        self.transition(SettlementStatus::AwaitingSignatures, move |record| {
            record.nullifier = Some(nullifier);
            record.proof_bytes = Some(bundle.proof_bytes);
            record.public_signals = Some(bundle.public_signals);
        });

        publish_event(
            &self.bus,
            SystemBusMessage::ProofGenerated {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                proof_hash,
                timestamp: now_millis(),
            },
        );
    }

    /// Terminally fail the match on a rejected proof
    fn handle_proof_failed(&mut self, error: String) {
        if self.status != SettlementStatus::Proving {
            return;
        }

        self.transition(SettlementStatus::Failed, {
            let error = error.clone();
            move |record| record.error = Some(error)
        });
        publish_event(
            &self.bus,
            SystemBusMessage::ProofFailed {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                error,
                timestamp: now_millis(),
            },
        );
    }

    /// Fill one signature slot; idempotent per role
    fn handle_signature(
        &mut self,
        role: SignatureRole,
        signature: String,
    ) -> Result<SignatureStatus, String> {
        let match_id = self.match_result.match_id.clone();
        match self.status {
            SettlementStatus::AwaitingSignatures | SettlementStatus::PartiallySigned => {},
            SettlementStatus::Matched | SettlementStatus::Proving => {
                return Err(format!("proof not yet generated for match {match_id}"));
            },
            _ => return Err(format!("match {match_id} is no longer accepting signatures")),
        }

        let record = self
            .state
            .settlement_record(&match_id)
            .ok_or_else(|| format!("no settlement record for match {match_id}"))?;

        // A duplicate submission for an already-filled slot is a no-op
        let already_signed = match role {
            SignatureRole::Buyer => record.buyer_signed,
            SignatureRole::Seller => record.seller_signed,
        };
        if already_signed {
            return Ok(SignatureStatus {
                buyer_signed: record.buyer_signed,
                seller_signed: record.seller_signed,
            });
        }

        let (buyer_signed, seller_signed) = match role {
            SignatureRole::Buyer => (true, record.seller_signed),
            SignatureRole::Seller => (record.buyer_signed, true),
        };
        let both_signed = buyer_signed && seller_signed;

        let next_status = if both_signed {
            SettlementStatus::SignaturesComplete
        } else {
            SettlementStatus::PartiallySigned
        };
        self.transition(next_status, {
            let signature = signature.clone();
            move |record| match role {
                SignatureRole::Buyer => {
                    record.buyer_signed = true;
                    record.buyer_signature = Some(signature);
                },
                SignatureRole::Seller => {
                    record.seller_signed = true;
                    record.seller_signature = Some(signature);
                },
            }
        });

        let signer = match role {
            SignatureRole::Buyer => self.match_result.buyer().to_string(),
            SignatureRole::Seller => self.match_result.seller().to_string(),
        };
        publish_event(
            &self.bus,
            SystemBusMessage::SignatureAdded {
                match_id: match_id.clone(),
                signer,
                role,
                buyer_signed,
                seller_signed,
                timestamp: now_millis(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
            },
        );

        if both_signed {
            publish_event(
                &self.bus,
                SystemBusMessage::SignatureComplete {
                    match_id,
                    buyer_address: self.match_result.buyer().to_string(),
                    seller_address: self.match_result.seller().to_string(),
                    timestamp: now_millis(),
                },
            );
            self.submit_to_sink();
        }

        Ok(SignatureStatus { buyer_signed, seller_signed })
    }

    /// Assemble the settlement packet and hand it to the sink with retry
    fn submit_to_sink(&mut self) {
        let record = match self.state.settlement_record(&self.match_result.match_id) {
            Some(record) => record,
            None => {
                self.fail("settlement record disappeared".to_string());
                return;
            },
        };

        // All of these were set on the proof and signature transitions
        let packet = match (
            record.proof_bytes,
            record.public_signals,
            record.nullifier,
            record.buyer_signature,
            record.seller_signature,
        ) {
            (Some(proof_bytes), Some(public_signals), Some(nullifier), Some(b), Some(s)) => {
                SettlementPacket {
                    match_id: record.match_id,
                    proof_bytes,
                    public_signals,
                    nullifier,
                    buyer_signature: b,
                    seller_signature: s,
                }
            },
            _ => {
                self.fail("settlement packet is incomplete".to_string());
                return;
            },
        };

        self.transition(SettlementStatus::QueuedOnChain, |_| {});
        publish_event(
            &self.bus,
            SystemBusMessage::SettlementQueued {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                timestamp: now_millis(),
            },
        );

        let sink = self.sink.clone();
        let sender = self.self_sender.clone();
        let policy = self.retry_policy;
        tokio::spawn(async move {
            let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
            let mut attempt = 0;

            loop {
                attempt += 1;
                match sink.submit_settlement(&packet).await {
                    Ok(tx_hash) => {
                        let _ = sender.send(SettlementMessage::Confirmed { tx_hash });
                        return;
                    },
                    Err(SinkError::Transient(e)) if attempt < policy.max_attempts => {
                        warn!(
                            match_id = %packet.match_id,
                            "transient submission error (attempt {attempt}): {e}; retrying",
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= policy.backoff_factor;
                    },
                    Err(SinkError::Transient(e)) => {
                        let _ = sender.send(SettlementMessage::Failed {
                            error: format!(
                                "submission still failing after {attempt} attempts: {e}"
                            ),
                        });
                        return;
                    },
                    Err(SinkError::Terminal(e)) => {
                        let _ = sender.send(SettlementMessage::Failed { error: e });
                        return;
                    },
                }
            }
        });
    }

    /// Record an on-chain confirmation
    fn handle_confirmed(&mut self, tx_hash: String) {
        if self.status != SettlementStatus::QueuedOnChain {
            return;
        }

        // The transaction was built and accepted; surface both milestones
        publish_event(
            &self.bus,
            SystemBusMessage::SettlementTxBuilt {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                tx_hash: tx_hash.clone(),
                timestamp: now_millis(),
            },
        );

        self.transition(SettlementStatus::Confirmed, {
            let tx_hash = tx_hash.clone();
            move |record| record.tx_hash = Some(tx_hash)
        });
        publish_event(
            &self.bus,
            SystemBusMessage::SettlementConfirmed {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                tx_hash,
                timestamp: now_millis(),
            },
        );
    }

    /// Take the single terminal failure transition
    fn fail(&mut self, error: String) {
        if self.status.is_terminal() {
            return;
        }

        self.transition(SettlementStatus::Failed, {
            let error = error.clone();
            move |record| record.error = Some(error)
        });
        publish_event(
            &self.bus,
            SystemBusMessage::SettlementFailed {
                match_id: self.match_result.match_id.clone(),
                buyer_address: self.match_result.buyer().to_string(),
                seller_address: self.match_result.seller().to_string(),
                error,
                timestamp: now_millis(),
            },
        );
    }

    /// Apply a status transition plus a record mutation atomically
    fn transition<F>(&mut self, status: SettlementStatus, update: F)
    where
        F: FnOnce(&mut SettlementRecord),
    {
        self.status = status;
        self.state.update_settlement_record(&self.match_result.match_id, |record| {
            record.status = status;
            update(record);
        });
    }
}
