//! The settlement manager's routing loop
//!
//! Spawns one actor per match and forwards signature submissions into the
//! owning actor's mailbox; also services the administrative drain of the
//! pending match queue

use std::{collections::HashMap, sync::Arc};

use common::{
    types::{MatchResult, SettlementRecord, SignatureRole},
    CancelChannel,
};
use external_api::bus_message::SystemBusMessage;
use job_types::{
    proof_manager::ProofManagerQueue,
    settlement_manager::{SettlementManagerJob, SettlementManagerReceiver, SignatureStatus},
};
use state::State;
use system_bus::SystemBus;
use tokio::sync::oneshot;
use tracing::info;

use crate::{
    actor::{RetryPolicy, SettlementActor, SettlementMailbox, SettlementMessage},
    error::SettlementManagerError,
    sink::SettlementSink,
};

/// The executor routing settlement jobs to per-match actors
pub struct SettlementExecutor {
    /// The queue on which the executor receives jobs
    job_queue: SettlementManagerReceiver,
    /// The mailbox of each live match actor
    actors: HashMap<String, SettlementMailbox>,
    /// The proof manager's job queue, injected into actors
    proof_queue: ProofManagerQueue,
    /// The settlement sink, injected into actors
    sink: Arc<dyn SettlementSink>,
    /// A handle on the global state
    state: State,
    /// The system bus for lifecycle events
    bus: SystemBus<SystemBusMessage>,
    /// An override of the signature rendezvous deadline, in milliseconds
    /// from match pickup; defaults to the orders' expiry
    signature_timeout_ms: Option<u64>,
    /// The retry policy injected into actors
    retry_policy: RetryPolicy,
    /// The channel on which the coordinator may cancel execution
    cancel_channel: CancelChannel,
}

impl SettlementExecutor {
    /// Construct a new executor
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_queue: SettlementManagerReceiver,
        proof_queue: ProofManagerQueue,
        sink: Arc<dyn SettlementSink>,
        state: State,
        bus: SystemBus<SystemBusMessage>,
        signature_timeout_ms: Option<u64>,
        retry_policy: RetryPolicy,
        cancel_channel: CancelChannel,
    ) -> Self {
        Self {
            job_queue,
            actors: HashMap::new(),
            proof_queue,
            sink,
            state,
            bus,
            signature_timeout_ms,
            retry_policy,
            cancel_channel,
        }
    }

    /// The execution loop: routes jobs until cancelled
    pub async fn run(mut self) -> Result<(), SettlementManagerError> {
        info!("starting settlement executor");
        loop {
            tokio::select! {
                job = self.job_queue.recv() => match job {
                    Some(job) => self.handle_job(job),
                    None => {
                        return Err(SettlementManagerError::JobQueueClosed(
                            "all job senders dropped".to_string(),
                        ));
                    },
                },
                _ = self.cancel_channel.changed() => {
                    info!("settlement manager cancelled, shutting down...");
                    return Err(SettlementManagerError::Cancelled(
                        "received cancel signal".to_string(),
                    ));
                },
            }
        }
    }

    /// Dispatch a single job
    fn handle_job(&mut self, job: SettlementManagerJob) {
        match job {
            SettlementManagerJob::NewMatch { match_result } => {
                self.start_settlement(match_result);
            },
            SettlementManagerJob::SubmitSignature {
                match_id,
                role,
                signature,
                response_channel,
            } => {
                self.route_signature(match_id, role, signature, response_channel);
            },
            SettlementManagerJob::ProcessPending { response_channel } => {
                let n = self.process_pending();
                let _ = response_channel.send(n);
            },
        }
    }

    /// Spawn an actor for a fresh match
    ///
    /// A match that already has a settlement record is being driven
    /// elsewhere and is skipped, so re-delivery is harmless
    fn start_settlement(&mut self, match_result: MatchResult) {
        let match_id = match_result.match_id.clone();
        self.state.remove_pending_match(&match_id);

        if !self.state.create_settlement_record(SettlementRecord::new(&match_result)) {
            return;
        }

        let (actor, mailbox) = SettlementActor::new(
            match_result,
            self.proof_queue.clone(),
            self.sink.clone(),
            self.state.clone(),
            self.bus.clone(),
            self.signature_timeout_ms,
            self.retry_policy,
        );
        tokio::spawn(actor.run());
        self.actors.insert(match_id, mailbox);
    }

    /// Forward a signature submission to the owning actor
    fn route_signature(
        &mut self,
        match_id: String,
        role: SignatureRole,
        signature: String,
        response_channel: oneshot::Sender<Result<SignatureStatus, String>>,
    ) {
        let Some(mailbox) = self.actors.get(&match_id) else {
            let reason = match self.state.settlement_record(&match_id) {
                Some(record) => {
                    format!("match {match_id} is {} and not accepting signatures", record.status)
                },
                None => format!("unknown match {match_id}"),
            };
            let _ = response_channel.send(Err(reason));
            return;
        };

        let message = SettlementMessage::Signature { role, signature, response_channel };
        if let Err(tokio::sync::mpsc::error::SendError(message)) = mailbox.send(message) {
            // The actor reached a terminal state and hung up
            self.actors.remove(&match_id);
            if let SettlementMessage::Signature { response_channel, .. } = message {
                let _ = response_channel
                    .send(Err(format!("match {match_id} is no longer accepting signatures")));
            }
        }
    }

    /// Drive any matches still sitting in the pending queue
    fn process_pending(&mut self) -> usize {
        let pending = self.state.drain_pending_matches();
        let n = pending.len();
        for match_result in pending {
            self.start_settlement(match_result);
        }
        n
    }
}

#[cfg(test)]
mod settlement_tests {
    use std::time::Duration;

    use common::types::{
        mocks::mock_order, now_millis, OrderSide, SettlementProofBundle, SettlementStatus,
        SignatureRole,
    };
    use common::new_cancel_channel;
    use constants::{settlement_topic, Scalar};
    use job_types::{
        proof_manager::new_proof_manager_queue,
        settlement_manager::{new_settlement_manager_queue, SettlementManagerQueue},
    };
    use state::WhitelistSnapshot;
    use system_bus::TopicReader;

    use super::*;
    use crate::sink::{mocks::MockSink, SinkError};

    /// A retry policy fast enough for tests
    const TEST_RETRY: RetryPolicy =
        RetryPolicy { initial_backoff_ms: 10, backoff_factor: 2, max_attempts: 5 };

    /// The test harness around a running settlement executor
    struct Harness {
        /// The job queue into the executor
        queue: SettlementManagerQueue,
        /// The shared state
        state: State,
        /// The system bus
        bus: SystemBus<SystemBusMessage>,
        /// The mock sink
        sink: MockSink,
        /// Held so the executor's cancel channel stays open
        _cancel: tokio::sync::watch::Sender<()>,
    }

    /// Spawn an executor with a fake proof worker that replies with the
    /// given result to every job
    fn spawn_harness(
        proof_response: Result<(), String>,
        signature_timeout_ms: Option<u64>,
        sink: MockSink,
    ) -> Harness {
        let (queue, receiver) = new_settlement_manager_queue();
        let (proof_queue, proof_receiver) = new_proof_manager_queue();
        let state = State::new(WhitelistSnapshot::build(&["Cbuyer".to_string()]));
        let bus = SystemBus::new();
        let (cancel_tx, cancel_rx) = new_cancel_channel();

        // A stand-in proof worker servicing the queue
        std::thread::spawn(move || {
            while let Ok(job) = proof_receiver.recv() {
                let res = match &proof_response {
                    Ok(()) => Ok(SettlementProofBundle {
                        proof_bytes: vec![0u8; 256],
                        public_signals: vec![0u8; 4],
                        nullifier: Scalar::from(7u8),
                        proof_hash: "abcd".to_string(),
                    }),
                    Err(e) => Err(e.clone()),
                };
                let _ = job.response_channel.send(res);
            }
        });

        let executor = SettlementExecutor::new(
            receiver,
            proof_queue,
            Arc::new(sink.clone()),
            state.clone(),
            bus.clone(),
            signature_timeout_ms,
            TEST_RETRY,
            cancel_rx,
        );
        tokio::spawn(async move {
            let _ = executor.run().await;
        });

        Harness { queue, state, bus, sink, _cancel: cancel_tx }
    }

    /// Strike a mock match
    fn mock_match() -> MatchResult {
        let buy = mock_order("buyer", OrderSide::Buy, 100, 50);
        let sell = mock_order("seller", OrderSide::Sell, 100, 50);
        MatchResult::new(buy, sell, now_millis())
    }

    /// Await a record reaching the given status
    async fn wait_for_status(state: &State, match_id: &str, status: SettlementStatus) {
        for _ in 0..500 {
            if state.settlement_record(match_id).map(|r| r.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("record never reached {status}");
    }

    /// Submit a signature through the executor and await the response
    async fn submit_signature(
        queue: &SettlementManagerQueue,
        match_id: &str,
        role: SignatureRole,
    ) -> Result<SignatureStatus, String> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        queue
            .send(SettlementManagerJob::SubmitSignature {
                match_id: match_id.to_string(),
                role,
                signature: format!("sig-{role}"),
                response_channel: tx,
            })
            .unwrap();
        rx.await.unwrap()
    }

    /// Drain the next event frame from a settlement topic reader
    async fn next_event(reader: &mut TopicReader<SystemBusMessage>) -> &'static str {
        tokio::time::timeout(Duration::from_secs(5), reader.next_message())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
            .event_name()
    }

    /// Tests the full rendezvous: proof, both signatures, confirmation
    #[tokio::test]
    async fn test_signature_rendezvous_happy_path() {
        let harness = spawn_harness(Ok(()), None, MockSink::default());
        let res = mock_match();
        let match_id = res.match_id.clone();
        let mut events = harness.bus.subscribe(settlement_topic(&match_id));

        harness.queue.send(SettlementManagerJob::NewMatch { match_result: res }).unwrap();
        wait_for_status(&harness.state, &match_id, SettlementStatus::AwaitingSignatures).await;

        // Buyer signs first
        let status = submit_signature(&harness.queue, &match_id, SignatureRole::Buyer)
            .await
            .unwrap();
        assert!(status.buyer_signed && !status.seller_signed);

        // Duplicate buyer signature is a no-op
        let status = submit_signature(&harness.queue, &match_id, SignatureRole::Buyer)
            .await
            .unwrap();
        assert!(status.buyer_signed && !status.seller_signed);

        // Seller completes the rendezvous
        let status = submit_signature(&harness.queue, &match_id, SignatureRole::Seller)
            .await
            .unwrap();
        assert!(status.buyer_signed && status.seller_signed);

        wait_for_status(&harness.state, &match_id, SettlementStatus::Confirmed).await;
        let record = harness.state.settlement_record(&match_id).unwrap();
        assert!(record.tx_hash.is_some());
        assert_eq!(harness.sink.n_submissions(), 1);

        // The match-scoped channel saw the full lifecycle in order
        assert_eq!(next_event(&mut events).await, "proof:generating");
        assert_eq!(next_event(&mut events).await, "proof:generated");
        assert_eq!(next_event(&mut events).await, "signature:added");
        assert_eq!(next_event(&mut events).await, "signature:added");
        assert_eq!(next_event(&mut events).await, "signature:complete");
        assert_eq!(next_event(&mut events).await, "settlement:queued");
        assert_eq!(next_event(&mut events).await, "settlement:txBuilt");
        assert_eq!(next_event(&mut events).await, "settlement:confirmed");
    }

    /// Tests that a rejected proof terminally fails the match
    #[tokio::test]
    async fn test_proof_failure_is_terminal() {
        let harness =
            spawn_harness(Err("commitment mismatch: bad".to_string()), None, MockSink::default());
        let res = mock_match();
        let match_id = res.match_id.clone();

        harness.queue.send(SettlementManagerJob::NewMatch { match_result: res }).unwrap();
        wait_for_status(&harness.state, &match_id, SettlementStatus::Failed).await;

        let record = harness.state.settlement_record(&match_id).unwrap();
        assert!(record.error.unwrap().contains("commitment mismatch"));
        assert_eq!(harness.sink.n_submissions(), 0);
    }

    /// Tests that a missed rendezvous deadline fails the match
    #[tokio::test]
    async fn test_signature_timeout() {
        let harness = spawn_harness(Ok(()), Some(100), MockSink::default());
        let res = mock_match();
        let match_id = res.match_id.clone();

        harness.queue.send(SettlementManagerJob::NewMatch { match_result: res }).unwrap();
        wait_for_status(&harness.state, &match_id, SettlementStatus::Failed).await;

        let record = harness.state.settlement_record(&match_id).unwrap();
        assert_eq!(record.error.as_deref(), Some("signature-timeout"));
    }

    /// Tests that transient submission errors are retried with backoff
    #[tokio::test]
    async fn test_transient_sink_error_retried() {
        let sink = MockSink::with_script(vec![
            Err(SinkError::Transient("mempool full".to_string())),
            Ok("0xtx".to_string()),
        ]);
        let harness = spawn_harness(Ok(()), None, sink);
        let res = mock_match();
        let match_id = res.match_id.clone();

        harness.queue.send(SettlementManagerJob::NewMatch { match_result: res }).unwrap();
        wait_for_status(&harness.state, &match_id, SettlementStatus::AwaitingSignatures).await;

        submit_signature(&harness.queue, &match_id, SignatureRole::Buyer).await.unwrap();
        submit_signature(&harness.queue, &match_id, SignatureRole::Seller).await.unwrap();

        wait_for_status(&harness.state, &match_id, SettlementStatus::Confirmed).await;
        assert_eq!(harness.sink.n_submissions(), 2);
        assert_eq!(
            harness.state.settlement_record(&match_id).unwrap().tx_hash.as_deref(),
            Some("0xtx"),
        );
    }

    /// Tests that terminal submission errors fail without retry
    #[tokio::test]
    async fn test_terminal_sink_error_not_retried() {
        let sink = MockSink::with_script(vec![Err(SinkError::Terminal(
            "nullifier already spent".to_string(),
        ))]);
        let harness = spawn_harness(Ok(()), None, sink);
        let res = mock_match();
        let match_id = res.match_id.clone();

        harness.queue.send(SettlementManagerJob::NewMatch { match_result: res }).unwrap();
        wait_for_status(&harness.state, &match_id, SettlementStatus::AwaitingSignatures).await;

        submit_signature(&harness.queue, &match_id, SignatureRole::Buyer).await.unwrap();
        submit_signature(&harness.queue, &match_id, SignatureRole::Seller).await.unwrap();

        wait_for_status(&harness.state, &match_id, SettlementStatus::Failed).await;
        assert_eq!(harness.sink.n_submissions(), 1);
    }

    /// Tests that a signature for an unknown match is rejected
    #[tokio::test]
    async fn test_signature_for_unknown_match_rejected() {
        let harness = spawn_harness(Ok(()), None, MockSink::default());

        let res = submit_signature(&harness.queue, "nonexistent", SignatureRole::Buyer).await;
        assert!(res.unwrap_err().contains("unknown match"));
    }

    /// Tests the administrative drain of the pending queue
    #[tokio::test]
    async fn test_process_pending_drains_queue() {
        let harness = spawn_harness(Ok(()), None, MockSink::default());
        let res = mock_match();
        let match_id = res.match_id.clone();

        // A match recorded by the engine but never handed over, e.g. across
        // a restart
        harness.state.record_match(res);
        assert_eq!(harness.state.n_pending_matches(), 1);

        let (tx, rx) = tokio::sync::oneshot::channel();
        harness
            .queue
            .send(SettlementManagerJob::ProcessPending { response_channel: tx })
            .unwrap();
        assert_eq!(rx.await.unwrap(), 1);

        wait_for_status(&harness.state, &match_id, SettlementStatus::AwaitingSignatures).await;
        assert_eq!(harness.state.n_pending_matches(), 0);
    }
}
