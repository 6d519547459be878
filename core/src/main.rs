//! The entrypoint to the node, starts the coordinator thread which manages
//! all other worker threads

#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]

mod error;

use std::{sync::Arc, thread, time::Duration};

use api_server::worker::{ApiServer, ApiServerConfig};
use common::{
    new_cancel_channel,
    types::now_millis,
    worker::{new_worker_failure_channel, watch_worker, Worker},
};
use external_api::bus_message::SystemBusMessage;
use job_types::{
    matching_engine::{new_matching_engine_queue, MatchingEngineJob},
    proof_manager::new_proof_manager_queue,
    settlement_manager::new_settlement_manager_queue,
};
use matching_engine::worker::{MatchingEngine, MatchingEngineConfig};
use proof_manager::{proof_manager::ProofManager, worker::ProofManagerConfig};
use settlement_manager::{
    actor::RetryPolicy,
    sink::DevNullSink,
    worker::{SettlementManager, SettlementManagerConfig},
};
use state::{State, WhitelistSnapshot};
use system_bus::SystemBus;
use tokio::select;
use tracing::info;
use tracing_subscriber::EnvFilter;
use umbra_crypto::fields::scalar_to_hex_string;

use error::CoordinatorError;

/// The amount of time to wait between sending teardown signals and
/// terminating execution
const TERMINATION_TIMEOUT_MS: u64 = 10_000; // 10 seconds

/// The interval between expired-order sweeps of the books
const EXPIRY_SWEEP_INTERVAL_MS: u64 = 5_000;

// --------------
// | Entrypoint |
// --------------

/// The entrypoint to the node's execution
///
/// At a high level, this method begins a coordinator thread that:
///     1. Allocates resources and starts up workers
///     2. Watches worker threads for panics and errors
///     3. Tears the node down when any worker faults
///
/// The general flow for allocating a worker's resources is:
///     1. Allocate any communication primitives the worker needs access to
///        (job queues, the global bus, etc)
///     2. Build a cancel channel that the coordinator can use to cancel
///        worker execution
///     3. Allocate and start the worker's execution
///     4. Allocate a thread to monitor the worker for faults
#[tokio::main]
async fn main() -> Result<(), CoordinatorError> {
    // ---------------------
    // | Environment Setup |
    // ---------------------

    let config =
        config::parse_command_line_args().map_err(CoordinatorError::Config)?;
    configure_telemetry(config.debug);

    info!(
        "node running with\n\t http port: {}\n\t websocket port: {}\n\t whitelist members: {}",
        config.http_port,
        config.websocket_port,
        config.whitelist.len(),
    );

    // Build communication primitives; first the global pubsub bus that all
    // workers have access to
    let system_bus = SystemBus::<SystemBusMessage>::new();
    let (matching_engine_sender, matching_engine_receiver) = new_matching_engine_queue();
    let (proof_manager_sender, proof_manager_receiver) = new_proof_manager_queue();
    let (settlement_sender, settlement_receiver) = new_settlement_manager_queue();

    // Construct the global state around the initial whitelist snapshot
    let whitelist = WhitelistSnapshot::build(&config.whitelist);
    info!("whitelist root: {}", scalar_to_hex_string(&whitelist.root()));
    let global_state = State::new(whitelist);

    // ----------------
    // | Worker Setup |
    // ----------------

    // Start the matching engine
    let (matching_cancel_sender, matching_cancel_receiver) = new_cancel_channel();
    let mut matching_engine = MatchingEngine::new(MatchingEngineConfig {
        job_queue: Some(matching_engine_receiver),
        settlement_queue: settlement_sender.clone(),
        state: global_state.clone(),
        system_bus: system_bus.clone(),
        cancel_channel: matching_cancel_receiver,
    })
    .map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    matching_engine.start().map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    let (matching_failure_sender, mut matching_failure_receiver) = new_worker_failure_channel();
    watch_worker::<MatchingEngine>(&mut matching_engine, &matching_failure_sender);

    // Start the proof generation module
    let (proof_cancel_sender, proof_cancel_receiver) = new_cancel_channel();
    let mut proof_manager = ProofManager::new(ProofManagerConfig {
        wasm_path: config.circuit_wasm.clone(),
        zkey_path: config.circuit_zkey.clone(),
        prover: None,
        job_queue: Some(proof_manager_receiver),
        cancel_channel: proof_cancel_receiver,
    })
    .map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    proof_manager.start().map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    let (proof_failure_sender, mut proof_failure_receiver) = new_worker_failure_channel();
    watch_worker::<ProofManager>(&mut proof_manager, &proof_failure_sender);

    // Start the settlement manager; on-chain submission is delegated to an
    // external sink, the dev sink stands in until one is wired up
    let (settlement_cancel_sender, settlement_cancel_receiver) = new_cancel_channel();
    let mut settlement_manager = SettlementManager::new(SettlementManagerConfig {
        job_queue: Some(settlement_receiver),
        proof_queue: proof_manager_sender,
        sink: Arc::new(DevNullSink),
        state: global_state.clone(),
        system_bus: system_bus.clone(),
        signature_timeout_ms: config.signature_timeout_ms,
        retry_policy: RetryPolicy::default(),
        cancel_channel: settlement_cancel_receiver,
    })
    .map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    settlement_manager.start().map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    let (settlement_failure_sender, mut settlement_failure_receiver) =
        new_worker_failure_channel();
    watch_worker::<SettlementManager>(&mut settlement_manager, &settlement_failure_sender);

    // Start the API server
    let (api_cancel_sender, api_cancel_receiver) = new_cancel_channel();
    let mut api_server = ApiServer::new(ApiServerConfig {
        http_port: config.http_port,
        websocket_port: config.websocket_port,
        matching_engine_queue: matching_engine_sender.clone(),
        settlement_queue: settlement_sender,
        state: global_state,
        system_bus,
        cancel_channel: api_cancel_receiver,
    })
    .map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    api_server.start().map_err(|e| CoordinatorError::Setup(e.to_string()))?;
    let (api_failure_sender, mut api_failure_receiver) = new_worker_failure_channel();
    watch_worker::<ApiServer>(&mut api_server, &api_failure_sender);

    // Periodically sweep expired orders off the books
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(EXPIRY_SWEEP_INTERVAL_MS));
        loop {
            ticker.tick().await;
            if matching_engine_sender
                .send(MatchingEngineJob::ExpireOrders { now_ms: now_millis() })
                .is_err()
            {
                break;
            }
        }
    });

    // Await module failure; none of the workers are recoverable, so the
    // first fault tears the node down
    let failed_worker = select! {
        _ = matching_failure_receiver.recv() => "matching-engine",
        _ = proof_failure_receiver.recv() => "proof-generation",
        _ = settlement_failure_receiver.recv() => "settlement-manager",
        _ = api_failure_receiver.recv() => "api-server",
    };
    info!("worker {failed_worker} failed, tearing down...");

    // Send cancel signals to all workers
    for cancel_channel in [
        matching_cancel_sender,
        proof_cancel_sender,
        settlement_cancel_sender,
        api_cancel_sender,
    ]
    .iter()
    {
        cancel_channel
            .send(())
            .map_err(|e| CoordinatorError::CancelSend(e.to_string()))?;
    }

    // Give workers time to teardown execution then terminate
    info!("tearing down workers...");
    thread::sleep(Duration::from_millis(TERMINATION_TIMEOUT_MS));
    info!("terminating...");

    Err(CoordinatorError::WorkerFailure(failed_worker.to_string()))
}

/// Configure the tracing subscriber
///
/// Debug mode lowers the default filter to debug-level spans and events
fn configure_telemetry(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
