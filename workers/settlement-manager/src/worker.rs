//! Defines the threading model of the settlement manager as a worker that
//! can be scheduled by the coordinator thread
//!
//! The routing loop and its actors are async; the worker hosts them on a
//! dedicated runtime so the coordinator's threading model stays uniform

use std::{
    sync::Arc,
    thread::{Builder, JoinHandle},
};

use common::{worker::Worker, CancelChannel};
use external_api::bus_message::SystemBusMessage;
use job_types::{
    proof_manager::ProofManagerQueue, settlement_manager::SettlementManagerReceiver,
};
use state::State;
use system_bus::SystemBus;
use tokio::runtime::Builder as TokioRuntimeBuilder;

use crate::{
    actor::RetryPolicy, error::SettlementManagerError, manager::SettlementExecutor,
    sink::SettlementSink,
};

/// The name of the manager's main thread
const MAIN_THREAD_NAME: &str = "settlement-manager-main";

// ----------
// | Config |
// ----------

/// The configuration of the settlement manager worker
pub struct SettlementManagerConfig {
    /// The queue on which the manager receives jobs
    pub job_queue: Option<SettlementManagerReceiver>,
    /// The proof manager's job queue
    pub proof_queue: ProofManagerQueue,
    /// The sink settlements are submitted through
    pub sink: Arc<dyn SettlementSink>,
    /// A handle on the global state
    pub state: State,
    /// The system bus onto which lifecycle events are published
    pub system_bus: SystemBus<SystemBusMessage>,
    /// An override of the signature rendezvous deadline in milliseconds;
    /// defaults to the matched orders' expiry
    pub signature_timeout_ms: Option<u64>,
    /// The retry policy for transient submission errors
    pub retry_policy: RetryPolicy,
    /// The channel on which the coordinator may cancel execution
    pub cancel_channel: CancelChannel,
}

// ----------------------
// | Settlement Manager |
// ----------------------

/// The settlement manager worker wrapping the routing loop's runtime
pub struct SettlementManager {
    /// The config of the manager
    config: SettlementManagerConfig,
    /// The handle of the manager's runtime thread
    join_handle: Option<JoinHandle<SettlementManagerError>>,
}

impl Worker for SettlementManager {
    type WorkerConfig = SettlementManagerConfig;
    type Error = SettlementManagerError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        Ok(Self { config, join_handle: None })
    }

    fn name(&self) -> String {
        "settlement-manager".to_string()
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let job_queue = self.config.job_queue.take().ok_or_else(|| {
            SettlementManagerError::Setup("job queue already taken".to_string())
        })?;

        let executor = SettlementExecutor::new(
            job_queue,
            self.config.proof_queue.clone(),
            self.config.sink.clone(),
            self.config.state.clone(),
            self.config.system_bus.clone(),
            self.config.signature_timeout_ms,
            self.config.retry_policy,
            self.config.cancel_channel.clone(),
        );

        let handle = Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = TokioRuntimeBuilder::new_multi_thread()
                    .enable_all()
                    .build()
                    .expect("error building settlement manager runtime");

                runtime
                    .block_on(executor.run())
                    .err()
                    .expect("execution loop only exits with error")
            })
            .map_err(|err| SettlementManagerError::Setup(err.to_string()))?;

        self.join_handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.join_handle.take().expect("settlement manager not started")]
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        unimplemented!("settlement manager does not support cleanup")
    }
}
