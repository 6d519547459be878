//! Defines the threading model of the matching engine as a worker that can
//! be scheduled by the coordinator thread

use std::thread::{Builder, JoinHandle};

use common::{worker::Worker, CancelChannel};
use external_api::bus_message::SystemBusMessage;
use job_types::{
    matching_engine::MatchingEngineReceiver, settlement_manager::SettlementManagerQueue,
};
use state::State;
use system_bus::SystemBus;

use crate::{error::MatchingEngineError, executor::MatchingExecutor};

/// The name of the engine's main thread
const MAIN_THREAD_NAME: &str = "matching-engine-main";

// ----------
// | Config |
// ----------

/// The configuration of the matching engine worker
#[derive(Clone)]
pub struct MatchingEngineConfig {
    /// The queue on which the engine receives jobs
    pub job_queue: Option<MatchingEngineReceiver>,
    /// The settlement manager's queue, for handing off struck matches
    pub settlement_queue: SettlementManagerQueue,
    /// A handle on the global state
    pub state: State,
    /// The system bus onto which events are published
    pub system_bus: SystemBus<SystemBusMessage>,
    /// The channel on which the coordinator may cancel execution
    pub cancel_channel: CancelChannel,
}

// -------------------
// | Matching Engine |
// -------------------

/// The matching engine worker wrapping the book executor thread
pub struct MatchingEngine {
    /// The config of the engine
    config: MatchingEngineConfig,
    /// The handle of the engine's executor thread
    join_handle: Option<JoinHandle<MatchingEngineError>>,
}

impl Worker for MatchingEngine {
    type WorkerConfig = MatchingEngineConfig;
    type Error = MatchingEngineError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        Ok(Self { config, join_handle: None })
    }

    fn name(&self) -> String {
        "matching-engine".to_string()
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let job_queue = self
            .config
            .job_queue
            .take()
            .ok_or_else(|| MatchingEngineError::Setup("job queue already taken".to_string()))?;

        let executor = MatchingExecutor::new(
            job_queue,
            self.config.settlement_queue.clone(),
            self.config.state.clone(),
            self.config.system_bus.clone(),
            self.config.cancel_channel.clone(),
        );

        let handle = Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || executor.run().err().expect("executor loop only exits with error"))
            .map_err(|err| MatchingEngineError::Setup(err.to_string()))?;

        self.join_handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.join_handle.take().expect("engine not started")]
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        unimplemented!("matching engine does not support cleanup")
    }
}
