//! Defines the main threading model of the proof generation module as a
//! worker that can be scheduled by the coordinator thread

use std::{
    path::PathBuf,
    sync::Arc,
    thread::{Builder, JoinHandle},
};

use common::{worker::Worker, CancelChannel};
use job_types::proof_manager::ProofManagerReceiver;
use rayon::ThreadPoolBuilder;

use crate::{
    error::ProofManagerError,
    proof_manager::ProofManager,
    prover::{CircomGroth16Prover, SettlementProver},
};

/// The name of the main worker thread
const MAIN_THREAD_NAME: &str = "proof-generation-main";

/// The pool size to fall back on when the host's parallelism is unknown
const DEFAULT_POOL_SIZE: usize = 4;

// ----------
// | Config |
// ----------

/// The configuration of the proof manager
pub struct ProofManagerConfig {
    /// The path to the circuit's WASM witness generator
    pub wasm_path: PathBuf,
    /// The path to the circuit's proving key
    pub zkey_path: PathBuf,
    /// An externally supplied prover, overriding the artifact-backed one;
    /// used by tests
    pub prover: Option<Arc<dyn SettlementProver>>,
    /// The job queue on which the manager receives proof generation jobs
    pub job_queue: Option<ProofManagerReceiver>,
    /// The channel on which the coordinator may cancel execution
    pub cancel_channel: CancelChannel,
}

// -----------------
// | Proof Manager |
// -----------------

impl Worker for ProofManager {
    type WorkerConfig = ProofManagerConfig;
    type Error = ProofManagerError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        // Proof generation is CPU-bound; size the pool to the host
        let n_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(DEFAULT_POOL_SIZE);
        let thread_pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .map_err(|err| ProofManagerError::Setup(err.to_string()))?,
        );

        let prover = match config.prover {
            Some(prover) => prover,
            None => Arc::new(CircomGroth16Prover::new(config.wasm_path, config.zkey_path)?),
        };

        Ok(Self {
            job_queue: config.job_queue,
            join_handle: None,
            thread_pool,
            prover,
            cancel_channel: config.cancel_channel,
        })
    }

    fn name(&self) -> String {
        "proof-generation".to_string()
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        // Take ownership of the thread pool and job queue
        let job_queue = self
            .job_queue
            .take()
            .ok_or_else(|| ProofManagerError::Setup("job queue already taken".to_string()))?;
        let thread_pool = self.thread_pool.clone();
        let prover = self.prover.clone();
        let cancel_channel = self.cancel_channel.clone();

        let handle = Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || {
                ProofManager::execution_loop(job_queue, thread_pool, prover, cancel_channel)
                    .err()
                    .expect("execution loop only exits with error")
            })
            .map_err(|err| ProofManagerError::Setup(err.to_string()))?;

        self.join_handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.join_handle.take().expect("proof manager not started")]
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        unimplemented!("proof manager does not support cleanup")
    }
}
