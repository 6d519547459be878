//! Defines errors emitted by the proof generation module

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The error type emitted by the proof manager
#[derive(Clone, Debug)]
pub enum ProofManagerError {
    /// An error setting up the worker, e.g. unreadable circuit artifacts
    Setup(String),
    /// The prover rejected the witness or failed internally
    Prover(String),
    /// A commitment could not be reproduced from the match parameters; the
    /// circuit would reject the witness
    CommitmentMismatch(String),
    /// A whitelist opening failed verification against the snapshot root
    MerkleVerification(String),
    /// The job queue was closed by all senders
    JobQueueClosed(String),
    /// The coordinator cancelled the worker's execution
    Cancelled(String),
    /// A proof response could not be delivered
    Response(String),
}

impl Error for ProofManagerError {}
impl Display for ProofManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProofManagerError::Setup(e) => write!(f, "setup error: {e}"),
            ProofManagerError::Prover(e) => write!(f, "prover error: {e}"),
            ProofManagerError::CommitmentMismatch(e) => {
                write!(f, "commitment mismatch: {e}")
            },
            ProofManagerError::MerkleVerification(e) => {
                write!(f, "merkle verification failed: {e}")
            },
            ProofManagerError::JobQueueClosed(e) => write!(f, "job queue closed: {e}"),
            ProofManagerError::Cancelled(e) => write!(f, "cancelled: {e}"),
            ProofManagerError::Response(e) => write!(f, "response error: {e}"),
        }
    }
}
