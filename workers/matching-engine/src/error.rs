//! Defines errors emitted by the matching engine worker

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The error type emitted by the matching engine
#[derive(Clone, Debug)]
pub enum MatchingEngineError {
    /// The job queue was closed by all senders
    JobQueueClosed(String),
    /// The coordinator cancelled the worker's execution
    Cancelled(String),
    /// An error setting up the worker
    Setup(String),
}

impl Error for MatchingEngineError {}
impl Display for MatchingEngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self:?}")
    }
}
