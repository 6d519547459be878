//! Groups top-level errors useful throughout the node

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// An error type at the coordinator level
#[derive(Clone, Debug)]
pub enum CoordinatorError {
    /// An error parsing the node's configuration
    Config(String),
    /// An error setting up the node
    Setup(String),
    /// Failure to send a cancel signal to a worker
    CancelSend(String),
    /// A worker failed and could not be recovered
    WorkerFailure(String),
}

impl Error for CoordinatorError {}
impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self:?}")
    }
}
