//! Defines errors emitted by the settlement manager

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The error type emitted by the settlement manager
#[derive(Clone, Debug)]
pub enum SettlementManagerError {
    /// An error setting up the worker
    Setup(String),
    /// The job queue was closed by all senders
    JobQueueClosed(String),
    /// The coordinator cancelled the worker's execution
    Cancelled(String),
}

impl Error for SettlementManagerError {}
impl Display for SettlementManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self:?}")
    }
}
