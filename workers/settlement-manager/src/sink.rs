//! The settlement sink: the boundary to transaction assembly and on-chain
//! submission
//!
//! The sink receives the full settlement packet (proof, public signals,
//! nullifier, both signatures) and eventually reports a transaction hash or
//! an error. Only errors the sink identifies as transient are retried

use async_trait::async_trait;
use common::types::SettlementPacket;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::info;
use umbra_crypto::fields::scalar_to_hex_string;

/// An error returned by the settlement sink
#[derive(Clone, Debug)]
pub enum SinkError {
    /// A transient submission error, eligible for retry with backoff
    Transient(String),
    /// A terminal error; the settlement fails permanently
    Terminal(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SinkError::Transient(e) => write!(f, "transient submission error: {e}"),
            SinkError::Terminal(e) => write!(f, "terminal submission error: {e}"),
        }
    }
}

/// The interface the coordinator submits settlement packets through
#[async_trait]
pub trait SettlementSink: Send + Sync {
    /// Build and submit the settlement transaction for a packet, returning
    /// the transaction hash once accepted
    async fn submit_settlement(&self, packet: &SettlementPacket) -> Result<String, SinkError>;
}

/// A development sink that accepts every packet without touching a chain
///
/// The fabricated transaction hash is derived from the nullifier so that
/// repeated submissions of the same pair are observable
#[derive(Clone, Debug, Default)]
pub struct DevNullSink;

#[async_trait]
impl SettlementSink for DevNullSink {
    async fn submit_settlement(&self, packet: &SettlementPacket) -> Result<String, SinkError> {
        info!(
            match_id = %packet.match_id,
            "dev sink accepting settlement packet ({} proof bytes)",
            packet.proof_bytes.len(),
        );
        Ok(scalar_to_hex_string(&packet.nullifier))
    }
}

/// Sink mocks for testing
#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// A sink that replays a scripted sequence of outcomes and counts its
    /// submissions
    #[derive(Clone, Default)]
    pub struct MockSink {
        /// The scripted outcomes, consumed front to back
        script: Arc<Mutex<VecDeque<Result<String, SinkError>>>>,
        /// The number of submissions observed
        submissions: Arc<Mutex<usize>>,
    }

    impl MockSink {
        /// Create a sink that replays the given outcomes; once the script
        /// is exhausted every submission succeeds
        pub fn with_script(script: Vec<Result<String, SinkError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                submissions: Arc::new(Mutex::new(0)),
            }
        }

        /// The number of submissions the sink has observed
        pub fn n_submissions(&self) -> usize {
            *self.submissions.lock().unwrap()
        }
    }

    #[async_trait]
    impl SettlementSink for MockSink {
        async fn submit_settlement(
            &self,
            _packet: &SettlementPacket,
        ) -> Result<String, SinkError> {
            *self.submissions.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("0xmocktx".to_string()))
        }
    }
}
