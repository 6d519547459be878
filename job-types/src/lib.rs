//! Defines job types that may be enqueued by other workers in the local
//! node, along with the channel constructors connecting them

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod matching_engine;
pub mod proof_manager;
pub mod settlement_manager;
