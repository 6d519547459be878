//! The settlement manager drives each match through its lifecycle: proof
//! generation, two-party signature rendezvous, transaction submission, and
//! confirmation
//!
//! Every match is owned by a dedicated actor; signature submissions and
//! sink callbacks are serialized through its mailbox, so the state machine
//! never races. The manager itself only routes jobs to actors

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod actor;
pub mod error;
pub mod manager;
pub mod sink;
pub mod worker;
