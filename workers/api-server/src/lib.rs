//! The API server worker: the read/write HTTP surface and the streaming
//! pub/sub gateway
//!
//! The HTTP side validates at the boundary and delegates to the matching
//! engine and settlement manager through their job queues; the websocket
//! side bridges system bus topics onto long-lived client streams

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod error;
pub mod http;
pub mod router;
pub mod validation;
pub mod websocket;
pub mod worker;
