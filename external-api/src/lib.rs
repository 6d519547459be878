//! Defines the types exchanged at the system boundary: HTTP request and
//! response bodies, websocket frames, and the events broadcast onto the
//! system bus
//!
//! Payload schemas are frozen here; all big integers are rendered as
//! decimal strings and all byte blobs as hex

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod bus_message;
pub mod http;
pub mod websocket;

/// An empty request or response body
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct EmptyRequestResponse;
