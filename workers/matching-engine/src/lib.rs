//! The matching engine worker: a single-writer actor that owns the
//! per-asset order books and pairs compatible orders under the
//! exact-quantity, price-time-priority policy
//!
//! All book mutations happen on the engine's thread; queries observe
//! read-only snapshots published into the global state after every
//! mutation, which removes any read-while-sorting race

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod book;
pub mod error;
pub mod executor;
pub mod worker;
