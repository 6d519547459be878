//! Defines common types, traits, and functionality useful throughout the
//! workspace

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::sync::{Arc, RwLock};

pub mod types;
pub mod worker;

/// A type alias for a shared, concurrency safe, mutable pointer
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap an abstract value in a shared lock
pub fn new_shared<T>(wrapped: T) -> Shared<T> {
    Arc::new(RwLock::new(wrapped))
}

/// A channel on which a coordinator may signal a worker to cancel execution
pub type CancelChannel = tokio::sync::watch::Receiver<()>;

/// Create a new cancel channel pair
pub fn new_cancel_channel() -> (tokio::sync::watch::Sender<()>, CancelChannel) {
    tokio::sync::watch::channel(())
}
