//! Groups type definitions shared across workers

mod book;
mod r#match;
mod order;
mod proof;
mod settlement;

pub use book::*;
pub use order::*;
pub use proof::*;
pub use r#match::*;
pub use settlement::*;

/// The current unix timestamp in milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
