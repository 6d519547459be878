//! Read-only order book snapshots published by the matching engine

/// A point-in-time view of one asset's book
///
/// Prices and quantities are parallel arrays in the book's current priority
/// order; snapshots are immutable once published
#[derive(Clone, Debug, Default)]
pub struct BookSnapshot {
    /// The asset this snapshot covers
    pub asset: String,
    /// The resting buy prices, best first
    pub buy_prices: Vec<u128>,
    /// The resting buy quantities, aligned with `buy_prices`
    pub buy_quantities: Vec<u128>,
    /// The resting sell prices, best first
    pub sell_prices: Vec<u128>,
    /// The resting sell quantities, aligned with `sell_prices`
    pub sell_quantities: Vec<u128>,
}

impl BookSnapshot {
    /// An empty snapshot for an asset with no resting orders
    pub fn empty(asset: &str) -> Self {
        Self { asset: asset.to_string(), ..Default::default() }
    }
}
