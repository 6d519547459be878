//! Private order types submitted to the dark pool

use constants::Scalar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identifier assigned to an order at ingest
pub type OrderId = Uuid;

/// The side of the book an order rests on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// The buy side
    Buy,
    /// The sell side
    Sell,
}

impl OrderSide {
    /// The side's circuit encoding; buy is zero, sell is one
    pub fn to_u8(self) -> u8 {
        match self {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }

    /// The opposite side of the book
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// A private order resting on the book
///
/// The commitment binds the asset hash, side, quantity, price, nonce, and
/// secret; quantity and price are integers pre-scaled by the system's
/// fixed-point factor
#[derive(Clone, Debug)]
pub struct PrivateOrder {
    /// The order's identifier, assigned at ingest
    pub id: OrderId,
    /// The Poseidon commitment to the order's parameters
    pub commitment: Scalar,
    /// The submitting trader's account address
    pub trader: String,
    /// The address of the asset being traded
    pub asset_address: String,
    /// The side of the book the order rests on
    pub side: OrderSide,
    /// The order quantity, scaled fixed-point
    pub quantity: u128,
    /// The order's limit price, scaled fixed-point
    pub price: u128,
    /// The blinding secret of the commitment
    pub secret: Scalar,
    /// The commitment nonce
    pub nonce: Scalar,
    /// The ingest timestamp in milliseconds, monotonic within an asset
    pub timestamp: u64,
    /// The wall-clock expiry deadline in milliseconds
    pub expiry: u64,
    /// The trader's leaf index in the current whitelist tree
    pub whitelist_index: usize,
}

impl PrivateOrder {
    /// Whether the order has expired as of the given timestamp
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expiry <= now_ms
    }
}

/// Order mocks for testing
#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use umbra_crypto::commitments::{compute_asset_hash, generate_order_commitment};
    use uuid::Uuid;

    use super::{OrderSide, PrivateOrder};
    use crate::types::now_millis;

    /// A fixed asset address used by mock orders
    pub const MOCK_ASSET: &str = "CBQHNAXSI55GX2GN6D67GK7BHVPSLJUGZQEU7WJ5LKR5PNUCGLIMAO4K";

    /// Create a mock order with a consistent commitment over its parameters
    pub fn mock_order(
        trader: &str,
        side: OrderSide,
        quantity: u128,
        price: u128,
    ) -> PrivateOrder {
        mock_order_on_asset(trader, MOCK_ASSET, side, quantity, price)
    }

    /// Create a mock order for a specific asset
    pub fn mock_order_on_asset(
        trader: &str,
        asset: &str,
        side: OrderSide,
        quantity: u128,
        price: u128,
    ) -> PrivateOrder {
        let asset_hash = compute_asset_hash(asset);
        let commitment =
            generate_order_commitment(asset_hash, side.to_u8(), quantity, price);

        let now = now_millis();
        PrivateOrder {
            id: Uuid::new_v4(),
            commitment: commitment.commitment,
            trader: trader.to_string(),
            asset_address: asset.to_string(),
            side,
            quantity,
            price,
            secret: commitment.secret,
            nonce: commitment.nonce,
            timestamp: now,
            expiry: now + 60_000,
            whitelist_index: 0,
        }
    }
}
