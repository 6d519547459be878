//! Matched order pairs emitted by the matching engine

use rand::{thread_rng, RngCore};

use super::PrivateOrder;

/// The byte length of a match identifier
const MATCH_ID_BYTES: usize = 32;

/// A matched buy/sell pair
///
/// The engine guarantees `buy_order.quantity == sell_order.quantity` and
/// `buy_order.price >= sell_order.price`; the execution price is the integer
/// midpoint of the two limit prices
#[derive(Clone, Debug)]
pub struct MatchResult {
    /// A random 32-byte identifier for the match, hex encoded
    pub match_id: String,
    /// The buy side order
    pub buy_order: PrivateOrder,
    /// The sell side order
    pub sell_order: PrivateOrder,
    /// The execution price, the integer midpoint of the crossed prices
    pub execution_price: u128,
    /// The executed quantity, equal on both sides
    pub execution_quantity: u128,
    /// The timestamp at which the match was struck, in milliseconds
    pub timestamp: u64,
}

impl MatchResult {
    /// Pair two orders into a match
    pub fn new(buy_order: PrivateOrder, sell_order: PrivateOrder, timestamp: u64) -> Self {
        let execution_price = (buy_order.price + sell_order.price) / 2;
        let execution_quantity = buy_order.quantity;

        Self {
            match_id: new_match_id(),
            buy_order,
            sell_order,
            execution_price,
            execution_quantity,
            timestamp,
        }
    }

    /// The asset the match executes on
    pub fn asset(&self) -> &str {
        &self.buy_order.asset_address
    }

    /// The buying trader's address
    pub fn buyer(&self) -> &str {
        &self.buy_order.trader
    }

    /// The selling trader's address
    pub fn seller(&self) -> &str {
        &self.sell_order.trader
    }

    /// The earliest expiry of the two matched orders, used as the signature
    /// rendezvous deadline
    pub fn earliest_expiry(&self) -> u64 {
        u64::min(self.buy_order.expiry, self.sell_order.expiry)
    }
}

/// Generate a fresh random match identifier
pub fn new_match_id() -> String {
    let mut bytes = [0u8; MATCH_ID_BYTES];
    thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod match_tests {
    use super::*;
    use crate::types::{mocks::mock_order, now_millis, OrderSide};

    /// Tests the integer midpoint execution price
    #[test]
    fn test_execution_midpoint() {
        let buy = mock_order("buyer", OrderSide::Buy, 100, 52);
        let sell = mock_order("seller", OrderSide::Sell, 100, 48);

        let res = MatchResult::new(buy, sell, now_millis());
        assert_eq!(res.execution_price, 50);
        assert_eq!(res.execution_quantity, 100);
    }

    /// Tests that fresh match identifiers never collide
    #[test]
    fn test_match_ids_unique() {
        let id1 = new_match_id();
        let id2 = new_match_id();

        assert_eq!(id1.len(), 2 * MATCH_ID_BYTES);
        assert_ne!(id1, id2);
    }
}
