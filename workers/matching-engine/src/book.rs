//! A book of resting orders for a single asset
//!
//! The matcher pairs a buy with the first unclaimed sell that crosses in
//! price and matches quantity exactly; the commitment scheme binds each
//! order's quantity, so partial fills are impossible and quantity-mismatched
//! candidates must be skipped

use std::collections::HashSet;

use common::types::{BookSnapshot, MatchResult, OrderId, OrderSide, PrivateOrder};

/// A book of orders for one asset: two price-time ordered sequences
#[derive(Clone, Debug, Default)]
pub struct AssetBook {
    /// The resting buy orders
    buys: Vec<PrivateOrder>,
    /// The resting sell orders
    sells: Vec<PrivateOrder>,
    /// The last timestamp stamped onto an order, kept monotonic per asset
    last_timestamp: u64,
}

impl AssetBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    // -----------
    // | Getters |
    // -----------

    /// The number of resting buy orders
    pub fn n_buys(&self) -> usize {
        self.buys.len()
    }

    /// The number of resting sell orders
    pub fn n_sells(&self) -> usize {
        self.sells.len()
    }

    /// Whether the book holds no orders on either side
    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    /// Look up a resting order by its identifier
    pub fn order(&self, id: OrderId) -> Option<&PrivateOrder> {
        self.buys.iter().chain(self.sells.iter()).find(|o| o.id == id)
    }

    // -----------
    // | Setters |
    // -----------

    /// Stamp an order with a per-asset monotonic timestamp and rest it on
    /// its side of the book
    ///
    /// Returns the stamped timestamp
    pub fn add_order(&mut self, mut order: PrivateOrder, now_ms: u64) -> u64 {
        let timestamp = u64::max(now_ms, self.last_timestamp + 1);
        self.last_timestamp = timestamp;
        order.timestamp = timestamp;

        match order.side {
            OrderSide::Buy => self.buys.push(order),
            OrderSide::Sell => self.sells.push(order),
        }
        timestamp
    }

    /// Sweep orders whose expiry has passed off both sides of the book
    ///
    /// Returns the number of orders removed
    pub fn expire_orders(&mut self, now_ms: u64) -> usize {
        let before = self.buys.len() + self.sells.len();
        self.buys.retain(|order| !order.is_expired(now_ms));
        self.sells.retain(|order| !order.is_expired(now_ms));
        before - self.buys.len() - self.sells.len()
    }

    // ------------
    // | Matching |
    // ------------

    /// Run one matching pass over the book
    ///
    /// Buys are visited in descending price then ascending timestamp order;
    /// for each, the sells are scanned in ascending price then ascending
    /// timestamp order and the first unclaimed sell with a crossed price
    /// and an exactly equal quantity is claimed. Claimed orders are removed
    /// after the pass
    pub fn match_orders(&mut self, timestamp: u64) -> Vec<MatchResult> {
        self.sort_books();

        let mut claimed_buys: HashSet<OrderId> = HashSet::new();
        let mut claimed_sells: HashSet<OrderId> = HashSet::new();
        let mut matches = Vec::new();

        for buy in self.buys.iter() {
            for sell in self.sells.iter() {
                // Sells are price-ascending; nothing further can cross
                if sell.price > buy.price {
                    break;
                }
                if claimed_sells.contains(&sell.id) || sell.quantity != buy.quantity {
                    continue;
                }

                claimed_buys.insert(buy.id);
                claimed_sells.insert(sell.id);
                matches.push(MatchResult::new(buy.clone(), sell.clone(), timestamp));
                break;
            }
        }

        self.buys.retain(|order| !claimed_buys.contains(&order.id));
        self.sells.retain(|order| !claimed_sells.contains(&order.id));
        matches
    }

    /// Explain why a resting order found no counterparty, if an explanation
    /// applies
    ///
    /// Returns `None` when the contra side is empty; otherwise names the
    /// structural reason: no price cross, or crossing candidates whose
    /// quantities mismatch
    pub fn no_match_reason(&self, order: &PrivateOrder) -> Option<String> {
        let contra = match order.side {
            OrderSide::Buy => &self.sells,
            OrderSide::Sell => &self.buys,
        };
        if contra.is_empty() {
            return None;
        }

        let crosses = |other: &PrivateOrder| match order.side {
            OrderSide::Buy => order.price >= other.price,
            OrderSide::Sell => other.price >= order.price,
        };

        if contra.iter().any(crosses) {
            Some(format!(
                "counterparties exist at crossing prices, but none matches quantity {} exactly",
                order.quantity
            ))
        } else {
            Some("no counterparty crosses the submitted price".to_string())
        }
    }

    // -------------
    // | Snapshots |
    // -------------

    /// Produce a read-only snapshot of the book in priority order
    pub fn snapshot(&mut self, asset: &str) -> BookSnapshot {
        self.sort_books();

        BookSnapshot {
            asset: asset.to_string(),
            buy_prices: self.buys.iter().map(|o| o.price).collect(),
            buy_quantities: self.buys.iter().map(|o| o.quantity).collect(),
            sell_prices: self.sells.iter().map(|o| o.price).collect(),
            sell_quantities: self.sells.iter().map(|o| o.quantity).collect(),
        }
    }

    /// Stable-sort both sides into priority order: buys by descending price
    /// then ascending timestamp, sells by ascending price then ascending
    /// timestamp
    fn sort_books(&mut self) {
        self.buys
            .sort_by(|a, b| b.price.cmp(&a.price).then(a.timestamp.cmp(&b.timestamp)));
        self.sells
            .sort_by(|a, b| a.price.cmp(&b.price).then(a.timestamp.cmp(&b.timestamp)));
    }
}

#[cfg(test)]
mod book_tests {
    use common::types::{mocks::mock_order, OrderSide, PrivateOrder};

    use super::*;

    /// The scaled representation of a whole unit
    const UNIT: u128 = constants::PRICE_SCALE;

    /// Rest an order on the book at a fixed receipt time
    fn rest(book: &mut AssetBook, order: PrivateOrder, at: u64) {
        book.add_order(order, at);
    }

    /// Tests an exact-quantity match at equal prices
    #[test]
    fn test_exact_match_equal_prices() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("buyer", OrderSide::Buy, 100 * UNIT, 50 * UNIT), 1);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 100 * UNIT, 50 * UNIT), 2);

        let matches = book.match_orders(3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].execution_price, 50 * UNIT);
        assert_eq!(matches[0].execution_quantity, 100 * UNIT);

        // Both orders leave the book
        assert!(book.is_empty());
    }

    /// Tests the midpoint execution price of a crossing match
    #[test]
    fn test_price_crossing_midpoint() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("buyer", OrderSide::Buy, 100, 52), 1);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 100, 48), 2);

        let matches = book.match_orders(3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].execution_price, 50);
    }

    /// Tests that a quantity mismatch suppresses the match
    #[test]
    fn test_quantity_mismatch_suppresses_match() {
        let mut book = AssetBook::new();
        let buy = mock_order("buyer", OrderSide::Buy, 100, 50);
        rest(&mut book, buy.clone(), 1);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 90, 50), 2);

        let matches = book.match_orders(3);
        assert!(matches.is_empty());

        // Both orders remain and the reason names the quantity constraint
        assert_eq!(book.n_buys(), 1);
        assert_eq!(book.n_sells(), 1);
        let reason = book.no_match_reason(&buy).unwrap();
        assert!(reason.contains("quantity"));
    }

    /// Tests that the best-priced sell wins among eligible candidates
    #[test]
    fn test_price_time_priority_better_price_wins() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("s1", OrderSide::Sell, 100, 50), 1);
        rest(&mut book, mock_order("s2", OrderSide::Sell, 100, 48), 2);
        rest(&mut book, mock_order("buyer", OrderSide::Buy, 100, 55), 3);

        // The later sell wins on price
        let matches = book.match_orders(4);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].seller(), "s2");
        assert_eq!(matches[0].execution_price, (55 + 48) / 2);
    }

    /// Tests that the earlier sell wins at equal prices
    #[test]
    fn test_price_time_priority_earlier_timestamp_wins() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("s1", OrderSide::Sell, 100, 50), 1);
        rest(&mut book, mock_order("s2", OrderSide::Sell, 100, 50), 2);
        rest(&mut book, mock_order("buyer", OrderSide::Buy, 100, 50), 3);

        let matches = book.match_orders(4);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].seller(), "s1");
    }

    /// Tests that an order appears in at most one emitted match
    #[test]
    fn test_no_double_spend_single_pass() {
        // One sell cannot satisfy two buys
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("b1", OrderSide::Buy, 100, 50), 1);
        rest(&mut book, mock_order("b2", OrderSide::Buy, 100, 50), 2);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 100, 50), 3);

        let matches = book.match_orders(4);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].buyer(), "b1");

        // The second buy remains resting
        assert_eq!(book.n_buys(), 1);
        assert_eq!(book.n_sells(), 0);
    }

    /// Tests striking several pairs in a single pass
    #[test]
    fn test_multiple_pairs_in_one_pass() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("b1", OrderSide::Buy, 100, 50), 1);
        rest(&mut book, mock_order("b2", OrderSide::Buy, 200, 50), 2);
        rest(&mut book, mock_order("s1", OrderSide::Sell, 100, 49), 3);
        rest(&mut book, mock_order("s2", OrderSide::Sell, 200, 49), 4);

        let matches = book.match_orders(5);
        assert_eq!(matches.len(), 2);
        assert!(book.is_empty());

        // Every match pairs equal quantities at crossed prices
        for m in &matches {
            assert_eq!(m.buy_order.quantity, m.sell_order.quantity);
            assert!(m.buy_order.price >= m.sell_order.price);
        }
    }

    /// Tests that self-trading is not blocked at the matcher
    #[test]
    fn test_self_trade_not_blocked() {
        // Traders are opaque identifiers; deduplication is the caller's
        // concern
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("same", OrderSide::Buy, 100, 50), 1);
        rest(&mut book, mock_order("same", OrderSide::Sell, 100, 50), 2);

        let matches = book.match_orders(3);
        assert_eq!(matches.len(), 1);
    }

    /// Tests that an empty contra side carries no reason
    #[test]
    fn test_no_match_reason_empty_contra_side() {
        let mut book = AssetBook::new();
        let buy = mock_order("buyer", OrderSide::Buy, 100, 50);
        rest(&mut book, buy.clone(), 1);

        // No counterparties at all: no reason is attached
        assert!(book.no_match_reason(&buy).is_none());
    }

    /// Tests the reason attached when no counterparty crosses
    #[test]
    fn test_no_match_reason_no_price_cross() {
        let mut book = AssetBook::new();
        let buy = mock_order("buyer", OrderSide::Buy, 100, 40);
        rest(&mut book, buy.clone(), 1);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 100, 60), 2);

        assert!(book.match_orders(3).is_empty());
        let reason = book.no_match_reason(&buy).unwrap();
        assert!(reason.contains("crosses"));
    }

    /// Tests sweeping expired orders off the book
    #[test]
    fn test_expiry_sweep() {
        let mut book = AssetBook::new();
        let mut order = mock_order("buyer", OrderSide::Buy, 100, 50);
        order.expiry = 10;
        rest(&mut book, order, 1);
        rest(&mut book, mock_order("seller", OrderSide::Sell, 100, 50), 2);

        // The buy expired before the sweep time; only it is removed
        assert_eq!(book.expire_orders(10), 1);
        assert_eq!(book.n_buys(), 0);
        assert_eq!(book.n_sells(), 1);
    }

    /// Tests that receipt stamps stay monotonic under a stalled clock
    #[test]
    fn test_timestamps_monotonic_within_asset() {
        let mut book = AssetBook::new();
        let t1 = book.add_order(mock_order("a", OrderSide::Buy, 1, 1), 100);
        // A stalled clock still yields strictly increasing stamps
        let t2 = book.add_order(mock_order("b", OrderSide::Buy, 1, 1), 100);
        assert!(t2 > t1);
    }

    /// Tests that snapshots render in priority order
    #[test]
    fn test_snapshot_priority_order() {
        let mut book = AssetBook::new();
        rest(&mut book, mock_order("b1", OrderSide::Buy, 10, 40), 1);
        rest(&mut book, mock_order("b2", OrderSide::Buy, 20, 60), 2);
        rest(&mut book, mock_order("s1", OrderSide::Sell, 30, 90), 3);
        rest(&mut book, mock_order("s2", OrderSide::Sell, 40, 80), 4);

        let snap = book.snapshot("asset");
        assert_eq!(snap.buy_prices, vec![60, 40]);
        assert_eq!(snap.buy_quantities, vec![20, 10]);
        assert_eq!(snap.sell_prices, vec![80, 90]);
        assert_eq!(snap.sell_quantities, vec![40, 30]);
    }
}
