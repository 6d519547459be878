//! Request and response bodies for the HTTP surface
//!
//! Quantities and prices cross this boundary as decimal strings of their
//! fixed-point scaled integer values; field elements as decimal strings;
//! proofs and signals as hex

use common::types::{
    BookSnapshot, MatchResult, OrderSide, SettlementRecord, SignatureRole,
};
use serde::{Deserialize, Serialize};
use umbra_crypto::fields::scalar_to_hex_string;

// -------------------
// | Generic Routes |
// -------------------

/// The response to a ping request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PingResponse {
    /// The server's timestamp in milliseconds
    pub timestamp: u64,
}

// --------------------
// | Order Submission |
// --------------------

/// A request to submit a private order
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    /// The submitting trader's account address
    pub trader: String,
    /// The address of the asset being traded
    pub asset_address: String,
    /// The asset's display symbol; uppercased server-side
    pub symbol: String,
    /// The side of the book, `buy` or `sell`
    pub side: OrderSide,
    /// The order quantity as a decimal string of the scaled integer
    pub quantity: String,
    /// The limit price as a decimal string of the scaled integer
    pub price: String,
    /// The order commitment as a decimal string
    pub commitment: String,
    /// The commitment's blinding secret as a decimal string
    pub secret: String,
    /// The commitment nonce as a decimal string
    pub nonce: String,
    /// The wall-clock expiry deadline in milliseconds
    pub expiry: u64,
    /// The trader's leaf index in the current whitelist tree
    pub whitelist_index: u64,
}

/// The response to an order submission
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    /// Whether the order was accepted onto the book
    pub accepted: bool,
    /// Any matches struck by this submission
    #[serde(rename = "pendingMatches")]
    pub matches: Vec<ApiMatch>,
    /// A snapshot of the asset's book after the submission
    #[serde(rename = "orderBookSnapshot")]
    pub order_book: ApiOrderBook,
    /// A human-readable reason populated when counterparties exist but no
    /// exact-quantity match was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_match_reason: Option<String>,
}

// --------------
// | Order Book |
// --------------

/// A view of one asset's book: per-side counts plus raw price and quantity
/// arrays as decimal strings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOrderBook {
    /// The number of resting buy orders
    pub buys: usize,
    /// The number of resting sell orders
    pub sells: usize,
    /// The resting buy prices, best first
    pub buy_prices: Vec<String>,
    /// The resting buy quantities, aligned with `buyPrices`
    pub buy_quantities: Vec<String>,
    /// The resting sell prices, best first
    pub sell_prices: Vec<String>,
    /// The resting sell quantities, aligned with `sellPrices`
    pub sell_quantities: Vec<String>,
}

impl From<&BookSnapshot> for ApiOrderBook {
    fn from(snapshot: &BookSnapshot) -> Self {
        /// Render a list of integers as decimal strings
        fn render(vals: &[u128]) -> Vec<String> {
            vals.iter().map(u128::to_string).collect()
        }

        Self {
            buys: snapshot.buy_prices.len(),
            sells: snapshot.sell_prices.len(),
            buy_prices: render(&snapshot.buy_prices),
            buy_quantities: render(&snapshot.buy_quantities),
            sell_prices: render(&snapshot.sell_prices),
            sell_quantities: render(&snapshot.sell_quantities),
        }
    }
}

// -----------
// | Matches |
// -----------

/// A completed match as rendered to clients
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatch {
    /// The match identifier, hex encoded
    pub match_id: String,
    /// The asset the match executes on
    pub asset: String,
    /// The buying trader's address
    pub buyer_address: String,
    /// The selling trader's address
    pub seller_address: String,
    /// The execution price as a decimal string
    pub execution_price: String,
    /// The executed quantity as a decimal string
    pub execution_quantity: String,
    /// The timestamp at which the match was struck
    pub timestamp: u64,
}

impl From<&MatchResult> for ApiMatch {
    fn from(res: &MatchResult) -> Self {
        Self {
            match_id: res.match_id.clone(),
            asset: res.asset().to_string(),
            buyer_address: res.buyer().to_string(),
            seller_address: res.seller().to_string(),
            execution_price: res.execution_price.to_string(),
            execution_quantity: res.execution_quantity.to_string(),
            timestamp: res.timestamp,
        }
    }
}

/// The response to a match listing request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetMatchesResponse {
    /// All completed matches, oldest first
    pub matches: Vec<ApiMatch>,
}

// ---------------
// | Settlements |
// ---------------

/// A settlement record as rendered to clients
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettlementRecord {
    /// The identifier of the underlying match
    pub match_id: String,
    /// The asset the match executes on
    pub asset: String,
    /// The buying trader's address
    pub buyer_address: String,
    /// The selling trader's address
    pub seller_address: String,
    /// The record's lifecycle state
    pub status: String,
    /// The pair's nullifier as a hex string, once proven
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullifier_hash: Option<String>,
    /// The encoded proof as hex, once proven
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    /// The encoded public signals as hex, once proven
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_signals: Option<String>,
    /// Whether the buyer has signed
    pub buyer_signed: bool,
    /// Whether the seller has signed
    pub seller_signed: bool,
    /// The settlement transaction hash, once confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// The failure reason for failed records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SettlementRecord> for ApiSettlementRecord {
    fn from(record: &SettlementRecord) -> Self {
        Self {
            match_id: record.match_id.clone(),
            asset: record.asset.clone(),
            buyer_address: record.buyer.clone(),
            seller_address: record.seller.clone(),
            status: record.status.to_string(),
            nullifier_hash: record.nullifier.as_ref().map(scalar_to_hex_string),
            proof: record.proof_bytes.as_ref().map(hex::encode),
            public_signals: record.public_signals.as_ref().map(hex::encode),
            buyer_signed: record.buyer_signed,
            seller_signed: record.seller_signed,
            tx_hash: record.tx_hash.clone(),
            error: record.error.clone(),
        }
    }
}

/// The response to a settlement listing request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetSettlementsResponse {
    /// The settlement records matching the query, oldest first
    pub settlements: Vec<ApiSettlementRecord>,
}

// --------------
// | Signatures |
// --------------

/// A request to upload one party's settlement signature
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitSignatureRequest {
    /// The signer's role in the match
    pub role: SignatureRole,
    /// The signature over the settlement intent
    pub signature: String,
}

/// The response to a signature upload; reflects the current rendezvous
/// state and is idempotent across duplicate uploads
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSignatureResponse {
    /// Whether the buyer slot is filled
    pub buyer_signed: bool,
    /// Whether the seller slot is filled
    pub seller_signed: bool,
}

// ---------
// | Admin |
// ---------

/// The response to an administrative match-queue drain
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessMatchesResponse {
    /// The number of pending matches handed to the proof pool
    pub processed: usize,
}

#[cfg(test)]
mod http_type_tests {
    use common::types::{mocks::mock_order, now_millis, MatchResult, OrderSide};

    use super::*;

    /// Tests the wire shape of an order submission
    #[test]
    fn test_submit_order_request_shape() {
        let body = r#"{
            "trader": "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "assetAddress": "CBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
            "symbol": "GOLD",
            "side": "buy",
            "quantity": "1000000000",
            "price": "500000000",
            "commitment": "123",
            "secret": "456",
            "nonce": "789",
            "expiry": 1700000000000,
            "whitelistIndex": 2
        }"#;

        let req: SubmitOrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.side, OrderSide::Buy);
        assert_eq!(req.quantity, "1000000000");
        assert_eq!(req.whitelist_index, 2);
    }

    /// Tests that big integers render as decimal strings
    #[test]
    fn test_match_rendering_decimal_strings() {
        let buy = mock_order("buyer", OrderSide::Buy, 100, 52);
        let sell = mock_order("seller", OrderSide::Sell, 100, 48);
        let res = MatchResult::new(buy, sell, now_millis());

        let api: ApiMatch = (&res).into();
        assert_eq!(api.execution_price, "50");
        assert_eq!(api.execution_quantity, "100");
    }

    /// Tests hex rendering of a settlement record
    #[test]
    fn test_settlement_record_rendering() {
        let buy = mock_order("buyer", OrderSide::Buy, 100, 50);
        let sell = mock_order("seller", OrderSide::Sell, 100, 50);
        let res = MatchResult::new(buy, sell, now_millis());
        let mut record = SettlementRecord::new(&res);
        record.proof_bytes = Some(vec![0xab; 4]);

        let api: ApiSettlementRecord = (&record).into();
        assert_eq!(api.status, "matched");
        assert_eq!(api.proof.as_deref(), Some("abababab"));
        assert!(api.nullifier_hash.is_none());

        // Unproven optional fields stay out of the serialized body
        let val = serde_json::to_value(&api).unwrap();
        assert!(val.get("nullifierHash").is_none());
    }
}
