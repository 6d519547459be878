//! Defines types broadcast onto the system bus and thereby websockets
//!
//! Each message knows its event name and the set of channels it fans out
//! to: the asset's orderbook channel, both counterparties' trader channels,
//! and the match-scoped settlement channel where applicable

use common::types::{OrderSide, SignatureRole};
use constants::{orderbook_topic, settlement_topic, trader_topic};
use serde::Serialize;
use system_bus::SystemBus;

/// A message type for events broadcast onto the system bus
///
/// Serialization is untagged: a variant serializes to exactly its payload
/// object, which becomes the `data` field of a streamed event frame
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SystemBusMessage {
    /// A new order was accepted onto the book
    #[serde(rename_all = "camelCase")]
    OrderSubmitted {
        /// The asset the order rests on
        asset: String,
        /// The submitting trader
        trader: String,
        /// The side of the book, `buy` or `sell`
        side: OrderSide,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// A buy/sell pair was matched
    #[serde(rename_all = "camelCase")]
    OrderMatched {
        /// The identifier of the new match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The asset the match executes on
        asset: String,
        /// The execution price as a decimal string
        execution_price: String,
        /// The executed quantity as a decimal string
        execution_quantity: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// Proof generation has begun for a match
    #[serde(rename_all = "camelCase")]
    ProofGenerating {
        /// The identifier of the match being proven
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// A settlement proof was generated
    #[serde(rename_all = "camelCase")]
    ProofGenerated {
        /// The identifier of the proven match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// A short hash of the proof bytes
        proof_hash: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// Proof generation failed; the match is terminally failed
    #[serde(rename_all = "camelCase")]
    ProofFailed {
        /// The identifier of the failed match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The prover's error, verbatim
        error: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// The settlement packet was queued for on-chain submission
    #[serde(rename_all = "camelCase")]
    SettlementQueued {
        /// The identifier of the match being settled
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// The settlement transaction was built and submitted
    #[serde(rename_all = "camelCase")]
    SettlementTxBuilt {
        /// The identifier of the match being settled
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The submitted transaction's hash
        tx_hash: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// The settlement was confirmed on-chain
    #[serde(rename_all = "camelCase")]
    SettlementConfirmed {
        /// The identifier of the confirmed match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The confirming transaction's hash
        tx_hash: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// The settlement terminally failed
    #[serde(rename_all = "camelCase")]
    SettlementFailed {
        /// The identifier of the failed match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The failure reason
        error: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// One counterparty signed the settlement intent
    #[serde(rename_all = "camelCase")]
    SignatureAdded {
        /// The identifier of the match being signed
        match_id: String,
        /// The address of the signer
        signer: String,
        /// The signer's role
        role: SignatureRole,
        /// Whether the buyer slot is now filled
        buyer_signed: bool,
        /// Whether the seller slot is now filled
        seller_signed: bool,
        /// The event timestamp in milliseconds
        timestamp: u64,
        /// The buyer address, carried for channel routing only
        #[serde(skip)]
        buyer_address: String,
        /// The seller address, carried for channel routing only
        #[serde(skip)]
        seller_address: String,
    },
    /// Both counterparties have signed
    #[serde(rename_all = "camelCase")]
    SignatureComplete {
        /// The identifier of the fully signed match
        match_id: String,
        /// The buying trader's address
        buyer_address: String,
        /// The selling trader's address
        seller_address: String,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
}

impl SystemBusMessage {
    /// The event name of the message as streamed to clients
    pub fn event_name(&self) -> &'static str {
        match self {
            SystemBusMessage::OrderSubmitted { .. } => "order:submitted",
            SystemBusMessage::OrderMatched { .. } => "order:matched",
            SystemBusMessage::ProofGenerating { .. } => "proof:generating",
            SystemBusMessage::ProofGenerated { .. } => "proof:generated",
            SystemBusMessage::ProofFailed { .. } => "proof:failed",
            SystemBusMessage::SettlementQueued { .. } => "settlement:queued",
            SystemBusMessage::SettlementTxBuilt { .. } => "settlement:txBuilt",
            SystemBusMessage::SettlementConfirmed { .. } => "settlement:confirmed",
            SystemBusMessage::SettlementFailed { .. } => "settlement:failed",
            SystemBusMessage::SignatureAdded { .. } => "signature:added",
            SystemBusMessage::SignatureComplete { .. } => "signature:complete",
        }
    }

    /// The event timestamp in milliseconds
    pub fn timestamp(&self) -> u64 {
        match self {
            SystemBusMessage::OrderSubmitted { timestamp, .. }
            | SystemBusMessage::OrderMatched { timestamp, .. }
            | SystemBusMessage::ProofGenerating { timestamp, .. }
            | SystemBusMessage::ProofGenerated { timestamp, .. }
            | SystemBusMessage::ProofFailed { timestamp, .. }
            | SystemBusMessage::SettlementQueued { timestamp, .. }
            | SystemBusMessage::SettlementTxBuilt { timestamp, .. }
            | SystemBusMessage::SettlementConfirmed { timestamp, .. }
            | SystemBusMessage::SettlementFailed { timestamp, .. }
            | SystemBusMessage::SignatureAdded { timestamp, .. }
            | SystemBusMessage::SignatureComplete { timestamp, .. } => *timestamp,
        }
    }

    /// The set of channels this message fans out to
    pub fn channels(&self) -> Vec<String> {
        match self {
            SystemBusMessage::OrderSubmitted { asset, trader, .. } => {
                vec![orderbook_topic(asset), trader_topic(trader)]
            },
            SystemBusMessage::OrderMatched {
                match_id, buyer_address, seller_address, asset, ..
            } => vec![
                orderbook_topic(asset),
                trader_topic(buyer_address),
                trader_topic(seller_address),
                settlement_topic(match_id),
            ],
            SystemBusMessage::ProofGenerating { match_id, buyer_address, seller_address, .. }
            | SystemBusMessage::ProofGenerated { match_id, buyer_address, seller_address, .. }
            | SystemBusMessage::ProofFailed { match_id, buyer_address, seller_address, .. }
            | SystemBusMessage::SettlementQueued {
                match_id, buyer_address, seller_address, ..
            }
            | SystemBusMessage::SettlementTxBuilt {
                match_id, buyer_address, seller_address, ..
            }
            | SystemBusMessage::SettlementConfirmed {
                match_id, buyer_address, seller_address, ..
            }
            | SystemBusMessage::SettlementFailed {
                match_id, buyer_address, seller_address, ..
            }
            | SystemBusMessage::SignatureAdded {
                match_id, buyer_address, seller_address, ..
            }
            | SystemBusMessage::SignatureComplete {
                match_id, buyer_address, seller_address, ..
            } => vec![
                trader_topic(buyer_address),
                trader_topic(seller_address),
                settlement_topic(match_id),
            ],
        }
    }
}

/// Fan a message out to every channel it routes to
pub fn publish_event(bus: &SystemBus<SystemBusMessage>, message: SystemBusMessage) {
    for channel in message.channels() {
        bus.publish(channel, message.clone());
    }
}

#[cfg(test)]
mod bus_message_tests {
    use super::*;

    /// Tests that payload keys serialize in camelCase
    #[test]
    fn test_payload_shape_camel_case() {
        let msg = SystemBusMessage::OrderMatched {
            match_id: "abc".to_string(),
            buyer_address: "buyer".to_string(),
            seller_address: "seller".to_string(),
            asset: "asset".to_string(),
            execution_price: "500000000".to_string(),
            execution_quantity: "1000000000".to_string(),
            timestamp: 1,
        };

        let val = serde_json::to_value(&msg).unwrap();
        assert_eq!(val["matchId"], "abc");
        assert_eq!(val["buyerAddress"], "buyer");
        assert_eq!(val["executionPrice"], "500000000");
    }

    /// Tests that routing-only fields stay out of the frozen payload
    #[test]
    fn test_signature_added_routing_fields_hidden() {
        let msg = SystemBusMessage::SignatureAdded {
            match_id: "abc".to_string(),
            signer: "buyer".to_string(),
            role: SignatureRole::Buyer,
            buyer_signed: true,
            seller_signed: false,
            timestamp: 1,
            buyer_address: "buyer".to_string(),
            seller_address: "seller".to_string(),
        };

        // The routing-only addresses must not leak into the frozen payload
        let val = serde_json::to_value(&msg).unwrap();
        assert!(val.get("buyerAddress").is_none());
        assert_eq!(val["buyerSigned"], true);
        assert_eq!(val["role"], "buyer");
    }

    /// Tests fan-out routing across the orderbook, trader, and match channels
    #[test]
    fn test_channel_routing() {
        let msg = SystemBusMessage::OrderMatched {
            match_id: "m1".to_string(),
            buyer_address: "b1".to_string(),
            seller_address: "s1".to_string(),
            asset: "a1".to_string(),
            execution_price: "1".to_string(),
            execution_quantity: "1".to_string(),
            timestamp: 1,
        };

        let channels = msg.channels();
        assert!(channels.contains(&"orderbook:a1".to_string()));
        assert!(channels.contains(&"trader:b1".to_string()));
        assert!(channels.contains(&"trader:s1".to_string()));
        assert!(channels.contains(&"settlement:m1".to_string()));
    }
}
