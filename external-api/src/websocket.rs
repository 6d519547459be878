//! The framed JSON protocol spoken over the streaming gateway
//!
//! Clients subscribe and unsubscribe to channels on a long-lived stream;
//! the server acknowledges, pushes event frames for subscribed channels,
//! and exchanges heartbeat pings

use serde::{Deserialize, Serialize};

use crate::bus_message::SystemBusMessage;

/// A frame sent by a client to the streaming gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientWsMessage {
    /// Subscribe to a channel
    Subscribe {
        /// The channel to subscribe to
        channel: String,
    },
    /// Unsubscribe from a channel
    Unsubscribe {
        /// The channel to unsubscribe from
        channel: String,
    },
    /// A client-initiated heartbeat; the server echoes the timestamp back
    Ping {
        /// The client's timestamp in milliseconds
        timestamp: u64,
    },
    /// A reply to a server-initiated heartbeat
    Pong {
        /// The timestamp echoed from the server's ping
        timestamp: u64,
    },
}

/// A frame pushed by the streaming gateway to a client
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerWsMessage {
    /// Acknowledge a subscription
    Subscribed {
        /// The channel subscribed to
        channel: String,
    },
    /// Acknowledge an unsubscription
    Unsubscribed {
        /// The channel unsubscribed from
        channel: String,
    },
    /// An event on a subscribed channel
    Event {
        /// The event name, e.g. `order:matched`
        event: String,
        /// The channel the event was routed through
        channel: String,
        /// The event payload
        data: serde_json::Value,
        /// The event timestamp in milliseconds
        timestamp: u64,
    },
    /// A server-initiated heartbeat
    Ping {
        /// The server's timestamp in milliseconds
        timestamp: u64,
    },
    /// A reply to a client-initiated heartbeat
    Pong {
        /// The timestamp echoed from the client's ping
        timestamp: u64,
    },
    /// A protocol-level error; the stream stays open
    Error {
        /// A human-readable description of the error
        message: String,
    },
}

impl ServerWsMessage {
    /// Build an event frame from a bus message routed through a channel
    pub fn from_bus_message(channel: String, message: &SystemBusMessage) -> Self {
        let data = serde_json::to_value(message)
            .expect("bus message serialization cannot fail");

        ServerWsMessage::Event {
            event: message.event_name().to_string(),
            channel,
            data,
            timestamp: message.timestamp(),
        }
    }
}

#[cfg(test)]
mod websocket_frame_tests {
    use super::*;

    /// Tests parsing of tagged client frames
    #[test]
    fn test_client_frame_parsing() {
        let frame: ClientWsMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"orderbook:XLM"}"#).unwrap();
        assert!(matches!(
            frame,
            ClientWsMessage::Subscribe { ref channel } if channel == "orderbook:XLM"
        ));

        let frame: ClientWsMessage =
            serde_json::from_str(r#"{"type":"ping","timestamp":42}"#).unwrap();
        assert!(matches!(frame, ClientWsMessage::Ping { timestamp: 42 }));
    }

    /// Tests the tagged shape of server frames
    #[test]
    fn test_server_frame_shape() {
        let ack = ServerWsMessage::Subscribed { channel: "trader:abc".to_string() };
        let val = serde_json::to_value(&ack).unwrap();

        assert_eq!(val["type"], "subscribed");
        assert_eq!(val["channel"], "trader:abc");
    }

    /// Tests building an event frame from a routed bus message
    #[test]
    fn test_event_frame_from_bus_message() {
        let msg = SystemBusMessage::SignatureComplete {
            match_id: "m1".to_string(),
            buyer_address: "b1".to_string(),
            seller_address: "s1".to_string(),
            timestamp: 7,
        };

        let frame = ServerWsMessage::from_bus_message("settlement:m1".to_string(), &msg);
        let val = serde_json::to_value(&frame).unwrap();

        assert_eq!(val["type"], "event");
        assert_eq!(val["event"], "signature:complete");
        assert_eq!(val["channel"], "settlement:m1");
        assert_eq!(val["data"]["matchId"], "m1");
        assert_eq!(val["timestamp"], 7);
    }
}
