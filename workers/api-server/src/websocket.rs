//! Groups logic for managing websocket connections
//!
//! Each connection tracks its channel subscriptions in a `StreamMap` over
//! system bus readers. The bus gives every reader a bounded queue, so a
//! client that stops draining events is disconnected by the bus rather than
//! back-pressuring publishers; the heartbeat tick notices the dropped
//! reader and terminates the connection

use std::{collections::HashSet, net::SocketAddr, time::Duration};

use common::types::now_millis;
use external_api::{
    bus_message::SystemBusMessage,
    websocket::{ClientWsMessage, ServerWsMessage},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use system_bus::{SystemBus, TopicReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamMap;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info};
use tungstenite::Message;

use super::{error::ApiServerError, worker::ApiServerConfig};

/// The dummy stream used to seed the websocket subscriptions `StreamMap`
///
/// The name is reserved: a client subscribing to it would replace the
/// sentinel entry in the map and skew the slow-subscriber accounting, so
/// subscribe/unsubscribe requests for it are rejected
const DUMMY_SUBSCRIPTION_TOPIC: &str = "dummy-topic";

/// The error message given when a client addresses the reserved sentinel
/// channel
const ERR_RESERVED_CHANNEL: &str = "channel name is reserved";

/// The interval between server heartbeat pings
const HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// The number of successive unanswered pings after which a client is
/// terminated
const MAX_MISSED_HEARTBEATS: usize = 2;

/// The write half of a client websocket
type WsWriteStream = SplitSink<WebSocketStream<TcpStream>, Message>;
/// The per-connection subscription set
type SubscriptionMap = StreamMap<String, TopicReader<SystemBusMessage>>;

/// The websocket server bridging bus topics onto client streams
#[derive(Clone)]
pub(super) struct WebsocketServer {
    /// The port the server listens on
    websocket_port: u16,
    /// The system bus events are subscribed from
    system_bus: SystemBus<SystemBusMessage>,
}

impl WebsocketServer {
    /// Create a new websocket server
    pub(super) fn new(config: &ApiServerConfig) -> Self {
        Self { websocket_port: config.websocket_port, system_bus: config.system_bus.clone() }
    }

    /// The main execution loop of the websocket server
    pub(super) async fn execution_loop(self) -> Result<(), ApiServerError> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.websocket_port)
            .parse()
            .map_err(|_| ApiServerError::Setup("invalid websocket bind address".to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ApiServerError::Setup(err.to_string()))?;
        info!("websocket server listening on {addr}");

        // Await incoming websocket connections
        while let Ok((stream, peer_addr)) = listener.accept().await {
            debug!("accepted websocket connection from {peer_addr}");
            let self_clone = self.clone();
            tokio::spawn(async move {
                if let Err(e) = self_clone.handle_connection(stream).await {
                    debug!("websocket connection to {peer_addr} closed with error: {e}");
                }
            });
        }

        // If the listener fails, the server has failed
        Err(ApiServerError::WebsocketServerFailure(
            "websocket server spuriously shutdown".to_string(),
        ))
    }

    /// Handle a websocket connection
    ///
    /// Manages subscriptions to bus channels, heartbeats, and dispatches
    /// subscribe/unsubscribe requests
    async fn handle_connection(&self, stream: TcpStream) -> Result<(), ApiServerError> {
        // Accept the websocket upgrade and split into read/write streams
        let websocket_stream = accept_async(stream)
            .await
            .map_err(|err| ApiServerError::WebsocketServerFailure(err.to_string()))?;
        let (mut write_stream, mut read_stream) = websocket_stream.split();

        // The client adds subscriptions throughout the connection; this
        // tracks the active subscriptions the connection has open
        let mut subscriptions = SubscriptionMap::new();
        let mut active_channels: HashSet<String> = HashSet::new();

        // The `StreamMap` returns `Poll::Ready(None)` when no streams are
        // registered; we would prefer `Poll::Pending`, so a dummy stream is
        // entered into the map
        let dummy_reader = self.system_bus.subscribe(DUMMY_SUBSCRIPTION_TOPIC.to_string());
        subscriptions.insert(DUMMY_SUBSCRIPTION_TOPIC.to_string(), dummy_reader);

        // Two successive unanswered heartbeats terminate the client
        let mut outstanding_pings = 0usize;
        let heartbeat_period = Duration::from_millis(HEARTBEAT_INTERVAL_MS);
        let mut heartbeat =
            tokio::time::interval_at(tokio::time::Instant::now() + heartbeat_period, heartbeat_period);

        // Begin the listener loop
        loop {
            tokio::select! {
                // Next subscription event from the system bus
                Some((channel, event)) = subscriptions.next() => {
                    self.push_subscribed_event(channel, &event, &mut write_stream).await?;
                }

                // Server heartbeat tick
                _ = heartbeat.tick() => {
                    if outstanding_pings >= MAX_MISSED_HEARTBEATS {
                        debug!("client missed {outstanding_pings} heartbeats, disconnecting");
                        break;
                    }

                    // A reader dropped by the bus for falling behind leaves
                    // the map; the client is too slow to keep
                    if subscriptions.len() < active_channels.len() + 1 {
                        debug!("client fell behind its subscription buffers, disconnecting");
                        break;
                    }

                    outstanding_pings += 1;
                    self.send_frame(
                        &ServerWsMessage::Ping { timestamp: now_millis() },
                        &mut write_stream,
                    ).await?;
                }

                // Next message from the client side of the websocket
                message = read_stream.next() => {
                    match message {
                        Some(msg) => {
                            let msg = msg.map_err(|e| {
                                ApiServerError::WebsocketServerFailure(e.to_string())
                            })?;

                            match msg {
                                Message::Close(_) => break,
                                _ => {
                                    self.handle_incoming_ws_message(
                                        msg,
                                        &mut subscriptions,
                                        &mut active_channels,
                                        &mut outstanding_pings,
                                        &mut write_stream,
                                    ).await?;
                                },
                            };
                        }

                        // None is returned when the connection is closed or a
                        // critical error occurred; the server side may hang up
                        None => break,
                    }
                }
            };
        }

        // Dropping the readers releases every subscription
        Ok(())
    }

    /// Handle an incoming websocket message
    async fn handle_incoming_ws_message(
        &self,
        message: Message,
        subscriptions: &mut SubscriptionMap,
        active_channels: &mut HashSet<String>,
        outstanding_pings: &mut usize,
        write_stream: &mut WsWriteStream,
    ) -> Result<(), ApiServerError> {
        if let Message::Text(msg_text) = message {
            // Deserialize the message body and dispatch to a handler
            let response = match serde_json::from_str::<ClientWsMessage>(&msg_text) {
                Ok(frame) => {
                    self.handle_client_frame(frame, subscriptions, active_channels, outstanding_pings)
                },
                Err(e) => Some(ServerWsMessage::Error { message: format!("invalid request: {e}") }),
            };

            if let Some(frame) = response {
                self.send_frame(&frame, write_stream).await?;
            }
        }

        Ok(())
    }

    /// Apply a parsed client frame to the connection's subscriptions
    fn handle_client_frame(
        &self,
        frame: ClientWsMessage,
        subscriptions: &mut SubscriptionMap,
        active_channels: &mut HashSet<String>,
        outstanding_pings: &mut usize,
    ) -> Option<ServerWsMessage> {
        match frame {
            ClientWsMessage::Subscribe { channel } => {
                if channel == DUMMY_SUBSCRIPTION_TOPIC {
                    return Some(ServerWsMessage::Error {
                        message: ERR_RESERVED_CHANNEL.to_string(),
                    });
                }

                // Register the subscription in the bus and the stream map
                // the listener loop polls
                let reader = self.system_bus.subscribe(channel.clone());
                subscriptions.insert(channel.clone(), reader);
                active_channels.insert(channel.clone());
                Some(ServerWsMessage::Subscribed { channel })
            },
            ClientWsMessage::Unsubscribe { channel } => {
                if channel == DUMMY_SUBSCRIPTION_TOPIC {
                    return Some(ServerWsMessage::Error {
                        message: ERR_RESERVED_CHANNEL.to_string(),
                    });
                }

                subscriptions.remove(&channel);
                active_channels.remove(&channel);
                Some(ServerWsMessage::Unsubscribed { channel })
            },
            ClientWsMessage::Ping { timestamp } => Some(ServerWsMessage::Pong { timestamp }),
            ClientWsMessage::Pong { .. } => {
                *outstanding_pings = 0;
                None
            },
        }
    }

    /// Push an internal event the client is subscribed to onto the websocket
    async fn push_subscribed_event(
        &self,
        channel: String,
        event: &SystemBusMessage,
        write_stream: &mut WsWriteStream,
    ) -> Result<(), ApiServerError> {
        let frame = ServerWsMessage::from_bus_message(channel, event);
        self.send_frame(&frame, write_stream).await
    }

    /// Serialize a frame and write it onto the stream
    async fn send_frame(
        &self,
        frame: &ServerWsMessage,
        write_stream: &mut WsWriteStream,
    ) -> Result<(), ApiServerError> {
        let serialized = serde_json::to_string(frame)
            .map_err(|err| ApiServerError::WebsocketServerFailure(err.to_string()))?;

        write_stream
            .send(Message::Text(serialized))
            .await
            .map_err(|err| ApiServerError::WebsocketServerFailure(err.to_string()))
    }
}
