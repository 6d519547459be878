//! Defines the threading model of the API server as a worker that can be
//! scheduled by the coordinator thread

use std::thread::{Builder, JoinHandle};

use common::{worker::Worker, CancelChannel};
use external_api::bus_message::SystemBusMessage;
use job_types::{
    matching_engine::MatchingEngineQueue, settlement_manager::SettlementManagerQueue,
};
use state::State;
use system_bus::SystemBus;
use tokio::runtime::Builder as TokioRuntimeBuilder;

use crate::{error::ApiServerError, http::HttpServer, websocket::WebsocketServer};

/// The name of the server's main thread
const MAIN_THREAD_NAME: &str = "api-server-main";

// ----------
// | Config |
// ----------

/// The configuration of the API server
#[derive(Clone)]
pub struct ApiServerConfig {
    /// The port to listen on for the externally facing HTTP API
    pub http_port: u16,
    /// The port to listen on for the externally facing websocket API
    pub websocket_port: u16,
    /// The matching engine's job queue
    pub matching_engine_queue: MatchingEngineQueue,
    /// The settlement manager's job queue
    pub settlement_queue: SettlementManagerQueue,
    /// A handle on the global state
    pub state: State,
    /// The system bus events are subscribed from
    pub system_bus: SystemBus<SystemBusMessage>,
    /// The channel on which the coordinator may cancel execution
    pub cancel_channel: CancelChannel,
}

// --------------
// | API Server |
// --------------

/// The API server worker hosting the HTTP and websocket servers
pub struct ApiServer {
    /// The config of the server
    config: ApiServerConfig,
    /// The handle of the server's runtime thread
    join_handle: Option<JoinHandle<ApiServerError>>,
}

impl Worker for ApiServer {
    type WorkerConfig = ApiServerConfig;
    type Error = ApiServerError;

    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        Ok(Self { config, join_handle: None })
    }

    fn name(&self) -> String {
        "api-server".to_string()
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let http_server = HttpServer::new(&self.config);
        let websocket_server = WebsocketServer::new(&self.config);
        let mut cancel_channel = self.config.cancel_channel.clone();

        let handle = Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = TokioRuntimeBuilder::new_multi_thread()
                    .enable_all()
                    .build()
                    .expect("error building api server runtime");

                // Either server failing, or a cancel signal, tears the
                // worker down
                runtime.block_on(async move {
                    tokio::select! {
                        res = http_server.execution_loop() => {
                            res.err().unwrap_or_else(|| {
                                ApiServerError::HttpServerFailure(
                                    "http server exited silently".to_string(),
                                )
                            })
                        },
                        res = websocket_server.execution_loop() => {
                            res.err().unwrap_or_else(|| {
                                ApiServerError::WebsocketServerFailure(
                                    "websocket server exited silently".to_string(),
                                )
                            })
                        },
                        _ = cancel_channel.changed() => {
                            ApiServerError::Cancelled("received cancel signal".to_string())
                        },
                    }
                })
            })
            .map_err(|err| ApiServerError::Setup(err.to_string()))?;

        self.join_handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        vec![self.join_handle.take().expect("api server not started")]
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        unimplemented!("api server does not support cleanup")
    }
}
