//! Groups handlers for the HTTP API

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use common::types::{now_millis, PrivateOrder};
use external_api::{
    http::{
        ApiMatch, ApiOrderBook, ApiSettlementRecord, GetMatchesResponse,
        GetSettlementsResponse, PingResponse, ProcessMatchesResponse, SubmitOrderRequest,
        SubmitOrderResponse, SubmitSignatureRequest, SubmitSignatureResponse,
    },
    EmptyRequestResponse,
};
use hyper::{
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
    Body, Error as HyperError, Method, Request, Response, Server,
};
use job_types::{
    matching_engine::{MatchingEngineJob, MatchingEngineQueue},
    settlement_manager::{SettlementManagerJob, SettlementManagerQueue},
};
use state::State;
use tokio::sync::oneshot;
use umbra_crypto::{
    commitments::{compute_asset_hash, compute_order_commitment},
    fields::scalar_from_decimal_string,
};
use uuid::Uuid;

use super::{
    error::{bad_request, internal_error, ApiServerError},
    router::{Router, TypedHandler, UrlParams},
    validation::{parse_amount, validate_address, validate_expiry, validate_symbol},
    worker::ApiServerConfig,
};

/// The :asset param in a URL
const ASSET_URL_PARAM: &str = "asset";
/// The :trader param in a URL
const TRADER_URL_PARAM: &str = "trader";
/// The :match_id param in a URL
const MATCH_ID_URL_PARAM: &str = "match_id";

/// The error message given when the matching engine is unreachable
const ERR_ENGINE_UNAVAILABLE: &str = "matching engine unavailable";
/// The error message given when the settlement manager is unreachable
const ERR_SETTLEMENT_UNAVAILABLE: &str = "settlement manager unavailable";

// ---------------
// | HTTP Routes |
// ---------------

/// Health check
const PING_ROUTE: &str = "/v0/ping";
/// Submit a private order
const SUBMIT_ORDER_ROUTE: &str = "/v0/order";
/// Returns the book snapshot for the given asset
const ORDER_BOOK_ROUTE: &str = "/v0/order_book/:asset";
/// Returns all completed matches
const MATCHES_ROUTE: &str = "/v0/matches";
/// Returns all settlement records
const SETTLEMENTS_ROUTE: &str = "/v0/settlements";
/// Returns the settlement records involving one trader
const TRADER_SETTLEMENTS_ROUTE: &str = "/v0/settlements/trader/:trader";
/// Upload one party's settlement signature
const SUBMIT_SIGNATURE_ROUTE: &str = "/v0/settlements/:match_id/signature";
/// Administrative trigger draining the pending match queue
const PROCESS_MATCHES_ROUTE: &str = "/v0/admin/process-matches";

// ----------------
// | Router Setup |
// ----------------

/// A wrapper around the router and the request serving loop
#[derive(Clone)]
pub(super) struct HttpServer {
    /// The http router, used to dispatch requests to handlers
    router: Arc<Router>,
    /// The port the server listens on
    http_port: u16,
}

impl HttpServer {
    /// Create a new http server
    pub(super) fn new(config: &ApiServerConfig) -> Self {
        let router = Self::build_router(config);
        Self { router: Arc::new(router), http_port: config.http_port }
    }

    /// Build a router and register routes on it
    fn build_router(config: &ApiServerConfig) -> Router {
        let mut router = Router::new();

        router.add_route(Method::GET, PING_ROUTE.to_string(), PingHandler::new());

        router.add_route(
            Method::POST,
            SUBMIT_ORDER_ROUTE.to_string(),
            SubmitOrderHandler::new(config.matching_engine_queue.clone(), config.state.clone()),
        );

        router.add_route(
            Method::GET,
            ORDER_BOOK_ROUTE.to_string(),
            GetOrderBookHandler::new(config.state.clone()),
        );

        router.add_route(
            Method::GET,
            MATCHES_ROUTE.to_string(),
            GetMatchesHandler::new(config.state.clone()),
        );

        router.add_route(
            Method::GET,
            SETTLEMENTS_ROUTE.to_string(),
            GetSettlementsHandler::new(config.state.clone()),
        );

        router.add_route(
            Method::GET,
            TRADER_SETTLEMENTS_ROUTE.to_string(),
            GetSettlementsHandler::new(config.state.clone()),
        );

        router.add_route(
            Method::POST,
            SUBMIT_SIGNATURE_ROUTE.to_string(),
            SubmitSignatureHandler::new(config.settlement_queue.clone()),
        );

        router.add_route(
            Method::POST,
            PROCESS_MATCHES_ROUTE.to_string(),
            ProcessMatchesHandler::new(config.settlement_queue.clone()),
        );

        router
    }

    /// The execution loop for the http server: accepts incoming
    /// connections, serves them, and awaits the next connection
    pub(super) async fn execution_loop(self) -> Result<(), ApiServerError> {
        // Clone self into each layer of the service callback
        let self_clone = self.clone();
        let make_service = make_service_fn(move |_: &AddrStream| {
            let self_clone = self_clone.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let self_clone = self_clone.clone();
                    async move { Ok::<_, HyperError>(self_clone.serve_request(req).await) }
                }))
            }
        });

        let addr: SocketAddr = format!("0.0.0.0:{}", self.http_port)
            .parse()
            .map_err(|_| ApiServerError::Setup("invalid http bind address".to_string()))?;
        Server::bind(&addr)
            .serve(make_service)
            .await
            .map_err(|err| ApiServerError::HttpServerFailure(err.to_string()))
    }

    /// Serve an http request
    async fn serve_request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .handle_req(req.method().to_owned(), req.uri().path().to_string(), req)
            .await
    }
}

// ----------------
// | Generic APIs |
// ----------------

/// Handler for the ping route
#[derive(Clone, Debug)]
pub struct PingHandler;
impl PingHandler {
    /// Create a new handler for "/ping"
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for PingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TypedHandler for PingHandler {
    type Request = EmptyRequestResponse;
    type Response = PingResponse;

    async fn handle_typed(
        &self,
        _req: Self::Request,
        _params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        Ok(PingResponse { timestamp: now_millis() })
    }
}

// ----------
// | Orders |
// ----------

/// Handler for submitting a private order
pub struct SubmitOrderHandler {
    /// The matching engine's job queue
    engine_queue: MatchingEngineQueue,
    /// A handle on the global state, for whitelist validation
    state: State,
}

impl SubmitOrderHandler {
    /// Create a new handler for order submission
    pub fn new(engine_queue: MatchingEngineQueue, state: State) -> Self {
        Self { engine_queue, state }
    }

    /// Validate a submission and translate it into a book order
    fn validate_order(&self, req: &SubmitOrderRequest) -> Result<PrivateOrder, String> {
        validate_address(&req.trader)?;
        validate_address(&req.asset_address)?;
        validate_symbol(&req.symbol)?;
        let quantity = parse_amount(&req.quantity, "quantity")?;
        let price = parse_amount(&req.price, "price")?;
        validate_expiry(req.expiry)?;

        let commitment = scalar_from_decimal_string(&req.commitment)?;
        let secret = scalar_from_decimal_string(&req.secret)?;
        let nonce = scalar_from_decimal_string(&req.nonce)?;

        // The commitment must be reproducible from the submitted opening
        let asset_hash = compute_asset_hash(&req.asset_address);
        let expected = compute_order_commitment(
            asset_hash,
            req.side.to_u8(),
            quantity,
            price,
            nonce,
            secret,
        );
        if expected != commitment {
            return Err(
                "commitment is not reproducible from the submitted parameters".to_string()
            );
        }

        let whitelist_index = req.whitelist_index as usize;
        if whitelist_index >= self.state.whitelist().n_members() {
            return Err(format!("whitelist index {whitelist_index} out of range"));
        }

        Ok(PrivateOrder {
            id: Uuid::new_v4(),
            commitment,
            trader: req.trader.clone(),
            asset_address: req.asset_address.clone(),
            side: req.side,
            quantity,
            price,
            secret,
            nonce,
            // Stamped by the ingest actor
            timestamp: 0,
            expiry: req.expiry,
            whitelist_index,
        })
    }
}

#[async_trait]
impl TypedHandler for SubmitOrderHandler {
    type Request = SubmitOrderRequest;
    type Response = SubmitOrderResponse;

    async fn handle_typed(
        &self,
        req: Self::Request,
        _params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let order = self.validate_order(&req).map_err(bad_request)?;

        let (response_tx, response_rx) = oneshot::channel();
        self.engine_queue
            .send(MatchingEngineJob::SubmitOrder { order, response_channel: response_tx })
            .map_err(|_| internal_error(ERR_ENGINE_UNAVAILABLE.to_string()))?;

        let result = response_rx
            .await
            .map_err(|_| internal_error(ERR_ENGINE_UNAVAILABLE.to_string()))?;

        Ok(SubmitOrderResponse {
            accepted: true,
            matches: result.matches.iter().map(ApiMatch::from).collect(),
            order_book: ApiOrderBook::from(&result.book_snapshot),
            no_match_reason: result.no_match_reason,
        })
    }
}

/// Handler for reading an asset's book snapshot
pub struct GetOrderBookHandler {
    /// A handle on the global state
    state: State,
}

impl GetOrderBookHandler {
    /// Create a new handler for the order book route
    pub fn new(state: State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TypedHandler for GetOrderBookHandler {
    type Request = EmptyRequestResponse;
    type Response = ApiOrderBook;

    async fn handle_typed(
        &self,
        _req: Self::Request,
        params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let asset = params
            .get(ASSET_URL_PARAM)
            .ok_or_else(|| bad_request("missing asset".to_string()))?;

        let snapshot = self.state.book_snapshot(asset);
        Ok(ApiOrderBook::from(&snapshot))
    }
}

// -----------
// | Matches |
// -----------

/// Handler for listing completed matches
pub struct GetMatchesHandler {
    /// A handle on the global state
    state: State,
}

impl GetMatchesHandler {
    /// Create a new handler for the matches route
    pub fn new(state: State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TypedHandler for GetMatchesHandler {
    type Request = EmptyRequestResponse;
    type Response = GetMatchesResponse;

    async fn handle_typed(
        &self,
        _req: Self::Request,
        _params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let matches =
            self.state.completed_matches().iter().map(ApiMatch::from).collect();
        Ok(GetMatchesResponse { matches })
    }
}

// ---------------
// | Settlements |
// ---------------

/// Handler for listing settlement records, optionally scoped to a trader
pub struct GetSettlementsHandler {
    /// A handle on the global state
    state: State,
}

impl GetSettlementsHandler {
    /// Create a new handler for the settlements routes
    pub fn new(state: State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TypedHandler for GetSettlementsHandler {
    type Request = EmptyRequestResponse;
    type Response = GetSettlementsResponse;

    async fn handle_typed(
        &self,
        _req: Self::Request,
        params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let trader = params.get(TRADER_URL_PARAM).map(String::as_str);
        let settlements = self
            .state
            .settlements(trader)
            .iter()
            .map(ApiSettlementRecord::from)
            .collect();
        Ok(GetSettlementsResponse { settlements })
    }
}

/// Handler for uploading one party's settlement signature
pub struct SubmitSignatureHandler {
    /// The settlement manager's job queue
    settlement_queue: SettlementManagerQueue,
}

impl SubmitSignatureHandler {
    /// Create a new handler for signature uploads
    pub fn new(settlement_queue: SettlementManagerQueue) -> Self {
        Self { settlement_queue }
    }
}

#[async_trait]
impl TypedHandler for SubmitSignatureHandler {
    type Request = SubmitSignatureRequest;
    type Response = SubmitSignatureResponse;

    async fn handle_typed(
        &self,
        req: Self::Request,
        params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let match_id = params
            .get(MATCH_ID_URL_PARAM)
            .ok_or_else(|| bad_request("missing match id".to_string()))?
            .clone();

        let (response_tx, response_rx) = oneshot::channel();
        self.settlement_queue
            .send(SettlementManagerJob::SubmitSignature {
                match_id,
                role: req.role,
                signature: req.signature,
                response_channel: response_tx,
            })
            .map_err(|_| internal_error(ERR_SETTLEMENT_UNAVAILABLE.to_string()))?;

        let status = response_rx
            .await
            .map_err(|_| internal_error(ERR_SETTLEMENT_UNAVAILABLE.to_string()))?
            .map_err(bad_request)?;

        Ok(SubmitSignatureResponse {
            buyer_signed: status.buyer_signed,
            seller_signed: status.seller_signed,
        })
    }
}

// ---------
// | Admin |
// ---------

/// Handler for the administrative pending-match drain
pub struct ProcessMatchesHandler {
    /// The settlement manager's job queue
    settlement_queue: SettlementManagerQueue,
}

impl ProcessMatchesHandler {
    /// Create a new handler for the admin drain route
    pub fn new(settlement_queue: SettlementManagerQueue) -> Self {
        Self { settlement_queue }
    }
}

#[async_trait]
impl TypedHandler for ProcessMatchesHandler {
    type Request = EmptyRequestResponse;
    type Response = ProcessMatchesResponse;

    async fn handle_typed(
        &self,
        _req: Self::Request,
        _params: UrlParams,
    ) -> Result<Self::Response, ApiServerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.settlement_queue
            .send(SettlementManagerJob::ProcessPending { response_channel: response_tx })
            .map_err(|_| internal_error(ERR_SETTLEMENT_UNAVAILABLE.to_string()))?;

        let processed = response_rx
            .await
            .map_err(|_| internal_error(ERR_SETTLEMENT_UNAVAILABLE.to_string()))?;
        Ok(ProcessMatchesResponse { processed })
    }
}

#[cfg(test)]
mod http_handler_tests {
    use common::types::OrderSide;
    use job_types::matching_engine::new_matching_engine_queue;
    use state::WhitelistSnapshot;
    use umbra_crypto::{
        commitments::generate_order_commitment, fields::scalar_to_decimal_string,
    };

    use super::*;

    /// A well-formed trader address
    const TRADER: &str = "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    /// A well-formed asset address
    const ASSET: &str = "CBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

    /// Build a consistent submission request
    fn valid_request() -> SubmitOrderRequest {
        let asset_hash = compute_asset_hash(ASSET);
        let commitment = generate_order_commitment(asset_hash, 0, 100, 50);

        SubmitOrderRequest {
            trader: TRADER.to_string(),
            asset_address: ASSET.to_string(),
            symbol: "gold".to_string(),
            side: OrderSide::Buy,
            quantity: "100".to_string(),
            price: "50".to_string(),
            commitment: scalar_to_decimal_string(&commitment.commitment),
            secret: scalar_to_decimal_string(&commitment.secret),
            nonce: scalar_to_decimal_string(&commitment.nonce),
            expiry: now_millis() + 60_000,
            whitelist_index: 0,
        }
    }

    /// Build a submit handler over a single-member whitelist
    fn submit_handler() -> SubmitOrderHandler {
        let (queue, _receiver) = new_matching_engine_queue();
        let state = State::new(WhitelistSnapshot::build(&[TRADER.to_string()]));
        SubmitOrderHandler::new(queue, state)
    }

    /// Tests that a well-formed submission validates
    #[test]
    fn test_valid_order_passes_validation() {
        let handler = submit_handler();
        let order = handler.validate_order(&valid_request()).unwrap();

        assert_eq!(order.quantity, 100);
        assert_eq!(order.price, 50);
        assert_eq!(order.side, OrderSide::Buy);
    }

    /// Tests rejection of a malformed trader address
    #[test]
    fn test_malformed_address_rejected() {
        let handler = submit_handler();
        let mut req = valid_request();
        req.trader = "not-an-address".to_string();

        assert!(handler.validate_order(&req).is_err());
    }

    /// Tests rejection when the commitment does not open
    #[test]
    fn test_irreproducible_commitment_rejected() {
        let handler = submit_handler();
        let mut req = valid_request();
        // Tamper with the price; the commitment no longer opens
        req.price = "51".to_string();

        let err = handler.validate_order(&req).unwrap_err();
        assert!(err.contains("commitment"));
    }

    /// Tests rejection of an out-of-range whitelist index
    #[test]
    fn test_out_of_range_whitelist_index_rejected() {
        let handler = submit_handler();
        let mut req = valid_request();
        req.whitelist_index = 5;

        let err = handler.validate_order(&req).unwrap_err();
        assert!(err.contains("whitelist index"));
    }

    /// Tests rejection of an already-expired deadline
    #[test]
    fn test_expired_deadline_rejected() {
        let handler = submit_handler();
        let mut req = valid_request();
        req.expiry = 1;

        assert!(handler.validate_order(&req).is_err());
    }
}
