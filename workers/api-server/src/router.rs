//! Abstracts routing logic from the HTTP server

use std::collections::HashMap;

use async_trait::async_trait;
use hyper::{Body, Method, Request, Response, StatusCode};
use matchit::Router as MatchRouter;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::error::ApiServerError;

/// A type alias for URL generic params maps, i.e. /path/to/resource/:id
pub type UrlParams = HashMap<String, String>;

// -----------
// | Helpers |
// -----------

/// Builds an HTTP 400 (Bad Request) response
pub(super) fn build_400_response(err: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Body::from(err))
        .expect("static response construction cannot fail")
}

/// Builds an HTTP 404 (Not Found) response
pub(super) fn build_404_response(err: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from(err))
        .expect("static response construction cannot fail")
}

/// Builds an HTTP 500 (Internal Server Error) response
pub(super) fn build_500_response(err: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::from(err))
        .expect("static response construction cannot fail")
}

/// Builds an HTTP response with the given status code
pub(super) fn build_response_from_status_code(
    status_code: StatusCode,
    err: String,
) -> Response<Body> {
    Response::builder()
        .status(status_code)
        .body(Body::from(err))
        .expect("static response construction cannot fail")
}

// -------------------------
// | Trait Implementations |
// -------------------------

/// A handler is attached to a route and handles the process of translating
/// an abstract request type into a response
#[async_trait]
pub trait Handler: Send + Sync {
    /// The handler method for the request/response on the handler's route
    async fn handle(&self, req: Request<Body>, url_params: UrlParams) -> Response<Body>;
}

/// A handler with associated request/response type information attached.
/// Implemented as a subtrait so the router can store trait objects that
/// re-use the serialization logic below
#[async_trait]
pub trait TypedHandler: Send + Sync {
    /// The request type that the handler consumes
    type Request: DeserializeOwned + Send;
    /// The response type that the handler returns
    type Response: Serialize + Send;

    /// The handler logic, translate request into response
    async fn handle_typed(
        &self,
        req: Self::Request,
        url_params: UrlParams,
    ) -> Result<Self::Response, ApiServerError>;
}

/// Auto-implementation of `Handler` for any `TypedHandler`, covering
/// deserialization, error reporting, and response serialization
#[async_trait]
impl<Req: DeserializeOwned + Send, Resp: Serialize, T: TypedHandler<Request = Req, Response = Resp>>
    Handler for T
{
    async fn handle(&self, req: Request<Body>, url_params: UrlParams) -> Response<Body> {
        // Deserialize the body into the request type, HTTP 400 on failure
        let req_body_bytes = match hyper::body::to_bytes(req.into_body()).await {
            Ok(bytes) => bytes,
            Err(e) => return build_400_response(e.to_string()),
        };

        // Serde expects "null" as the serialized version of an empty body
        let mut body: &[u8] = &req_body_bytes;
        if body.is_empty() {
            body = b"null";
        }
        let req_body: Req = match serde_json::from_slice(body) {
            Ok(deserialized) => deserialized,
            Err(e) => return build_400_response(e.to_string()),
        };

        // Forward to the typed handler
        match self.handle_typed(req_body, url_params).await {
            Ok(resp) => Response::builder()
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&resp).expect("response serialization cannot fail"),
                ))
                .expect("static response construction cannot fail"),
            Err(ApiServerError::HttpStatusCode(status, message)) => {
                build_response_from_status_code(status, message)
            },
            Err(err) => build_500_response(err.to_string()),
        }
    }
}

/// Wrapper around a matchit router that allows different HTTP verbs per
/// route
pub struct Router {
    /// The underlying router
    router: MatchRouter<Box<dyn Handler>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new router with no routes established
    pub fn new() -> Self {
        Self { router: MatchRouter::new() }
    }

    /// Helper to build a routable path from a method and a concrete route
    ///
    /// `matchit` matches on URLs only, so the verb is prepended: a POST to
    /// /route matches the entry /POST/route
    fn create_full_route(method: &Method, mut route: String) -> String {
        if !route.starts_with('/') {
            route = format!("/{route}");
        }
        format!("/{method}{route}")
    }

    /// Add a route to the router
    pub fn add_route<H: Handler + 'static>(&mut self, method: Method, route: String, handler: H) {
        debug!("attached handler to route {route} with method {method}");
        let full_route = Self::create_full_route(&method, route);

        self.router
            .insert(full_route, Box::new(handler))
            .expect("error attaching handler to route");
    }

    /// Route a request to a handler
    pub async fn handle_req(
        &self,
        method: Method,
        route: String,
        req: Request<Body>,
    ) -> Response<Body> {
        let full_route = Self::create_full_route(&method, route.clone());

        if let Ok(matched_path) = self.router.at(&full_route) {
            let handler = matched_path.value;
            let params = matched_path.params;

            // Clone the params to take ownership
            let mut params_map = HashMap::with_capacity(params.len());
            for (key, value) in params.iter() {
                params_map.insert(key.to_string(), value.to_string());
            }

            handler.as_ref().handle(req, params_map).await
        } else {
            build_404_response(format!("Route {route} for method {method} not found"))
        }
    }
}
