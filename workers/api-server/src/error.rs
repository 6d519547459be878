//! Defines errors emitted by the API server

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use hyper::StatusCode;

/// The error type emitted by the API server
#[derive(Clone, Debug)]
pub enum ApiServerError {
    /// An error setting up the server
    Setup(String),
    /// The HTTP server failed
    HttpServerFailure(String),
    /// The websocket server failed
    WebsocketServerFailure(String),
    /// A typed HTTP failure with an explicit status code
    HttpStatusCode(StatusCode, String),
    /// The coordinator cancelled the worker's execution
    Cancelled(String),
}

impl Error for ApiServerError {}
impl Display for ApiServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ApiServerError::HttpStatusCode(_, msg) => write!(f, "{msg}"),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// Construct an HTTP 400 (Bad Request) error
pub fn bad_request(message: String) -> ApiServerError {
    ApiServerError::HttpStatusCode(StatusCode::BAD_REQUEST, message)
}

/// Construct an HTTP 404 (Not Found) error
pub fn not_found(message: String) -> ApiServerError {
    ApiServerError::HttpStatusCode(StatusCode::NOT_FOUND, message)
}

/// Construct an HTTP 500 (Internal Server Error) error
pub fn internal_error(message: String) -> ApiServerError {
    ApiServerError::HttpStatusCode(StatusCode::INTERNAL_SERVER_ERROR, message)
}
