//! # error
//!
//! [`BridgeError`] is the failure taxonomy of the control loop. None of these
//! are fatal: each is logged by the component that produced it and the loop
//! keeps running.
//!
//! [`ApiError`] is what the event-ingress handlers return; Axum's
//! `IntoResponse` impl turns it into a JSON error body so the expert advisor
//! always gets a machine-readable response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::{parser::ParseError, validator::RejectReason};

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Timeout, connection failure or non-success status. Buffered state is
    /// kept for the next natural trigger.
    #[error("Network error: {0}")]
    Network(String),

    /// Signal failed a risk check. Discarded, never retried.
    #[error("Signal rejected: {0}")]
    Validation(RejectReason),

    /// Order rejected by the venue. Dropped, never retried.
    #[error("Trade execution error: {0}")]
    Execution(String),

    /// Malformed payload. Treated as "no signal".
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The payload was well-formed but not for this session.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The control loop has stopped accepting events.
    #[error("Bridge unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "ok":    false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
