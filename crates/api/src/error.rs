//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fabric::CallError;

const MALFORMED: &str = "Malformed envelope";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The owning service could not be reached.
    Unavailable(String),
    /// The owning service did not answer in time; the request may have been applied.
    Timeout(String),
    /// The owning service answered with something unreadable.
    BadGateway(String),
}

impl ApiError {
    /// Maps a failed command call. A domain rejection gets `rejected`
    /// (400 for creates, 404 for reads and updates). A failure reply about
    /// the envelope itself, such as a reply too large to frame, is 502.
    pub fn from_call(err: CallError, rejected: StatusCode) -> Self {
        match err {
            CallError::Rejected(message) if message.starts_with(MALFORMED) => ApiError::BadGateway(message),
            CallError::Rejected(message) if rejected == StatusCode::NOT_FOUND => ApiError::NotFound(message),
            CallError::Rejected(message) => ApiError::BadRequest(message),
            CallError::Transport(e) if e.outcome_unknown() => ApiError::Timeout(e.to_string()),
            CallError::Transport(e) if e.is_transport() => ApiError::Unavailable(e.to_string()),
            CallError::Transport(e) => ApiError::BadGateway(e.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg,
            ApiError::Unavailable(msg) | ApiError::Timeout(msg) | ApiError::BadGateway(msg) => {
                tracing::error!(%status, error = %msg, "service call failed");
                msg
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
