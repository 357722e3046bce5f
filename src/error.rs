//! Error types for the proxy
//!
//! Provides unified error handling using thiserror. Every variant maps to
//! the status the client sees; none of them touch cache state.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::proxy::{apply_identity_headers, ALLOWED_METHODS};

// == Proxy Error Enum ==
/// Unified error type for the proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Malformed or missing request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The embedded upstream target could not be parsed
    #[error("Invalid upstream target: {0}")]
    InvalidTarget(String),

    /// Refused by policy (batch too large, recursive batch)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Verb other than GET, HEAD or OPTIONS
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Transport-level upstream failure (DNS, connect, timeout, body read)
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        apply_identity_headers(headers);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if matches!(self, ProxyError::MethodNotAllowed) {
            headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::InvalidRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::InvalidTarget("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ProxyError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let response = ProxyError::MethodNotAllowed.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], ALLOWED_METHODS);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
