//! Gateway error taxonomy and the standard error envelope.
//!
//! Every failure the gateway synthesizes (as opposed to responses passed
//! through from a backend) is rendered as the same JSON envelope:
//! `{"error": ..., "requestId": ..., "timestamp": ...}` with an HTTP status
//! reflecting the failure kind. Backend-originated bodies are never
//! rewritten into this shape.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::security::auth::AuthError;

/// A failure handled at the gateway, before or instead of a backend answer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Unauthorized(#[from] AuthError),

    #[error("feature '{0}' is not enabled for this account")]
    FeatureDenied(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("no route matched")]
    RouteNotFound,

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("service '{0}' is temporarily unavailable")]
    CircuitOpen(String),

    #[error("request to '{0}' timed out")]
    UpstreamTimeout(String),

    #[error("could not reach service '{0}'")]
    UpstreamUnreachable(String),

    #[error("request body too large")]
    BodyTooLarge,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::FeatureDenied(_) => StatusCode::FORBIDDEN,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound | GatewayError::UnknownService(_) => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamTimeout(_) | GatewayError::UpstreamUnreachable(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Failure kind label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized(_) => "unauthorized",
            GatewayError::FeatureDenied(_) => "feature_denied",
            GatewayError::RateLimited => "rate_limited",
            GatewayError::RouteNotFound => "route_not_found",
            GatewayError::UnknownService(_) => "unknown_service",
            GatewayError::CircuitOpen(_) => "circuit_open",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::BodyTooLarge => "body_too_large",
        }
    }

    /// Log the failure with its correlation id and render the envelope.
    pub fn into_response_for(self, ctx: &RequestContext, path: &str) -> Response {
        tracing::warn!(
            request_id = %ctx.correlation_id,
            path = %path,
            kind = self.kind(),
            error = %self,
            "Request failed at gateway"
        );

        let status = self.status();
        let body = ErrorBody::new(self.to_string(), ctx.correlation_id.clone());
        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

/// The standard error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub request_id: String,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: String, request_id: String) -> Self {
        Self {
            error,
            request_id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Ensure a passed-through backend response carries the correlation id.
pub fn tag_response(mut response: Response<Body>, correlation_id: &str) -> Response<Body> {
    if !response.headers().contains_key(X_REQUEST_ID) {
        if let Ok(value) = HeaderValue::from_str(correlation_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
    }
    // Content sniffing protection on everything the gateway returns.
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_camel_case_keys() {
        let body = ErrorBody::new("boom".into(), "req-1".into());
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["error"], "boom");
        assert_eq!(json["requestId"], "req-1");
        let ts = json["timestamp"].as_str().unwrap();
        assert!(ts.contains('T') && ts.ends_with('Z'), "not ISO-8601: {ts}");
    }

    #[test]
    fn statuses_match_failure_kinds() {
        assert_eq!(GatewayError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            GatewayError::UnknownService("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::CircuitOpen("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::UpstreamTimeout("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::FeatureDenied("x".into()).status(),
            StatusCode::FORBIDDEN
        );
    }
}
