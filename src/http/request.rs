//! Per-request identity: correlation ids and the caller attributes the
//! pipeline accumulates as a request moves through the filters.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Header carrying the correlation id end to end.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Identity headers injected toward backends after authentication.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

/// What the gateway knows about a request as it crosses the pipeline.
///
/// Created by the correlation middleware with only an id; the auth filter
/// fills in the caller fields when a token verifies.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub pro_subscriber: bool,
}

impl RequestContext {
    pub fn new(correlation_id: String) -> Self {
        Self {
            correlation_id,
            user_id: None,
            role: None,
            pro_subscriber: false,
        }
    }
}

/// Outermost pipeline stage: adopt the caller's `x-request-id` if present,
/// otherwise mint a v4 UUID. The id is stored in request extensions, kept on
/// the forwarded request headers, and echoed on every response.
pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    // Identity headers are gateway-asserted; never trust inbound copies.
    request.headers_mut().remove(&X_USER_ID);
    request.headers_mut().remove(&X_USER_ROLE);

    let correlation_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    request
        .extensions_mut()
        .insert(RequestContext::new(correlation_id.clone()));

    let mut response = next.run(request).await;

    if !response.headers().contains_key(&X_REQUEST_ID) {
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
    }
    response
}
