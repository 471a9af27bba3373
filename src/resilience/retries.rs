//! Retry eligibility rules.
//!
//! # Responsibilities
//! - Decide whether a request may be retried at all (idempotent methods, or
//!   an explicit opt-in mark)
//! - Decide whether an attempt's outcome warrants another attempt
//!
//! # Design Decisions
//! - POST and PATCH are never retried unless the caller marks the request
//!   with `x-retryable: true`
//! - Transport errors and timeouts are always retry-worthy outcomes; among
//!   responses only 5xx is, and 4xx never
//! - Eligibility and outcome are orthogonal checks; both must pass

use axum::http::{HeaderMap, Method, StatusCode};

/// Header a caller sets to opt a non-idempotent request into retries.
pub const RETRYABLE_MARK: &str = "x-retryable";

/// True for methods safe to repeat: GET, HEAD, PUT, DELETE.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE
    )
}

/// Whether this request may be retried at all, independent of outcome.
pub fn retry_eligible(method: &Method, headers: &HeaderMap) -> bool {
    if is_idempotent(method) {
        return true;
    }
    headers
        .get(RETRYABLE_MARK)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Whether an attempt's outcome warrants another attempt.
///
/// `status` is `None` when no response was received (connect error or
/// timeout); those always qualify. Received responses qualify only for 5xx.
pub fn outcome_retryable(status: Option<StatusCode>) -> bool {
    match status {
        None => true,
        Some(s) => s.is_server_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn idempotent_methods_are_eligible() {
        let headers = HeaderMap::new();
        for method in [Method::GET, Method::HEAD, Method::PUT, Method::DELETE] {
            assert!(retry_eligible(&method, &headers), "{method}");
        }
        assert!(!retry_eligible(&Method::POST, &headers));
        assert!(!retry_eligible(&Method::PATCH, &headers));
    }

    #[test]
    fn explicit_mark_makes_post_eligible() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRYABLE_MARK, HeaderValue::from_static("true"));
        assert!(retry_eligible(&Method::POST, &headers));

        headers.insert(RETRYABLE_MARK, HeaderValue::from_static("false"));
        assert!(!retry_eligible(&Method::POST, &headers));
    }

    #[test]
    fn only_5xx_and_no_response_warrant_retry() {
        assert!(outcome_retryable(None));
        assert!(outcome_retryable(Some(StatusCode::INTERNAL_SERVER_ERROR)));
        assert!(outcome_retryable(Some(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(!outcome_retryable(Some(StatusCode::NOT_FOUND)));
        assert!(!outcome_retryable(Some(StatusCode::BAD_REQUEST)));
        assert!(!outcome_retryable(Some(StatusCode::OK)));
        assert!(!outcome_retryable(Some(StatusCode::FOUND)));
    }
}
