//! The forwarding engine: one buffered inbound request in, one upstream
//! response (or a synthesized failure) out, with the breaker consulted and
//! fed on every attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{RetryConfig, UpstreamConfig};
use crate::http::error::GatewayError;
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::observability::metrics;
use crate::registry::ServiceDescriptor;
use crate::resilience::backoff::backoff_delay;
use crate::resilience::retries::{outcome_retryable, retry_eligible, RETRYABLE_MARK};
use crate::resilience::{Admission, CircuitBreakers};

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Headers that describe the gateway-to-client hop and must not be
/// forwarded. Content-Length is recomputed from the buffered body.
const HOP_BY_HOP: [HeaderName; 10] = [
    header::HOST,
    header::CONNECTION,
    KEEP_ALIVE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// HTTP client wrapping every upstream call in the resilience stack:
/// circuit breaker admission, per-attempt timeouts drawn from a shared
/// deadline budget, and bounded retries with jittered backoff.
pub struct ResilientClient {
    client: Client<HttpConnector, Body>,
    breakers: Arc<CircuitBreakers>,
    max_attempts: u32,
    retry_base: Duration,
    retry_max: Duration,
    request_timeout: Duration,
}

impl ResilientClient {
    pub fn new(
        breakers: Arc<CircuitBreakers>,
        retry: &RetryConfig,
        upstream: &UpstreamConfig,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(upstream.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            breakers,
            max_attempts: retry.max_attempts.max(1),
            retry_base: Duration::from_millis(retry.base_delay_ms),
            retry_max: Duration::from_millis(retry.max_delay_ms),
            request_timeout: Duration::from_secs(upstream.timeout_secs),
        }
    }

    pub fn breakers(&self) -> &CircuitBreakers {
        &self.breakers
    }

    /// Forward one request to `service`.
    ///
    /// The whole call, every attempt and every backoff sleep, runs under a
    /// single deadline budget. A response received from the backend is
    /// passed through whatever its status; `Err` means the gateway never
    /// got one.
    pub async fn call(
        &self,
        service: &ServiceDescriptor,
        method: Method,
        path_and_query: &str,
        inbound_headers: &HeaderMap,
        body: Bytes,
        ctx: &RequestContext,
    ) -> Result<Response<Body>, GatewayError> {
        let admission = self.breakers.admit(&service.name);
        if admission == Admission::Rejected {
            metrics::record_circuit_rejection(&service.name);
            return Err(GatewayError::CircuitOpen(service.name.clone()));
        }

        let deadline = Instant::now() + self.request_timeout;
        let uri = self.target_uri(service, path_and_query)?;
        let forward_headers = self.sanitized_headers(inbound_headers, ctx);

        // A half-open probe must stay a single call; retrying it would
        // multiply load on a service we believe is down.
        let max_attempts = if admission == Admission::Probe {
            1
        } else if retry_eligible(&method, inbound_headers) {
            self.max_attempts
        } else {
            1
        };

        let mut attempt: u32 = 0;
        let mut last_error = GatewayError::UpstreamUnreachable(service.name.clone());

        while attempt < max_attempts {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                last_error = GatewayError::UpstreamTimeout(service.name.clone());
                break;
            }

            let mut request = Request::new(Body::from(body.clone()));
            *request.method_mut() = method.clone();
            *request.uri_mut() = uri.clone();
            *request.headers_mut() = forward_headers.clone();

            let attempt_started = Instant::now();
            match tokio::time::timeout(remaining, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    metrics::record_upstream_attempt(&service.name, attempt_started);
                    tracing::debug!(
                        service = %service.name,
                        request_id = %ctx.correlation_id,
                        attempt,
                        status = status.as_u16(),
                        elapsed_ms = attempt_started.elapsed().as_millis() as u64,
                        "Upstream call answered"
                    );
                    if status.is_server_error() {
                        self.breakers.record_failure(&service.name);
                    } else if status.is_client_error() {
                        self.breakers.record_client_error(&service.name);
                    } else {
                        self.breakers.record_success(&service.name);
                    }

                    if attempt < max_attempts
                        && outcome_retryable(Some(status))
                        && self.pause_before_retry(attempt, deadline, service, ctx).await
                    {
                        continue;
                    }

                    let (parts, body) = response.into_parts();
                    return Ok(Response::from_parts(parts, Body::new(body)));
                }
                Ok(Err(err)) => {
                    metrics::record_upstream_attempt(&service.name, attempt_started);
                    self.breakers.record_failure(&service.name);
                    tracing::warn!(
                        service = %service.name,
                        request_id = %ctx.correlation_id,
                        attempt,
                        elapsed_ms = attempt_started.elapsed().as_millis() as u64,
                        error = %err,
                        "Upstream connection failed"
                    );
                    last_error = GatewayError::UpstreamUnreachable(service.name.clone());
                }
                Err(_) => {
                    metrics::record_upstream_attempt(&service.name, attempt_started);
                    self.breakers.record_failure(&service.name);
                    tracing::warn!(
                        service = %service.name,
                        request_id = %ctx.correlation_id,
                        attempt,
                        budget_ms = remaining.as_millis() as u64,
                        "Upstream attempt timed out"
                    );
                    last_error = GatewayError::UpstreamTimeout(service.name.clone());
                }
            }

            if attempt < max_attempts && self.pause_before_retry(attempt, deadline, service, ctx).await
            {
                continue;
            }
            break;
        }

        Err(last_error)
    }

    /// Sleep out the backoff for `attempt` if the deadline budget still
    /// covers it. Returns false when the budget is spent, which ends the
    /// retry loop.
    async fn pause_before_retry(
        &self,
        attempt: u32,
        deadline: Instant,
        service: &ServiceDescriptor,
        ctx: &RequestContext,
    ) -> bool {
        let delay = backoff_delay(attempt, self.retry_base, self.retry_max);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if delay >= remaining {
            tracing::debug!(
                service = %service.name,
                request_id = %ctx.correlation_id,
                "Deadline budget spent, not retrying"
            );
            return false;
        }

        metrics::record_retry(&service.name);
        tracing::info!(
            service = %service.name,
            request_id = %ctx.correlation_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
        true
    }

    fn target_uri(
        &self,
        service: &ServiceDescriptor,
        path_and_query: &str,
    ) -> Result<Uri, GatewayError> {
        let base = &service.base_address;
        let prefix = base.path().trim_end_matches('/');
        let target = format!(
            "{}://{}{}{}",
            base.scheme(),
            base.authority(),
            prefix,
            path_and_query
        );
        target
            .parse()
            .map_err(|_| GatewayError::UpstreamUnreachable(service.name.clone()))
    }

    fn sanitized_headers(&self, inbound: &HeaderMap, ctx: &RequestContext) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
        for (name, value) in inbound {
            if HOP_BY_HOP.iter().any(|h| h == name) || name.as_str() == RETRYABLE_MARK {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id) {
            headers.insert(X_REQUEST_ID, value);
        }
        headers
    }
}
