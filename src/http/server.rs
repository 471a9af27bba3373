//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the Axum router from the service registry
//! - Wire the middleware pipeline (tracing, correlation, CORS, rate limit,
//!   timeout) and the per-service filters (auth, feature gate)
//! - Buffer inbound bodies and hand requests to the resilient client
//! - Serve the health and circuit diagnostics endpoints
//! - Bind the listener and drain connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{self, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{CorsConfig, GatewayConfig};
use crate::features::{feature_gate_middleware, FeatureGate, GatedRoute};
use crate::http::error::{tag_response, GatewayError};
use crate::http::request::{correlation_middleware, RequestContext, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::ResilientClient;
use crate::registry::{RegistryError, ServiceRegistry};
use crate::resilience::CircuitBreakers;
use crate::security::auth::{require_auth, TokenVerifier};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers and route filters.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub client: Arc<ResilientClient>,
    pub verifier: TokenVerifier,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub max_body_bytes: usize,
    pub started_at: Instant,
}

/// The gateway's HTTP front end.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Assemble the full pipeline from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, RegistryError> {
        let registry = Arc::new(ServiceRegistry::from_config(&config)?);
        let breakers = Arc::new(CircuitBreakers::new(&config.circuit_breaker));
        let client = Arc::new(ResilientClient::new(
            breakers,
            &config.retries,
            &config.upstream,
        ));
        let gate = Arc::new(FeatureGate::from_config(config.features.clone()));
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&config.rate_limit)));

        let state = AppState {
            registry,
            client,
            verifier: TokenVerifier::new(&config.auth.jwt_secret),
            rate_limiter,
            max_body_bytes: config.listener.max_body_bytes,
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state, gate);
        Ok(Self { router, config })
    }

    /// Build the Axum router: registry-driven routes inside, the global
    /// middleware stack outside.
    fn build_router(config: &GatewayConfig, state: AppState, gate: Arc<FeatureGate>) -> Router {
        let mut router = Router::new()
            .route("/health", get(health))
            .route("/gateway/circuits", get(circuit_diagnostics));

        for descriptor in state.registry.descriptors() {
            let name = descriptor.name.clone();
            let handler = {
                let name = name.clone();
                any(move |State(state): State<AppState>, request: Request<Body>| {
                    let name = name.clone();
                    async move { proxy_to_service(state, name, request).await }
                })
            };

            let mut routes: Router<AppState> = Router::new()
                .route(&format!("/api/v1/{name}"), handler.clone())
                .route(&format!("/api/v1/{name}/{{*rest}}"), handler);

            // Filters are route layers so they only run on matched routes.
            // Auth is added last, which places it outermost: the gate sees a
            // context the auth filter has already populated.
            if let Some(feature) = config.gated_services.get(&name) {
                routes = routes.route_layer(middleware::from_fn_with_state(
                    GatedRoute {
                        gate: gate.clone(),
                        feature: feature.clone(),
                    },
                    feature_gate_middleware,
                ));
            }
            if descriptor.requires_auth {
                routes = routes.route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_auth,
                ));
            }

            router = router.merge(routes);
        }

        router
            .fallback(not_found)
            .with_state(state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
            .layer(cors_layer(&config.cors))
            .layer(middleware::from_fn(correlation_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown channel fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "Gateway listening"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("Draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origin == "*" {
        return CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any);
    }

    let mut layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, X_REQUEST_ID])
        .allow_credentials(true);
    match config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => layer = layer.allow_origin(origin),
        Err(_) => {
            tracing::error!(
                origin = %config.allowed_origin,
                "Invalid allowed origin, refusing cross-origin requests"
            );
        }
    }
    layer
}

/// Forward one matched request to its backend service.
async fn proxy_to_service(state: AppState, name: String, request: Request<Body>) -> Response {
    let started = Instant::now();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::new(String::new()));
    let method = request.method().clone();
    let method_str = method.to_string();
    let original_path = request.uri().path().to_string();

    let Some(service) = state.registry.resolve(&name) else {
        let response = GatewayError::UnknownService(name.clone()).into_response_for(&ctx, &original_path);
        metrics::record_request(&method_str, response.status().as_u16(), &name, started);
        return response;
    };

    // Strip the route prefix; the backend sees only its own paths.
    let suffix_at = "/api/v1/".len() + name.len();
    let suffix = original_path.get(suffix_at..).unwrap_or("");
    let mut path_and_query = if suffix.is_empty() {
        String::from("/")
    } else {
        suffix.to_string()
    };
    if let Some(query) = request.uri().query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            let response = GatewayError::BodyTooLarge.into_response_for(&ctx, &original_path);
            metrics::record_request(&method_str, response.status().as_u16(), &name, started);
            return response;
        }
    };

    tracing::debug!(
        request_id = %ctx.correlation_id,
        method = %method_str,
        path = %original_path,
        service = %name,
        "Proxying request"
    );

    let response = state
        .client
        .call(service, method, &path_and_query, &parts.headers, bytes, &ctx)
        .await;

    match response {
        Ok(response) => {
            let response = tag_response(response, &ctx.correlation_id);
            metrics::record_request(&method_str, response.status().as_u16(), &name, started);
            tracing::info!(
                request_id = %ctx.correlation_id,
                method = %method_str,
                path = %original_path,
                service = %name,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Proxied request"
            );
            response
        }
        Err(err) => {
            let response = err.into_response_for(&ctx, &original_path);
            metrics::record_request(&method_str, response.status().as_u16(), &name, started);
            response
        }
    }
}

/// Liveness endpoint. Reports the registry so operators can see what the
/// gateway thinks it fronts.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let services: Vec<&str> = state.registry.names().collect();
    Json(json!({
        "status": "ok",
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "services": services,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Diagnostic view of every circuit breaker the gateway has touched.
async fn circuit_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "circuits": state.client.breakers().snapshots() }))
}

/// Fallback for paths outside every mounted route group.
async fn not_found(request: Request<Body>) -> Response {
    let started = Instant::now();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::new(String::new()));
    let path = request.uri().path().to_string();

    let error = path
        .strip_prefix("/api/v1/")
        .and_then(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .map(|segment| GatewayError::UnknownService(segment.to_string()))
        .unwrap_or(GatewayError::RouteNotFound);

    let response = error.into_response_for(&ctx, &path);
    metrics::record_request(
        request.method().as_str(),
        response.status().as_u16(),
        "none",
        started,
    );
    response
}
