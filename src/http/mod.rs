//! HTTP front end of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, registry-driven routes, middleware stack)
//!     → request.rs (correlation id, per-request context)
//!     → [security filters: rate limit, auth] → [feature gate]
//!     → proxy (resilient forwarding)
//!     → error.rs (standard envelope for everything the gateway synthesizes)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod server;

pub use error::{ErrorBody, GatewayError};
pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
