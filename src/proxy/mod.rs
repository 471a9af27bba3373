//! Upstream forwarding.
//!
//! # Data Flow
//!
//! ```text
//! buffered request + ServiceDescriptor
//!    │
//!    ├── breaker admit ── Rejected ──────────────> 503 fail fast
//!    │                └── Probe: single attempt, no retries
//!    │
//!    └── attempt loop (shared deadline budget)
//!           ├── strip hop-by-hop, set x-request-id
//!           ├── send with remaining budget as the attempt timeout
//!           ├── response received ──> record outcome ──> pass through
//!           └── timeout / connect error ──> record failure
//!                  └── eligible and budget left? backoff, try again
//!                     otherwise a synthesized 502
//! ```
//!
//! # Design Decisions
//!
//! - Inbound bodies are buffered once up front (bounded by the listener's
//!   body cap) so any attempt can resend identical bytes.
//! - The deadline is a budget, not a per-attempt allowance. Backoff sleeps
//!   draw from it too, so worst-case latency stays the configured timeout.
//! - Breakers see every attempt, not just final outcomes. Five timeouts
//!   inside one caller's retry loop are five independent pieces of
//!   evidence that the service is down.
//! - Backend responses are sacred: passed through byte for byte, 4xx and
//!   5xx included. The gateway only synthesizes when it has nothing.

mod client;

pub use client::ResilientClient;
