//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a backend service:
//!     → breaker.rs (admit: pass, probe, or fail fast)
//!     → attempt with remaining deadline budget
//!     → on failure: retries.rs (eligible?) + backoff.rs (how long to wait)
//!     → breaker.rs (record per-attempt outcome)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; retries and backoff sleeps consume
//!   from the same budget instead of extending it
//! - Retries only for idempotent requests or an explicit opt-in mark
//! - One breaker per service; failures of one never gate another

pub mod backoff;
pub mod breaker;
pub mod retries;

pub use breaker::{Admission, CircuitBreakers, CircuitSnapshot, CircuitStatus};
