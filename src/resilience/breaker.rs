//! Per-service circuit breakers.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: service assumed down, calls fail fast without a network hop
//! - Half-Open: one probe call tests whether the service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold
//! Open → Half-Open: after the reset timeout, granted to exactly one caller
//! Half-Open → Closed: probe answered (failure counter reset)
//! Half-Open → Open: probe failed (reset timeout restarts)
//! ```
//!
//! # Design Decisions
//! - One state cell per service, locked independently; a failing service
//!   never blocks admission decisions for a healthy one
//! - Locks are held only for the state update itself, never across awaits
//! - Results of calls admitted before the circuit opened are ignored once
//!   it is open; the machine leaves Open only via the reset timeout

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker status for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }
}

/// Mutable fault-tracking record for one service.
#[derive(Debug)]
pub struct CircuitState {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_probe_at: Option<Instant>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_probe_at: None,
        }
    }
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; call normally.
    Allowed,
    /// Circuit was open past its reset timeout; this caller carries the
    /// single half-open probe. Retries must not be applied to a probe.
    Probe,
    /// Circuit open (or a probe is already in flight); fail fast.
    Rejected,
}

/// Read-only view of one breaker, for the diagnostics surface.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub service: String,
    pub status: &'static str,
    pub consecutive_failures: u32,
    /// Seconds since the circuit last opened, when open or half-open.
    pub open_for_secs: Option<u64>,
    /// Seconds since the last probe was admitted, if any.
    pub last_probe_secs: Option<u64>,
}

/// All per-service breakers, keyed by service name.
///
/// Cells are created lazily on first call and live for the process lifetime.
pub struct CircuitBreakers {
    cells: DashMap<String, Arc<Mutex<CircuitState>>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakers {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            cells: DashMap::new(),
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        }
    }

    fn cell(&self, service: &str) -> Arc<Mutex<CircuitState>> {
        // Clone the Arc out so the map shard is released before locking.
        self.cells
            .entry(service.to_string())
            .or_default()
            .clone()
    }

    /// Decide whether a call to `service` may proceed.
    ///
    /// The Open → Half-Open transition happens here, under the cell lock,
    /// and admits only the transitioning caller as the probe; concurrent
    /// callers observe Half-Open and are rejected until the probe resolves.
    pub fn admit(&self, service: &str) -> Admission {
        let cell = self.cell(service);
        let mut state = cell.lock().expect("breaker state poisoned");

        match state.status {
            CircuitStatus::Closed => Admission::Allowed,
            CircuitStatus::HalfOpen => Admission::Rejected,
            CircuitStatus::Open => {
                let elapsed = state
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.reset_timeout {
                    state.status = CircuitStatus::HalfOpen;
                    state.last_probe_at = Some(Instant::now());
                    tracing::info!(service = %service, "Circuit half-open, admitting probe");
                    metrics::record_circuit_transition(service, "half_open");
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Record an answered (non-5xx) upstream response.
    pub fn record_success(&self, service: &str) {
        let cell = self.cell(service);
        let mut state = cell.lock().expect("breaker state poisoned");

        match state.status {
            CircuitStatus::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitStatus::HalfOpen => {
                state.status = CircuitStatus::Closed;
                state.consecutive_failures = 0;
                state.opened_at = None;
                tracing::info!(service = %service, "Circuit closed after successful probe");
                metrics::record_circuit_transition(service, "closed");
            }
            // A late result from a call admitted before the circuit opened;
            // Open is left only via the reset timeout.
            CircuitStatus::Open => {}
        }
    }

    /// Record a 4xx upstream response.
    ///
    /// The backend answered, so a probe carrying this result closes the
    /// circuit, but in the closed state a client error says nothing about
    /// backend health and leaves the failure streak untouched.
    pub fn record_client_error(&self, service: &str) {
        let cell = self.cell(service);
        let mut state = cell.lock().expect("breaker state poisoned");

        if state.status == CircuitStatus::HalfOpen {
            state.status = CircuitStatus::Closed;
            state.consecutive_failures = 0;
            state.opened_at = None;
            tracing::info!(service = %service, "Circuit closed after answered probe");
            metrics::record_circuit_transition(service, "closed");
        }
    }

    /// Record a failed attempt (transport error, timeout, or 5xx).
    pub fn record_failure(&self, service: &str) {
        let cell = self.cell(service);
        let mut state = cell.lock().expect("breaker state poisoned");

        match state.status {
            CircuitStatus::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.failure_threshold {
                    state.status = CircuitStatus::Open;
                    state.opened_at = Some(Instant::now());
                    tracing::warn!(
                        service = %service,
                        consecutive_failures = state.consecutive_failures,
                        "Circuit opened"
                    );
                    metrics::record_circuit_transition(service, "open");
                }
            }
            CircuitStatus::HalfOpen => {
                state.status = CircuitStatus::Open;
                state.opened_at = Some(Instant::now());
                tracing::warn!(service = %service, "Probe failed, circuit reopened");
                metrics::record_circuit_transition(service, "open");
            }
            CircuitStatus::Open => {}
        }
    }

    /// Snapshot every breaker the gateway has touched so far.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut out: Vec<CircuitSnapshot> = self
            .cells
            .iter()
            .map(|entry| {
                let state = entry.value().lock().expect("breaker state poisoned");
                CircuitSnapshot {
                    service: entry.key().clone(),
                    status: state.status.as_str(),
                    consecutive_failures: state.consecutive_failures,
                    open_for_secs: state.opened_at.map(|at| at.elapsed().as_secs()),
                    last_probe_secs: state.last_probe_at.map(|at| at.elapsed().as_secs()),
                }
            })
            .collect();
        out.sort_by(|a, b| a.service.cmp(&b.service));
        out
    }
}
