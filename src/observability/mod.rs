//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured log events (tracing, correlation id on every
//!       request-scoped event)
//!     → counters and histograms (metrics.rs)
//!
//! Consumers:
//!     → log aggregation (stdout)
//!     → Prometheus scrape of the metrics listener
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap atomic operations; safe on the hot path
//! - The request id flows from ingress through upstream calls and errors
//! - A missing metrics exporter degrades to logs only, never downtime

pub mod metrics;
