//! Request admission: rate limiting and caller authentication.
//!
//! # Data Flow
//!
//! ```text
//! request ──> rate_limit (per source IP, fixed window) ──> 429 when spent
//!                │
//!                └──> require_auth (protected services only)
//!                         │  bearer header / access_token cookie
//!                         ├──> 401 missing / invalid / expired
//!                         └──> claims copied into RequestContext,
//!                              x-user-id / x-user-role set for the backend
//! ```
//!
//! # Design Decisions
//!
//! - Rate limiting keys on source IP and runs before authentication, so
//!   unauthenticated floods are cut off without paying signature checks.
//! - Fixed windows over sliding: coarser at the boundary but one counter
//!   per client, no timestamp queues.
//! - Authentication is a route layer, not a global one. Which services
//!   require it is decided by the registry at router build time.
//! - Verification is stateless HS256 with zero leeway. No token cache, a
//!   decode per request is cheaper than invalidation bugs.

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthError, Claims, TokenVerifier};
pub use rate_limit::{RateDecision, RateLimiter};
