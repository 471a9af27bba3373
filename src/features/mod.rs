//! Deterministic feature gating for routed services.
//!
//! # Data Flow
//!
//! ```text
//! request (RequestContext populated by auth)
//!    │
//!    └──> gate.evaluate(feature, ctx)
//!            ├── unknown / disabled ─────────────────> 403
//!            ├── pro_only, caller neither pro nor
//!            │   holding an exempt role ─────────────> 403
//!            ├── rollout bucket >= percentage ───────> 403
//!            └── otherwise ──────────────────────────> continue to proxy
//! ```
//!
//! # Design Decisions
//!
//! - Decisions are pure functions of configuration and caller identity.
//!   The same user asking for the same feature always lands in the same
//!   rollout bucket, across requests and across gateway restarts.
//! - Bucketing is FNV-1a over the user id chained with the feature name,
//!   so a user's bucket for one feature says nothing about another.
//! - A feature name that is not configured denies. Fail closed: a typo in
//!   the gating table must not silently expose a service.
//! - Anonymous callers have no stable identity to bucket, so partial
//!   rollouts exclude them. Only a 100% rollout admits anonymous traffic.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::FeatureConfig;
use crate::http::error::GatewayError;
use crate::http::request::RequestContext;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(seed, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Stable bucket in `0..100` for a user and feature pair.
pub fn rollout_bucket(user_id: &str, feature: &str) -> u8 {
    let hash = fnv1a(fnv1a(FNV_OFFSET, user_id.as_bytes()), feature.as_bytes());
    (hash % 100) as u8
}

/// Why a gate refused a request. Logged, never sent to the caller beyond
/// the generic 403 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    UnknownFeature,
    Disabled,
    ProRequired,
    NotInRollout,
}

impl Denial {
    pub fn as_str(self) -> &'static str {
        match self {
            Denial::UnknownFeature => "unknown_feature",
            Denial::Disabled => "disabled",
            Denial::ProRequired => "pro_required",
            Denial::NotInRollout => "not_in_rollout",
        }
    }
}

/// Evaluates feature rules against the caller attributes on the request.
pub struct FeatureGate {
    features: HashMap<String, FeatureConfig>,
}

impl FeatureGate {
    pub fn from_config(features: HashMap<String, FeatureConfig>) -> Self {
        Self { features }
    }

    pub fn evaluate(&self, feature: &str, ctx: &RequestContext) -> Result<(), Denial> {
        let rules = self.features.get(feature).ok_or(Denial::UnknownFeature)?;

        if !rules.enabled {
            return Err(Denial::Disabled);
        }
        if rules.pro_only {
            let exempt = ctx
                .role
                .as_deref()
                .is_some_and(|role| rules.roles_enabled.iter().any(|r| r == role));
            if !ctx.pro_subscriber && !exempt {
                return Err(Denial::ProRequired);
            }
        }
        if rules.rollout_percentage < 100 {
            let Some(user_id) = ctx.user_id.as_deref() else {
                return Err(Denial::NotInRollout);
            };
            if rollout_bucket(user_id, feature) >= rules.rollout_percentage {
                return Err(Denial::NotInRollout);
            }
        }
        Ok(())
    }
}

/// Route-layer state binding one service's route to its gating feature.
#[derive(Clone)]
pub struct GatedRoute {
    pub gate: Arc<FeatureGate>,
    pub feature: String,
}

pub async fn feature_gate_middleware(
    State(gated): State<GatedRoute>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::new(String::new()));

    match gated.gate.evaluate(&gated.feature, &ctx) {
        Ok(()) => next.run(request).await,
        Err(denial) => {
            tracing::info!(
                feature = %gated.feature,
                reason = denial.as_str(),
                user = ctx.user_id.as_deref().unwrap_or("-"),
                request_id = %ctx.correlation_id,
                "Feature gate denied request"
            );
            GatewayError::FeatureDenied(gated.feature.clone())
                .into_response_for(&ctx, request.uri().path())
        }
    }
}
