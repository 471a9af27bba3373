//! JWT verification and the authentication filter.
//!
//! Tokens are HS256, shared-secret signed. The filter accepts a bearer
//! token from the `Authorization` header or, failing that, an
//! `access_token` cookie. On success the verified claims are copied into
//! the request's [`RequestContext`] and identity headers are set for the
//! backend; the token itself is not forwarded further than it arrived.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::http::error::GatewayError;
use crate::http::request::{RequestContext, X_USER_ID, X_USER_ROLE};
use crate::http::server::AppState;

/// Claims the gateway understands. Unknown claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub pro: bool,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid authentication token")]
    InvalidToken,
    #[error("authentication token expired")]
    ExpiredToken,
}

/// Stateless HS256 verifier shared across requests.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; a token is dead the second it expires.
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Pull a bearer token from the request, header first, cookie second.
fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(text) = value.to_str() {
            if let Some(token) = text.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let cookies = request.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == "access_token" && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Route-level filter for services that require a caller identity.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::new(String::new()));
    let path = request.uri().path().to_string();

    let token = match extract_token(&request) {
        Some(token) => token,
        None => {
            return GatewayError::Unauthorized(AuthError::MissingToken)
                .into_response_for(&ctx, &path);
        }
    };

    let claims = match state.verifier.verify(&token) {
        Ok(claims) => claims,
        Err(err) => return GatewayError::Unauthorized(err).into_response_for(&ctx, &path),
    };

    if let Ok(value) = HeaderValue::from_str(&claims.sub) {
        request.headers_mut().insert(X_USER_ID, value);
    }
    if let Some(role) = &claims.role {
        if let Ok(value) = HeaderValue::from_str(role) {
            request.headers_mut().insert(X_USER_ROLE, value);
        }
    }

    if let Some(ctx) = request.extensions_mut().get_mut::<RequestContext>() {
        ctx.user_id = Some(claims.sub);
        ctx.role = claims.role;
        ctx.pro_subscriber = claims.pro;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn mint(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_expiring_at(exp: i64) -> Claims {
        Claims {
            sub: "user-1".into(),
            role: Some("buyer".into()),
            pro: true,
            exp,
            iat: None,
        }
    }

    #[test]
    fn valid_token_yields_claims() {
        let verifier = TokenVerifier::new(SECRET);
        let token = mint(&claims_expiring_at(chrono::Utc::now().timestamp() + 600), SECRET);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role.as_deref(), Some("buyer"));
        assert!(claims.pro);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let verifier = TokenVerifier::new(SECRET);
        let token = mint(&claims_expiring_at(chrono::Utc::now().timestamp() - 30), SECRET);

        assert!(matches!(verifier.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn wrong_secret_is_rejected_as_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        let token = mint(
            &claims_expiring_at(chrono::Utc::now().timestamp() + 600),
            "other-secret",
        );

        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_token_is_rejected_as_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_from_cookie_is_found() {
        let request = Request::builder()
            .uri("/api/v1/listing/x")
            .header(header::COOKIE, "theme=dark; access_token=abc123; lang=en")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_token(&request).as_deref(), Some("abc123"));
    }

    #[test]
    fn header_wins_over_cookie() {
        let request = Request::builder()
            .uri("/api/v1/listing/x")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .header(header::COOKIE, "access_token=from-cookie")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_token(&request).as_deref(), Some("from-header"));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let request = Request::builder()
            .uri("/api/v1/listing/x")
            .body(Body::empty())
            .unwrap();

        assert!(extract_token(&request).is_none());
    }
}
