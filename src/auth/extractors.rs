use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
};
use tracing::warn;

use super::jwt::{JwtKeys, SessionUser};

/// Name of the HTTP-only cookie carrying the session token.
pub(crate) const SESSION_COOKIE: &str = "token";

/// Extracts and validates the session token, attaching the caller identity.
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = extract_token(parts).ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing session token".to_string(),
        ))?;

        match keys.verify_session(&token) {
            Ok(session) => Ok(AuthUser(session)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ))
            }
        }
    }
}

/// Session token from the `token` cookie, with a bearer-header fallback.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for pair in value.split(';') {
            let mut kv = pair.trim().splitn(2, '=');
            if kv.next() == Some(SESSION_COOKIE) {
                return kv.next().map(|v| v.trim().to_string());
            }
        }
    }

    let auth = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}
