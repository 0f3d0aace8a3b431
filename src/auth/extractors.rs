//! Axum extractors for Bearer authentication.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};

use super::errors::AuthError;
use super::state::HasAuthBackend;
use crate::credentials::parse_bearer;
use crate::db::UserRole;
use crate::jwt::{Claims, JwtError, TokenType};

/// Resolve the caller behind the `Authorization` header.
///
/// A missing or malformed header, or a token that fails verification for any
/// reason other than expiry, yields an anonymous caller. Blocked and expired
/// tokens are rejected outright.
pub fn authenticate_bearer<S>(headers: &HeaderMap, state: &S) -> Result<Option<Claims>, AuthError>
where
    S: HasAuthBackend,
{
    let Some(raw) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let Ok(raw) = raw.to_str() else {
        debug!("Authorization header is not valid UTF-8");
        return Ok(None);
    };
    let token = match parse_bearer(raw) {
        Ok(token) => token,
        Err(_) => {
            debug!("Ignoring non-Bearer authorization header");
            return Ok(None);
        }
    };

    let revocations = state.revocations();
    if revocations.is_blocked(token) {
        return Err(AuthError::Unauthorized);
    }

    if let Some(claims) = revocations.cached_claims(token) {
        return Ok(Some(claims));
    }

    match state.jwt().verify_any(token) {
        Ok(claims) => {
            revocations.cache_verified(token, &claims);
            Ok(Some(claims))
        }
        Err(JwtError::Expired) => Err(AuthError::Unauthorized),
        Err(e) => {
            warn!("Ignoring unverifiable bearer token: {}", e);
            Ok(None)
        }
    }
}

/// Extractor for endpoints that require an access token.
pub struct Auth(pub Claims);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authenticate_bearer(&parts.headers, state)?.ok_or(AuthError::NotAuthenticated)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::TypeMismatch);
        }
        Ok(Auth(claims))
    }
}

/// Optional authentication. Anonymous callers get `None`.
///
/// Only access tokens identify a caller here; a refresh token is treated as
/// anonymous. Blocked and expired tokens are still rejected.
pub struct OptionalAuth(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = authenticate_bearer(&parts.headers, state)?
            .filter(|claims| claims.token_type == TokenType::Access);
        Ok(OptionalAuth(claims))
    }
}

/// Extractor that requires an access token with the admin role.
pub struct AdminOnly(pub Claims);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(claims) = Auth::from_request_parts(parts, state).await?;
        if claims.role != UserRole::Admin {
            return Err(AuthError::InsufficientRole);
        }
        Ok(AdminOnly(claims))
    }
}
