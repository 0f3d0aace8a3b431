//! Authentication API endpoints.
//!
//! - POST `/register` - Create a user from a `Basic` header
//! - POST `/login` - Exchange a `Basic` header for an access and a refresh token
//! - POST `/login/direct` - Same as `/login` with a JSON body
//! - POST `/token/access` - Exchange a `Bearer` refresh token for a new access token
//! - POST `/token/block` - Block a token until it expires
//! - GET `/private` - Claims of the current access token

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{Auth, AuthError, AuthService, TokenPair};
use crate::db::UserStore;
use crate::impl_has_auth_backend;
use crate::jwt::{Claims, JwtConfig};
use crate::revocation::RevocationStore;

#[derive(Clone)]
pub struct AuthRoutesState {
    pub service: Arc<AuthService<UserStore>>,
    pub jwt: Arc<JwtConfig>,
    pub revocations: Arc<RevocationStore>,
}

impl_has_auth_backend!(AuthRoutesState);

pub fn router(state: AuthRoutesState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login/direct", post(login_direct))
        .route("/token/access", post(rotate_access_token))
        .route("/token/block", post(block_token))
        .route("/private", get(private))
        .with_state(state)
}

/// Raw `Authorization` header; absent or non-UTF-8 counts as malformed.
fn authorization(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MalformedCredential)
}

async fn register(
    State(state): State<AuthRoutesState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.register(authorization(&headers)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AuthRoutesState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state.service.login(authorization(&headers)?).await?;
    Ok(Json(tokens))
}

#[derive(Deserialize)]
struct DirectLoginRequest {
    email: String,
    password: String,
}

async fn login_direct(
    State(state): State<AuthRoutesState>,
    Json(payload): Json<DirectLoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let user = state
        .service
        .authenticate_direct(&payload.email, &payload.password)
        .await?;
    Ok(Json(state.service.issue_pair(&user)?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
}

async fn rotate_access_token(
    State(state): State<AuthRoutesState>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let access_token = state.service.rotate_access(authorization(&headers)?)?;
    Ok(Json(AccessTokenResponse { access_token }))
}

#[derive(Deserialize)]
struct BlockTokenRequest {
    token: String,
}

async fn block_token(
    State(state): State<AuthRoutesState>,
    Auth(claims): Auth,
    Json(payload): Json<BlockTokenRequest>,
) -> Result<Json<bool>, ApiError> {
    let blocked = state.service.block(&payload.token)?;
    tracing::info!(by = claims.sub, sub = blocked.sub, "Token block requested");
    Ok(Json(true))
}

async fn private(Auth(claims): Auth) -> Json<Claims> {
    Json(claims)
}
