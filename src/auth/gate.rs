//! Registration, login and token rotation.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::AuthError;
use super::password::{hash_password, verify_password};
use crate::credentials::{parse_basic, parse_bearer};
use crate::db::{User, UserRepository, UserRole, UserSummary};
use crate::jwt::{Claims, JwtConfig};
use crate::revocation::RevocationStore;

/// Tokens returned by a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Orchestrates credential parsing, user storage, password hashing and
/// token issuance.
pub struct AuthService<R> {
    users: R,
    jwt: Arc<JwtConfig>,
    revocations: Arc<RevocationStore>,
    hash_rounds: u32,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(
        users: R,
        jwt: Arc<JwtConfig>,
        revocations: Arc<RevocationStore>,
        hash_rounds: u32,
    ) -> Self {
        Self {
            users,
            jwt,
            revocations,
            hash_rounds,
        }
    }

    /// Create a user from a `Basic` header. New users always get the `user` role.
    pub async fn register(&self, raw_basic: &str) -> Result<UserSummary, AuthError> {
        let creds = parse_basic(raw_basic)?;

        let existing = self
            .users
            .find_by_email(&creds.email)
            .await
            .map_err(|e| AuthError::internal("Failed to look up user", e))?;
        if existing.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let hash = hash_password(creds.password, self.hash_rounds).await?;

        // A concurrent registration can still win between the lookup and the insert.
        match self.users.create(&creds.email, &hash, UserRole::User).await {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AuthError::DuplicateEmail);
            }
            Err(e) => return Err(AuthError::internal("Failed to create user", e)),
        }

        let user = self
            .users
            .find_by_email(&creds.email)
            .await
            .map_err(|e| AuthError::internal("Failed to load new user", e))?
            .ok_or_else(|| AuthError::internal("New user vanished", &creds.email))?;

        info!(user_id = user.id, "User registered");
        Ok(user.summary())
    }

    /// Authenticate a `Basic` header and issue both tokens.
    pub async fn login(&self, raw_basic: &str) -> Result<TokenPair, AuthError> {
        let creds = parse_basic(raw_basic)?;
        let user = self
            .authenticate_direct(&creds.email, &creds.password)
            .await?;
        self.issue_pair(&user)
    }

    /// Check an email and password against the stored hash.
    pub async fn authenticate_direct(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(|e| AuthError::internal("Failed to look up user", e))?;

        let Some(user) = user else {
            debug!("Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            debug!(user_id = user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue an access token and a refresh token for `user`.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_token(user, false)?,
            refresh_token: self.issue_token(user, true)?,
        })
    }

    pub fn issue_token(&self, user: &User, is_refresh: bool) -> Result<String, AuthError> {
        Ok(self.jwt.issue(user.id, user.role, is_refresh)?)
    }

    /// Exchange a `Bearer` refresh token for a fresh access token.
    ///
    /// The new token carries the subject and role of the refresh token.
    pub fn rotate_access(&self, raw_bearer: &str) -> Result<String, AuthError> {
        let token = parse_bearer(raw_bearer)?;
        if self.revocations.is_blocked(token) {
            return Err(AuthError::Unauthorized);
        }

        let claims = self.jwt.verify(token, true)?;
        Ok(self.jwt.issue(claims.sub, claims.role, false)?)
    }

    /// Block a token until its expiry. The token does not need to be valid.
    pub fn block(&self, token: &str) -> Result<Claims, AuthError> {
        self.revocations
            .block(token)
            .map_err(|_| AuthError::InvalidToken)
    }
}
