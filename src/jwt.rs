//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with distinct secrets so a leaked
//! access secret cannot forge refresh tokens. The `type` claim tells the
//! verifier which secret to check against.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, dangerous};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::db::UserRole;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived access token (5 minutes)
    Access,
    /// Long-lived refresh token (24 hours)
    Refresh,
}

impl TokenType {
    pub fn from_refresh_flag(is_refresh: bool) -> Self {
        if is_refresh {
            TokenType::Refresh
        } else {
            TokenType::Access
        }
    }

    /// Lifetime in seconds for tokens of this type.
    pub fn duration_secs(self) -> u64 {
        match self {
            TokenType::Access => ACCESS_TOKEN_DURATION_SECS,
            TokenType::Refresh => REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// Claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    /// User role
    pub role: UserRole,
    /// Token type
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 300;

/// Refresh token duration: 24 hours
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Issuer and verifier for access and refresh tokens.
#[derive(Clone)]
pub struct JwtConfig {
    access: Arc<KeyPair>,
    refresh: Arc<KeyPair>,
    clock: Arc<dyn Clock>,
}

impl JwtConfig {
    /// Create a configuration with separate access and refresh secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_clock(access_secret, refresh_secret, Arc::new(SystemClock))
    }

    pub fn with_clock(access_secret: &[u8], refresh_secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            access: Arc::new(KeyPair::new(access_secret)),
            refresh: Arc::new(KeyPair::new(refresh_secret)),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn keys(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Sign a new token for `subject`. Only the subject and role are taken from the caller.
    pub fn issue(&self, subject: i64, role: UserRole, is_refresh: bool) -> Result<String, JwtError> {
        let token_type = TokenType::from_refresh_flag(is_refresh);
        let now = self.clock.now_secs();

        let claims = Claims {
            sub: subject,
            role,
            token_type,
            iat: now,
            exp: now + token_type.duration_secs(),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &self.keys(token_type).encoding,
        )
        .map_err(JwtError::Encoding)
    }

    /// Verify a token and require it to be of the expected type.
    pub fn verify(&self, token: &str, expect_refresh: bool) -> Result<Claims, JwtError> {
        let claims = self.verify_any(token)?;

        if claims.token_type != TokenType::from_refresh_flag(expect_refresh) {
            return Err(JwtError::TypeMismatch);
        }

        Ok(claims)
    }

    /// Verify a token of either type, using the secret selected by its declared type.
    pub fn verify_any(&self, token: &str) -> Result<Claims, JwtError> {
        // The peeked type only picks the key. Nothing else from it is trusted.
        let declared = decode_unchecked(token)?.token_type;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked against our own clock below.
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, &self.keys(declared).decoding, &validation)
                .map_err(JwtError::InvalidToken)?;
        let claims = token_data.claims;

        if self.clock.now_secs() >= claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

/// Read the claims of a token without checking its signature or expiry.
///
/// Only for choosing a verification key or reading `exp` before blocking.
/// Never use the result to authorize anything.
pub fn decode_unchecked(token: &str) -> Result<Claims, JwtError> {
    dangerous::insecure_decode::<Claims>(token)
        .map(|data| data.claims)
        .map_err(|_| JwtError::Malformed)
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Token is not a well-formed JWT")]
    Malformed,
    #[error("Invalid token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    Expired,
    /// Access token presented where a refresh token is required, or vice versa
    #[error("Wrong token type")]
    TypeMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    const ACCESS: &[u8] = b"access-secret-for-testing-0123456789";
    const REFRESH: &[u8] = b"refresh-secret-for-testing-0123456789";

    #[test]
    fn test_issue_and_verify_access_token() {
        let config = JwtConfig::new(ACCESS, REFRESH);

        let token = config.issue(1, UserRole::Admin, false).unwrap();
        let claims = config.verify(&token, false).unwrap();

        assert_eq!(claims.sub, 1);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let config = JwtConfig::new(ACCESS, REFRESH);

        let token = config.issue(7, UserRole::User, true).unwrap();
        let claims = config.verify(&token, true).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, REFRESH_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(ACCESS, REFRESH);

        let access = config.issue(1, UserRole::Admin, false).unwrap();
        let refresh = config.issue(1, UserRole::Admin, true).unwrap();

        assert!(matches!(
            config.verify(&access, true),
            Err(JwtError::TypeMismatch)
        ));
        assert!(matches!(
            config.verify(&refresh, false),
            Err(JwtError::TypeMismatch)
        ));
    }

    #[test]
    fn test_secrets_are_type_specific() {
        let config = JwtConfig::new(ACCESS, REFRESH);

        // A "refresh" token forged with the access secret must not verify.
        let now = config.clock().now_secs();
        let forged = Claims {
            sub: 1,
            role: UserRole::Admin,
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &forged,
            &EncodingKey::from_secret(ACCESS),
        )
        .unwrap();

        assert!(matches!(
            config.verify(&token, true),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1", b"secret-r1");
        let config2 = JwtConfig::new(b"secret-2", b"secret-r2");

        let token = config1.issue(1, UserRole::User, false).unwrap();
        assert!(matches!(
            config2.verify(&token, false),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(ACCESS, REFRESH);
        assert!(matches!(
            config.verify("invalid-token", false),
            Err(JwtError::Malformed)
        ));
        assert!(config.verify("a.b.c", false).is_err());
    }

    #[test]
    fn test_expired_token() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = JwtConfig::with_clock(ACCESS, REFRESH, clock.clone());

        let token = config.issue(1, UserRole::User, false).unwrap();
        assert!(config.verify(&token, false).is_ok());

        clock.advance(Duration::from_secs(ACCESS_TOKEN_DURATION_SECS));
        assert!(matches!(
            config.verify(&token, false),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_decode_unchecked_reads_claims() {
        let config = JwtConfig::new(ACCESS, REFRESH);
        let token = config.issue(42, UserRole::PaidUser, true).unwrap();

        let claims = decode_unchecked(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, UserRole::PaidUser);
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_decode_unchecked_rejects_non_jwt() {
        for token in ["", "nope", "a.b", "a.b.c", "x.eyJzdWIiOjF9.sig"] {
            assert!(
                matches!(decode_unchecked(token), Err(JwtError::Malformed)),
                "{token}"
            );
        }
    }

    #[test]
    fn test_wire_format_claim_names() {
        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

        let config = JwtConfig::new(ACCESS, REFRESH);
        let token = config.issue(3, UserRole::User, false).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

        assert_eq!(json["sub"], 3);
        assert_eq!(json["role"], "user");
        assert_eq!(json["type"], "access");
        assert!(json["iat"].is_u64());
        assert!(json["exp"].is_u64());
    }
}
