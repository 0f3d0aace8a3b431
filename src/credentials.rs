//! Parsing of `Authorization` header envelopes.
//!
//! Two schemes are accepted:
//! - `Basic <base64(email:password)>` for registration and login
//! - `Bearer <token>` for authenticated calls and access-token rotation
//!
//! Any deviation from the exact shape is rejected before any cryptographic
//! work happens. Nothing is coerced.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Email and password carried by a Basic envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Malformed credential")]
    Malformed,
}

/// Split `<scheme> <payload>` and check the scheme case-insensitively.
fn split_envelope<'a>(raw: &'a str, scheme: &str) -> Result<&'a str, CredentialError> {
    let mut segments = raw.split(' ');
    let (Some(found), Some(payload), None) = (segments.next(), segments.next(), segments.next())
    else {
        return Err(CredentialError::Malformed);
    };

    if !found.eq_ignore_ascii_case(scheme) || payload.is_empty() {
        return Err(CredentialError::Malformed);
    }

    Ok(payload)
}

/// Parse a `Basic` envelope into email and password.
pub fn parse_basic(raw: &str) -> Result<BasicCredentials, CredentialError> {
    let payload = split_envelope(raw, "basic")?;

    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| CredentialError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::Malformed)?;

    let mut parts = decoded.split(':');
    let (Some(email), Some(password), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CredentialError::Malformed);
    };

    Ok(BasicCredentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}

/// Parse a `Bearer` envelope and return the token unparsed.
pub fn parse_bearer(raw: &str) -> Result<&str, CredentialError> {
    split_envelope(raw, "bearer")
}
