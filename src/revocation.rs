//! In-memory token blocklist and verified-claims cache.
//!
//! Both maps are keyed by the exact token string and every entry carries
//! its own expiry. Expired entries are treated as absent on read and
//! dropped by [`RevocationStore::purge_expired`], which the periodic task
//! scheduler calls. There is no explicit delete.

use dashmap::DashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::jwt::{Claims, JwtError, decode_unchecked};

/// Verified claims are cached until this long before the token's real expiry.
pub const VERIFIED_CACHE_MARGIN_MS: u64 = 30_000;

/// Smallest TTL ever stored, so a nearly expired token never gets a zero or negative TTL.
pub const MIN_TTL_MS: u64 = 1;

#[derive(Debug, Clone)]
struct Entry {
    claims: Claims,
    expires_at_ms: u64,
}

/// Shared blocklist and verification cache. Safe for concurrent use.
pub struct RevocationStore {
    blocked: DashMap<String, Entry>,
    verified: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl RevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            blocked: DashMap::new(),
            verified: DashMap::new(),
            clock,
        }
    }

    /// Milliseconds left until `exp` minus `margin_ms`, floored at [`MIN_TTL_MS`].
    fn ttl_ms(&self, exp_secs: u64, margin_ms: u64) -> u64 {
        let expiry_ms = exp_secs.saturating_mul(1_000);
        expiry_ms
            .saturating_sub(self.clock.now_millis())
            .saturating_sub(margin_ms)
            .max(MIN_TTL_MS)
    }

    /// Block a token until it would have expired anyway.
    ///
    /// The token is only decoded, not verified: validity does not matter for blocking.
    pub fn block(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode_unchecked(token)?;
        let ttl = self.ttl_ms(claims.exp, 0);

        self.blocked.insert(
            token.to_string(),
            Entry {
                claims: claims.clone(),
                expires_at_ms: self.clock.now_millis() + ttl,
            },
        );
        // A blocked token must not keep being served from the cache.
        self.verified.remove(token);

        tracing::info!(sub = claims.sub, ttl_ms = ttl, "Token blocked");
        Ok(claims)
    }

    pub fn is_blocked(&self, token: &str) -> bool {
        self.live(&self.blocked, token).is_some()
    }

    /// Remember claims of a token that just passed verification.
    pub fn cache_verified(&self, token: &str, claims: &Claims) {
        let ttl = self.ttl_ms(claims.exp, VERIFIED_CACHE_MARGIN_MS);

        self.verified.insert(
            token.to_string(),
            Entry {
                claims: claims.clone(),
                expires_at_ms: self.clock.now_millis() + ttl,
            },
        );
    }

    /// Claims cached by [`Self::cache_verified`], if still live.
    pub fn cached_claims(&self, token: &str) -> Option<Claims> {
        self.live(&self.verified, token)
    }

    fn live(&self, map: &DashMap<String, Entry>, token: &str) -> Option<Claims> {
        let now = self.clock.now_millis();
        let claims = {
            let entry = map.get(token)?;
            (entry.expires_at_ms > now).then(|| entry.claims.clone())
        };
        if claims.is_none() {
            map.remove_if(token, |_, entry| entry.expires_at_ms <= now);
        }
        claims
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.blocked.len() + self.verified.len();
        self.blocked.retain(|_, entry| entry.expires_at_ms > now);
        self.verified.retain(|_, entry| entry.expires_at_ms > now);
        before.saturating_sub(self.blocked.len() + self.verified.len())
    }
}
