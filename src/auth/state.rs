//! Authentication state trait and macro.

use crate::jwt::JwtConfig;
use crate::revocation::RevocationStore;

/// Trait for state types that can authenticate Bearer tokens.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn revocations(&self) -> &RevocationStore;
}

/// Implement `HasAuthBackend` for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `jwt: Arc<JwtConfig>`
/// - `revocations: Arc<RevocationStore>`
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn revocations(&self) -> &$crate::revocation::RevocationStore {
                &self.revocations
            }
        }
    };
}
