//! Authentication gate and request extractors.
//!
//! Clients get a short-lived access token (5 min) and a long-lived refresh
//! token (24 h) from a Basic login. Access tokens authenticate requests;
//! refresh tokens only mint new access tokens. Any token can be blocked
//! until it expires.

mod errors;
mod extractors;
mod gate;
mod password;
mod state;

pub use errors::AuthError;
pub use extractors::{AdminOnly, Auth, OptionalAuth, authenticate_bearer};
pub use gate::{AuthService, TokenPair};
pub use password::{hash_password, verify_password};
pub use state::HasAuthBackend;
