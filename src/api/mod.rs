mod auth;
mod error;
mod movies;

use axum::Router;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::UserLimiter;
use crate::revocation::RevocationStore;

pub use auth::AuthRoutesState;
pub use error::{ApiError, ResultExt};
pub use movies::{MoviesState, RECENT_CACHE_TTL, RecentCache};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    revocations: Arc<RevocationStore>,
    hash_rounds: u32,
    reaction_limiter: Arc<UserLimiter>,
    recent: Arc<RecentCache>,
) -> Router {
    let auth_state = AuthRoutesState {
        service: Arc::new(AuthService::new(
            db.users(),
            jwt.clone(),
            revocations.clone(),
            hash_rounds,
        )),
        jwt: jwt.clone(),
        revocations: revocations.clone(),
    };

    let movies_state = MoviesState {
        db,
        jwt,
        revocations,
        reaction_limiter,
        recent,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/movies", movies::router(movies_state))
}
