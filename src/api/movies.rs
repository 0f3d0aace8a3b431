//! Movie catalog endpoints.
//!
//! - GET `/` - Cursor-paginated listing, optionally filtered by title
//! - GET `/recent` - Ten newest movies
//! - POST `/` - Create a movie (admin only)
//! - POST `/{id}/like`, `/{id}/dislike` - Toggle a reaction (throttled per user and movie)

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, OptionalAuth};
use crate::cache::TtlCache;
use crate::db::{Database, Movie};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::pagination::CursorParams;
use crate::rate_limit::{UserLimiter, check_quota};
use crate::revocation::RevocationStore;

const RECENT_LIMIT: i64 = 10;
const DEFAULT_ORDER: &str = "id_DESC";

/// How long a recent-movies result is served from memory.
pub const RECENT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Recent-movies results keyed by limit.
pub type RecentCache = TtlCache<i64, Vec<Movie>>;

#[derive(Clone)]
pub struct MoviesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub revocations: Arc<RevocationStore>,
    pub reaction_limiter: Arc<UserLimiter>,
    pub recent: Arc<RecentCache>,
}

impl_has_auth_backend!(MoviesState);

pub fn router(state: MoviesState) -> Router {
    Router::new()
        .route("/", get(list_movies).post(create_movie))
        .route("/recent", get(recent_movies))
        .route("/{id}/like", post(like_movie))
        .route("/{id}/dislike", post(dislike_movie))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListQuery {
    title: Option<String>,
    cursor: Option<String>,
    /// Comma-separated `column_ASC` / `column_DESC` keys
    order: Option<String>,
    take: Option<u32>,
}

impl ListQuery {
    fn cursor_params(&self) -> CursorParams {
        let mut order: Vec<String> = self
            .order
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from)
            .collect();
        if order.is_empty() {
            order.push(DEFAULT_ORDER.to_string());
        }

        CursorParams {
            cursor: self.cursor.clone(),
            order,
            take: self.take,
        }
    }
}

/// A movie as seen by the caller. `like_status` is the caller's own
/// reaction, `null` when anonymous or not reacted.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MovieView {
    #[serde(flatten)]
    movie: Movie,
    like_status: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListMoviesResponse {
    data: Vec<MovieView>,
    count: i64,
    next_cursor: Option<String>,
}

async fn list_movies(
    State(state): State<MoviesState>,
    OptionalAuth(claims): OptionalAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListMoviesResponse>, ApiError> {
    let page = state
        .db
        .movies()
        .list(query.title.as_deref(), &query.cursor_params())
        .await?;

    let reactions = match &claims {
        Some(claims) => {
            let ids: Vec<i64> = page.movies.iter().map(|m| m.id).collect();
            state
                .db
                .movies()
                .reactions_for_user(claims.sub, &ids)
                .await
                .db_err("Failed to load reactions")?
        }
        None => Default::default(),
    };

    let data = page
        .movies
        .into_iter()
        .map(|movie| MovieView {
            like_status: reactions.get(&movie.id).copied(),
            movie,
        })
        .collect();

    Ok(Json(ListMoviesResponse {
        data,
        count: page.count,
        next_cursor: page.next_cursor,
    }))
}

async fn recent_movies(State(state): State<MoviesState>) -> Result<Json<Vec<Movie>>, ApiError> {
    if let Some(movies) = state.recent.get(&RECENT_LIMIT) {
        return Ok(Json(movies));
    }

    let movies = state
        .db
        .movies()
        .recent(RECENT_LIMIT)
        .await
        .db_err("Failed to load recent movies")?;
    state.recent.insert(RECENT_LIMIT, movies.clone());
    Ok(Json(movies))
}

#[derive(Deserialize)]
struct CreateMovieRequest {
    title: String,
}

async fn create_movie(
    State(state): State<MoviesState>,
    AdminOnly(claims): AdminOnly,
    Json(payload): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }

    let id = match state.db.movies().create(title, Some(claims.sub)).await {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::conflict("A movie with this title already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create movie", e)),
    };

    let movie = state
        .db
        .movies()
        .get(id)
        .await
        .db_err("Failed to load new movie")?
        .ok_or_else(|| ApiError::db_error("Failed to load new movie", id))?;

    state.recent.clear();
    tracing::info!(movie_id = id, by = claims.sub, "Movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactionResponse {
    /// Reaction now in place, `null` when it was just removed
    is_like: Option<bool>,
}

async fn like_movie(
    state: State<MoviesState>,
    auth: Auth,
    id: Path<i64>,
) -> Result<Json<ReactionResponse>, ApiError> {
    toggle_reaction(state, auth, id, "like", true).await
}

async fn dislike_movie(
    state: State<MoviesState>,
    auth: Auth,
    id: Path<i64>,
) -> Result<Json<ReactionResponse>, ApiError> {
    toggle_reaction(state, auth, id, "dislike", false).await
}

async fn toggle_reaction(
    State(state): State<MoviesState>,
    Auth(claims): Auth,
    Path(id): Path<i64>,
    route: &'static str,
    is_like: bool,
) -> Result<Json<ReactionResponse>, ApiError> {
    let exists = state
        .db
        .movies()
        .get(id)
        .await
        .db_err("Failed to load movie")?
        .is_some();
    if !exists {
        return Err(ApiError::not_found("Movie not found"));
    }
    check_quota(&state.reaction_limiter, (route, id, claims.sub))?;

    let is_like = state
        .db
        .movies()
        .toggle_reaction(id, claims.sub, is_like)
        .await
        .db_err("Failed to update reaction")?;

    Ok(Json(ReactionResponse { is_like }))
}
