//! Movie catalog storage: listing with cursor pagination, reactions and
//! the like/dislike aggregates.

use serde::Serialize;
use sqlx::QueryBuilder;
use sqlx::sqlite::{Sqlite, SqlitePool};
use std::collections::HashMap;

use crate::pagination::{
    CursorParams, PaginationError, SortColumns, apply_cursor, generate_next_cursor,
};

/// Columns clients may order movie listings by.
pub const MOVIE_SORT_COLUMNS: SortColumns = SortColumns::new(&[
    ("id", "m.id"),
    ("title", "m.title"),
    ("likeCount", "m.like_count"),
    ("dislikeCount", "m.dislike_count"),
    ("createdAt", "m.created_at"),
]);

const MOVIE_COLUMNS: &str = "m.id, m.title, m.like_count, m.dislike_count, m.creator_id, m.created_at";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub like_count: i64,
    pub dislike_count: i64,
    pub creator_id: Option<i64>,
    pub created_at: String,
}

/// One page of a movie listing.
#[derive(Debug, Clone)]
pub struct MoviePage {
    pub movies: Vec<Movie>,
    /// Total number of movies matching the filter, ignoring pagination
    pub count: i64,
    pub next_cursor: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct MovieStore {
    pool: SqlitePool,
}

impl MovieStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a movie. Returns the movie ID.
    pub async fn create(&self, title: &str, creator_id: Option<i64>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO movies (title, creator_id) VALUES (?, ?)")
            .bind(title)
            .bind(creator_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Movie>, sqlx::Error> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies m WHERE m.id = ?");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Most recently created movies, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error> {
        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m ORDER BY m.created_at DESC, m.id DESC LIMIT ?"
        );
        sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    /// List movies, optionally filtered by a title substring, one cursor page at a time.
    pub async fn list(
        &self,
        title: Option<&str>,
        params: &CursorParams,
    ) -> Result<MoviePage, ListError> {
        let pattern = title.filter(|t| !t.is_empty()).map(|t| format!("%{t}%"));

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MOVIE_COLUMNS} FROM movies m"));
        if let Some(pattern) = &pattern {
            qb.push(" WHERE m.title LIKE ");
            qb.push_bind(pattern.clone());
        }
        let order = apply_cursor(&mut qb, params, &MOVIE_SORT_COLUMNS, pattern.is_some())?;

        let movies: Vec<Movie> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM movies m");
        if let Some(pattern) = pattern {
            count_qb.push(" WHERE m.title LIKE ");
            count_qb.push_bind(pattern);
        }
        let (count,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let next_cursor = generate_next_cursor(&movies, &order)?;

        Ok(MoviePage {
            movies,
            count,
            next_cursor,
        })
    }

    /// The user's reaction (true = like, false = dislike) for each of `movie_ids` they reacted to.
    pub async fn reactions_for_user(
        &self,
        user_id: i64,
        movie_ids: &[i64],
    ) -> Result<HashMap<i64, bool>, sqlx::Error> {
        if movie_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT movie_id, is_like FROM movie_user_likes WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND movie_id IN (");
        let mut separated = qb.separated(", ");
        for id in movie_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, bool)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    /// Toggle a like or dislike.
    ///
    /// Repeating the current reaction removes it; the opposite reaction replaces it.
    /// Returns the reaction now in place, if any.
    pub async fn toggle_reaction(
        &self,
        movie_id: i64,
        user_id: i64,
        is_like: bool,
    ) -> Result<Option<bool>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(bool,)> = sqlx::query_as(
            "SELECT is_like FROM movie_user_likes WHERE movie_id = ? AND user_id = ?",
        )
        .bind(movie_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let status = match existing {
            Some((current,)) if current == is_like => {
                sqlx::query("DELETE FROM movie_user_likes WHERE movie_id = ? AND user_id = ?")
                    .bind(movie_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                None
            }
            Some(_) => {
                sqlx::query(
                    "UPDATE movie_user_likes SET is_like = ? WHERE movie_id = ? AND user_id = ?",
                )
                .bind(is_like)
                .bind(movie_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
                Some(is_like)
            }
            None => {
                sqlx::query(
                    "INSERT INTO movie_user_likes (movie_id, user_id, is_like) VALUES (?, ?, ?)",
                )
                .bind(movie_id)
                .bind(user_id)
                .bind(is_like)
                .execute(&mut *tx)
                .await?;
                Some(is_like)
            }
        };

        let before = existing.map(|(current,)| current);
        let count = |reaction: Option<bool>, like: bool| i64::from(reaction == Some(like));
        sqlx::query(
            "UPDATE movies SET like_count = like_count + ?, dislike_count = dislike_count + ?
             WHERE id = ?",
        )
        .bind(count(status, true) - count(before, true))
        .bind(count(status, false) - count(before, false))
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(status)
    }

    /// Recompute `like_count` and `dislike_count` from the reaction table.
    ///
    /// [`Self::toggle_reaction`] keeps the counts current; this repairs drift
    /// from reactions removed by cascading deletes.
    pub async fn recompute_reaction_counts(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE movies SET
                like_count = (SELECT COUNT(*) FROM movie_user_likes l
                              WHERE l.movie_id = movies.id AND l.is_like = 1),
                dislike_count = (SELECT COUNT(*) FROM movie_user_likes l
                                 WHERE l.movie_id = movies.id AND l.is_like = 0)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
