mod movies;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use movies::{ListError, MOVIE_SORT_COLUMNS, Movie, MoviePage, MovieStore};
pub use user::{User, UserRepository, UserRole, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let (url, max_connections) = if path == ":memory:" {
            // Every connection to sqlite::memory: is its own database.
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let mut options = SqlitePoolOptions::new().max_connections(max_connections);
        if path == ":memory:" {
            // Dropping the only connection would drop the database with it.
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(&url).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE NOT NULL,
                    password TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE TABLE movies (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT UNIQUE NOT NULL,
                    like_count INTEGER NOT NULL DEFAULT 0,
                    dislike_count INTEGER NOT NULL DEFAULT 0,
                    creator_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_movies_like_count ON movies(like_count)",
                "CREATE INDEX idx_movies_created_at ON movies(created_at)",
                // One reaction per (movie, user); is_like = 0 means dislike
                "CREATE TABLE movie_user_likes (
                    movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    is_like INTEGER NOT NULL,
                    PRIMARY KEY (movie_id, user_id)
                )",
                "CREATE INDEX idx_movie_user_likes_user ON movie_user_likes(user_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the movie store.
    pub fn movies(&self) -> MovieStore {
        MovieStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{CursorParams, PaginationError};

    async fn seed_movies(db: &Database, titles: &[&str]) -> Vec<i64> {
        let mut ids = Vec::new();
        for title in titles {
            ids.push(db.movies().create(title, None).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("a@b.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db.users().find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.password_hash, "hash");
        assert_eq!(user.role, UserRole::User);

        let user = db.users().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("a@b.com", "h1", UserRole::User)
            .await
            .unwrap();
        let result = db.users().create("a@b.com", "h2", UserRole::User).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_role_and_delete_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("a@b.com", "hash", UserRole::User)
            .await
            .unwrap();
        assert!(db.users().set_role(id, UserRole::Admin).await.unwrap());
        assert_eq!(
            db.users().find_by_id(id).await.unwrap().unwrap().role,
            UserRole::Admin
        );

        assert!(db.users().delete(id).await.unwrap());
        assert!(db.users().find_by_id(id).await.unwrap().is_none());
        assert!(!db.users().delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_walks_pages_with_cursor() {
        let db = Database::open(":memory:").await.unwrap();
        seed_movies(&db, &["A", "B", "C", "D", "E", "F", "G"]).await;

        let mut params = CursorParams {
            cursor: None,
            order: vec!["id_DESC".into()],
            take: Some(3),
        };

        let page = db.movies().list(None, &params).await.unwrap();
        assert_eq!(page.count, 7);
        let titles: Vec<_> = page.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["G", "F", "E"]);

        params.cursor = page.next_cursor;
        let page = db.movies().list(None, &params).await.unwrap();
        let titles: Vec<_> = page.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["D", "C", "B"]);

        params.cursor = page.next_cursor;
        let page = db.movies().list(None, &params).await.unwrap();
        let titles: Vec<_> = page.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["A"]);

        params.cursor = page.next_cursor;
        let page = db.movies().list(None, &params).await.unwrap();
        assert!(page.movies.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_list_mixed_direction_keyset() {
        let db = Database::open(":memory:").await.unwrap();
        let ids = seed_movies(&db, &["A", "B", "C", "D"]).await;

        // like counts: A=1, B=2, C=1, D=2
        for (id, likes) in ids.iter().zip([1, 2, 1, 2]) {
            sqlx::query("UPDATE movies SET like_count = ? WHERE id = ?")
                .bind(likes)
                .bind(id)
                .execute(db.pool())
                .await
                .unwrap();
        }

        let mut params = CursorParams {
            cursor: None,
            order: vec!["likeCount_DESC".into(), "id_ASC".into()],
            take: Some(1),
        };

        let mut titles = Vec::new();
        loop {
            let page = db.movies().list(None, &params).await.unwrap();
            titles.extend(page.movies.into_iter().map(|m| m.title));
            match page.next_cursor {
                Some(cursor) => params.cursor = Some(cursor),
                None => break,
            }
        }

        assert_eq!(titles, ["B", "D", "A", "C"]);
    }

    #[tokio::test]
    async fn test_list_title_filter() {
        let db = Database::open(":memory:").await.unwrap();
        seed_movies(&db, &["Heat", "Heathers", "Alien"]).await;

        let params = CursorParams {
            order: vec!["id_ASC".into()],
            ..Default::default()
        };
        let page = db.movies().list(Some("Heat"), &params).await.unwrap();

        assert_eq!(page.count, 2);
        let titles: Vec<_> = page.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Heat", "Heathers"]);
    }

    #[tokio::test]
    async fn test_list_invalid_order() {
        let db = Database::open(":memory:").await.unwrap();

        let params = CursorParams {
            order: vec!["id_XASC".into()],
            ..Default::default()
        };
        let result = db.movies().list(None, &params).await;

        assert!(matches!(
            result,
            Err(ListError::Pagination(PaginationError::InvalidOrder(_)))
        ));
    }

    #[tokio::test]
    async fn test_toggle_reaction_and_recompute() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create("a@b.com", "hash", UserRole::User)
            .await
            .unwrap();
        let other = db
            .users()
            .create("c@d.com", "hash", UserRole::User)
            .await
            .unwrap();
        let ids = seed_movies(&db, &["Heat"]).await;
        let movie = ids[0];

        assert_eq!(
            db.movies().toggle_reaction(movie, user, true).await.unwrap(),
            Some(true)
        );
        assert_eq!(
            db.movies().toggle_reaction(movie, other, false).await.unwrap(),
            Some(false)
        );

        db.movies().recompute_reaction_counts().await.unwrap();
        let m = db.movies().get(movie).await.unwrap().unwrap();
        assert_eq!((m.like_count, m.dislike_count), (1, 1));

        // Same reaction again removes it; opposite replaces it.
        assert_eq!(
            db.movies().toggle_reaction(movie, user, true).await.unwrap(),
            None
        );
        assert_eq!(
            db.movies().toggle_reaction(movie, other, true).await.unwrap(),
            Some(true)
        );

        db.movies().recompute_reaction_counts().await.unwrap();
        let m = db.movies().get(movie).await.unwrap().unwrap();
        assert_eq!((m.like_count, m.dislike_count), (1, 0));

        let reactions = db
            .movies()
            .reactions_for_user(other, &[movie, 999])
            .await
            .unwrap();
        assert_eq!(reactions.get(&movie), Some(&true));
        assert_eq!(reactions.get(&999), None);
        assert!(
            db.movies()
                .reactions_for_user(user, &[movie])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_reaction_counts_follow_toggles_and_deletes() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create("a@b.com", "hash", UserRole::User)
            .await
            .unwrap();
        let movie = seed_movies(&db, &["Heat"]).await[0];

        db.movies().toggle_reaction(movie, user, false).await.unwrap();
        let m = db.movies().get(movie).await.unwrap().unwrap();
        assert_eq!((m.like_count, m.dislike_count), (0, 1));

        db.movies().toggle_reaction(movie, user, true).await.unwrap();
        let m = db.movies().get(movie).await.unwrap().unwrap();
        assert_eq!((m.like_count, m.dislike_count), (1, 0));

        // Cascaded reaction removal leaves the count stale until recomputed.
        db.users().delete(user).await.unwrap();
        assert_eq!(db.movies().get(movie).await.unwrap().unwrap().like_count, 1);

        db.movies().recompute_reaction_counts().await.unwrap();
        assert_eq!(db.movies().get(movie).await.unwrap().unwrap().like_count, 0);
    }
}
