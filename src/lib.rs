pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod credentials;
pub mod db;
pub mod jwt;
pub mod pagination;
pub mod rate_limit;
pub mod revocation;
pub mod tasks;

use api::{RECENT_CACHE_TTL, RecentCache, create_api_router};
use axum::Router;
use clock::{Clock, SystemClock};
use db::Database;
use jwt::JwtConfig;
use rate_limit::{UserLimiter, user_limiter};
use revocation::RevocationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Default bcrypt cost factor.
pub const DEFAULT_HASH_ROUNDS: u32 = 10;
/// Default likes/dislikes per user, movie and minute.
pub const DEFAULT_LIKE_THROTTLE: u32 = 5;
/// Default interval between maintenance runs.
pub const DEFAULT_TASK_INTERVAL: Duration = Duration::from_secs(60);

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens, distinct from `access_secret`
    pub refresh_secret: Vec<u8>,
    /// bcrypt cost factor
    pub hash_rounds: u32,
    /// Likes/dislikes allowed per user, movie and minute
    pub like_throttle_per_minute: u32,
    /// Interval between maintenance runs
    pub task_interval: Duration,
    /// Time source for token issuance, expiry and revocation TTLs
    pub clock: Arc<dyn Clock>,
    /// Token blocklist and verified cache, shared with the maintenance task
    pub revocations: Arc<RevocationStore>,
    /// Like/dislike quotas, pruned by the maintenance task
    pub reaction_limiter: Arc<UserLimiter>,
    /// Cached recent-movies results
    pub recent: Arc<RecentCache>,
}

impl ServerConfig {
    pub fn new(db: Database, access_secret: Vec<u8>, refresh_secret: Vec<u8>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            db,
            access_secret,
            refresh_secret,
            hash_rounds: DEFAULT_HASH_ROUNDS,
            like_throttle_per_minute: DEFAULT_LIKE_THROTTLE,
            task_interval: DEFAULT_TASK_INTERVAL,
            revocations: Arc::new(RevocationStore::new(clock.clone())),
            reaction_limiter: Arc::new(user_limiter(DEFAULT_LIKE_THROTTLE)),
            recent: Arc::new(RecentCache::new(RECENT_CACHE_TTL, clock.clone())),
            clock,
        }
    }

    /// Replace the time source. Also resets the revocation store and the
    /// recent-movies cache so they share it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.revocations = Arc::new(RevocationStore::new(clock.clone()));
        self.recent = Arc::new(RecentCache::new(RECENT_CACHE_TTL, clock.clone()));
        self.clock = clock;
        self
    }

    pub fn with_hash_rounds(mut self, rounds: u32) -> Self {
        self.hash_rounds = rounds;
        self
    }

    pub fn with_like_throttle(mut self, per_minute: u32) -> Self {
        self.like_throttle_per_minute = per_minute;
        self.reaction_limiter = Arc::new(user_limiter(per_minute));
        self
    }

    pub fn with_task_interval(mut self, interval: Duration) -> Self {
        self.task_interval = interval;
        self
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::with_clock(
        &config.access_secret,
        &config.refresh_secret,
        config.clock.clone(),
    ));

    create_api_router(
        config.db.clone(),
        jwt,
        config.revocations.clone(),
        config.hash_rounds,
        config.reaction_limiter.clone(),
        config.recent.clone(),
    )
}

/// Run maintenance tasks once and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_tasks(config: &ServerConfig) {
    tasks::run_tasks(&config.db, &config.revocations, &config.reaction_limiter).await;
    tasks::spawn_task_scheduler(
        config.db.clone(),
        config.revocations.clone(),
        config.reaction_limiter.clone(),
        config.task_interval,
    );
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_tasks` before this to run maintenance on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_tasks(&config).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
