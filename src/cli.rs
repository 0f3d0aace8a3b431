//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, UserRepository, UserRole};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "filmstrip",
    about = "Movie catalog API with token authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7292")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "filmstrip.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// bcrypt cost factor for new password hashes
    #[arg(long, env = "HASH_ROUNDS", default_value = "10",
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub hash_rounds: u32,

    /// Likes and dislikes allowed per user, route and minute
    #[arg(long, default_value = "5")]
    pub like_throttle: u32,

    /// Seconds between maintenance runs
    #[arg(long, default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..))]
    pub task_interval_secs: u64,

    /// Promote the user with this email to admin on startup
    #[arg(long)]
    pub promote_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!("{} is required. Set the environment variable or pass a secret file", env_var);
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. They must differ, or a refresh token could
/// pass as an access token and the reverse.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret("ACCESS_TOKEN_SECRET", args.access_secret_file.as_deref())?;
    let refresh = load_secret("REFRESH_TOKEN_SECRET", args.refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        return None;
    }

    Some((access, refresh))
}

/// Handle the --promote-admin flag.
pub async fn handle_promote_admin(db: &Database, email: &str) {
    match db.users().find_by_email(email).await {
        Ok(Some(user)) if user.role == UserRole::Admin => {
            info!(user_id = user.id, "User is already an admin");
        }
        Ok(Some(user)) => match db.users().set_role(user.id, UserRole::Admin).await {
            Ok(_) => info!(user_id = user.id, "User promoted to admin"),
            Err(e) => {
                error!(error = %e, "Failed to promote user");
                std::process::exit(1);
            }
        },
        Ok(None) => {
            error!(email = %email, "No user with this email. Register first");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to look up user");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    ServerConfig::new(db, access_secret.into_bytes(), refresh_secret.into_bytes())
        .with_hash_rounds(args.hash_rounds)
        .with_like_throttle(args.like_throttle)
        .with_task_interval(Duration::from_secs(args.task_interval_secs))
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["filmstrip"]).unwrap();
        assert_eq!(args.port, 7292);
        assert_eq!(args.database, "filmstrip.db");
        assert_eq!(args.like_throttle, 5);
        assert_eq!(args.task_interval_secs, 60);
        assert!(args.promote_admin.is_none());
    }

    #[test]
    fn test_hash_rounds_range() {
        assert!(Args::try_parse_from(["filmstrip", "--hash-rounds", "3"]).is_err());
        assert!(Args::try_parse_from(["filmstrip", "--hash-rounds", "32"]).is_err());

        let args = Args::try_parse_from(["filmstrip", "--hash-rounds", "12"]).unwrap();
        assert_eq!(args.hash_rounds, 12);
    }
}
