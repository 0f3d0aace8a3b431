//! bcrypt password hashing, run off the async executor.

use super::AuthError;

pub async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::internal("Password hashing task failed", e))?
        .map_err(|e| AuthError::internal("Failed to hash password", e))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::internal("Password verification task failed", e))?
        .map_err(|e| AuthError::internal("Failed to verify password", e))
}
