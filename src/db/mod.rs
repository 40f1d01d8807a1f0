pub mod memory;
pub mod password_reset_tokens;
pub mod refresh_tokens;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewUser, PasswordResetToken, RefreshToken, User, UserProfile};

#[derive(Debug)]
pub enum StoreError {
    /// A unique constraint was violated (duplicate email).
    Conflict(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            StoreError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict("The email has already been taken.".to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Persisted user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Like `create`, but the very first stored user is made admin. The emptiness
    /// check and the insert happen as one step.
    async fn create_bootstrapping(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
    /// Changing the email clears `email_verified_at`. Returns `None` if the user is gone.
    async fn update_profile(&self, id: Uuid, profile: UserProfile)
        -> Result<Option<User>, StoreError>;
    /// Returns true only when this call moved the user from unverified to verified.
    async fn mark_email_verified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Password reset tokens keyed by email.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Insert or replace the token for `email`.
    async fn put(
        &self,
        email: &str,
        token_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn find(&self, email: &str) -> Result<Option<PasswordResetToken>, StoreError>;
    /// Delete the token only if it still carries `token_hash` and store the new
    /// password for `user_id` in the same unit of work. Returns false, with nothing
    /// changed, when the token is no longer there.
    async fn redeem(
        &self,
        email: &str,
        token_hash: &str,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError>;
    async fn delete(&self, email: &str) -> Result<(), StoreError>;
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, StoreError>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError>;
    /// Returns false if the token was already used.
    async fn mark_used(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn delete_by_hash(&self, token_hash: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(users::PgUserStore::new(pool.clone())),
            reset_tokens: Arc::new(password_reset_tokens::PgResetTokenStore::new(pool.clone())),
            refresh_tokens: Arc::new(refresh_tokens::PgRefreshTokenStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let users = Arc::new(memory::MemoryUserStore::new());
        Self {
            users: users.clone(),
            reset_tokens: Arc::new(memory::MemoryResetTokenStore::new(users)),
            refresh_tokens: Arc::new(memory::MemoryRefreshTokenStore::new()),
        }
    }
}
