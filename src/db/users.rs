use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::models::{NewUser, ROLE_ADMIN, User, UserProfile};

/// Advisory lock key held while deciding whether a registration is the first one.
const BOOTSTRAP_LOCK_KEY: i64 = 0x7573_6572_6261_7365;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        Ok(insert(&self.pool, &user).await?)
    }

    async fn create_bootstrapping(&self, mut user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent registrations until this transaction ends.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let (has_users,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&mut *tx)
            .await?;
        if !has_users {
            user.role = ROLE_ADMIN.to_string();
        }

        let user = insert(&mut *tx, &user).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: UserProfile,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                email_verified_at = CASE
                    WHEN $3 IS NOT NULL AND $3 <> email THEN NULL
                    ELSE email_verified_at
                END,
                updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(profile.name)
        .bind(profile.email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn mark_email_verified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified_at = $2, updated_at = now()
             WHERE id = $1 AND email_verified_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

// Stamped with the application clock, like reset tokens.
async fn insert<'e, E>(executor: E, user: &NewUser) -> Result<User, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let now = Utc::now();
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(now)
    .fetch_one(executor)
    .await
}
