//! Password reset tokens: issuing links and redeeming them.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::auth::{password, token};
use crate::db::{RefreshTokenStore, ResetTokenStore, Stores, UserStore};
use crate::email::{NotificationKind, Notifier};
use crate::error::AppError;
use crate::models::User;
use crate::validation::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLinkStatus {
    Sent,
    UserNotFound,
}

pub struct PasswordBroker {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn ResetTokenStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    notifier: Notifier,
    base_url: String,
    ttl: Duration,
}

impl PasswordBroker {
    pub fn new(stores: &Stores, notifier: Notifier, base_url: &str, ttl: Duration) -> Self {
        Self {
            users: stores.users.clone(),
            tokens: stores.reset_tokens.clone(),
            refresh_tokens: stores.refresh_tokens.clone(),
            notifier,
            base_url: base_url.to_string(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `email`, replacing any earlier one, and queue the link.
    pub async fn send_reset_link(&self, email: &str) -> Result<ResetLinkStatus, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(ResetLinkStatus::UserNotFound);
        };

        let raw = token::generate();
        self.tokens
            .put(&user.email, &token::hash(&raw), Utc::now())
            .await?;

        self.notifier.send(
            &user.email,
            NotificationKind::PasswordReset,
            self.reset_url(&raw, &user.email),
        );
        tracing::info!(user_id = %user.id, "Password reset link issued");

        Ok(ResetLinkStatus::Sent)
    }

    /// Redeem a token and set the new password. Every failure is `InvalidToken`.
    pub async fn reset(&self, email: &str, raw_token: &str, new_password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        let record = self
            .tokens
            .find(&email)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if record.is_expired(self.ttl, Utc::now()) {
            self.tokens.delete(&email).await?;
            return Err(AppError::InvalidToken);
        }

        if !token::constant_time_eq(&token::hash(raw_token), &record.token_hash) {
            return Err(AppError::InvalidToken);
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidToken)?;

        // Issued to an earlier owner of this address.
        if record.created_at < user.created_at {
            self.tokens.delete(&email).await?;
            return Err(AppError::InvalidToken);
        }

        let pw_hash = password::hash(new_password).map_err(AppError::Internal)?;

        // Lost the race against another request redeeming the same token.
        if !self
            .tokens
            .redeem(&email, &record.token_hash, user.id, &pw_hash)
            .await?
        {
            return Err(AppError::InvalidToken);
        }

        self.refresh_tokens.delete_all_for_user(user.id).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(user)
    }

    /// Drop tokens that can no longer be redeemed.
    pub async fn prune_expired(&self) -> Result<u64, AppError> {
        Ok(self
            .tokens
            .delete_created_before(Utc::now() - self.ttl)
            .await?)
    }

    fn reset_url(&self, raw_token: &str, email: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("token", raw_token)
            .append_pair("email", email)
            .finish();
        format!("{}/reset-password?{query}", self.base_url)
    }
}
