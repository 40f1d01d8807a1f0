//! Signed email verification links.
//!
//! A link carries the user id, a SHA-256 of the email it was issued for and an
//! expiry; the signature is an HMAC-SHA256 over all three keyed with `APP_KEY`.
//! Nothing is stored, so a link survives restarts but dies with a key rotation
//! or an email change.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::auth::token;
use crate::db::UserStore;
use crate::email::{NotificationKind, Notifier};
use crate::error::AppError;
use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

pub const INVALID_SIGNATURE: &str = "Invalid signature.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    AlreadyVerified,
}

pub struct EmailVerifier {
    users: Arc<dyn UserStore>,
    notifier: Notifier,
    base_url: String,
    app_key: String,
    ttl: Duration,
}

impl EmailVerifier {
    pub fn new(
        users: Arc<dyn UserStore>,
        notifier: Notifier,
        base_url: &str,
        app_key: &str,
        ttl: Duration,
    ) -> Self {
        Self {
            users,
            notifier,
            base_url: base_url.to_string(),
            app_key: app_key.to_string(),
            ttl,
        }
    }

    pub fn signed_url(&self, user: &User, expires_at: DateTime<Utc>) -> String {
        let path = verify_path(user.id, &token::hash(&user.email));
        let expires = expires_at.timestamp();
        let signature = self.sign(&path, expires);
        format!(
            "{}{path}?expires={expires}&signature={signature}",
            self.base_url
        )
    }

    /// Queue a fresh link for the user's current email.
    pub fn send_link(&self, user: &User) {
        let link = self.signed_url(user, Utc::now() + self.ttl);
        self.notifier
            .send(&user.email, NotificationKind::VerifyEmail, link);
    }

    pub fn resend(&self, user: &User) -> ResendOutcome {
        if user.has_verified_email() {
            return ResendOutcome::AlreadyVerified;
        }
        self.send_link(user);
        ResendOutcome::Sent
    }

    /// Reject tampered or expired links before any lookup happens.
    pub fn check_signature(
        &self,
        id: Uuid,
        hash: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if now.timestamp() > expires {
            return Err(AppError::Forbidden(INVALID_SIGNATURE.to_string()));
        }

        let Ok(provided) = hex::decode(signature) else {
            return Err(AppError::Forbidden(INVALID_SIGNATURE.to_string()));
        };

        let mut mac = self.mac();
        mac.update(payload(&verify_path(id, hash), expires).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| AppError::Forbidden(INVALID_SIGNATURE.to_string()))
    }

    /// Move the user to verified. Calling it again on a verified user is a no-op.
    pub async fn verify(
        &self,
        id: Uuid,
        hash: &str,
        expires: i64,
        signature: &str,
    ) -> Result<VerifyOutcome, AppError> {
        let now = Utc::now();
        self.check_signature(id, hash, expires, signature, now)?;

        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        // The link was issued for a different email than the one on file.
        if !token::constant_time_eq(hash, &token::hash(&user.email)) {
            return Err(AppError::Forbidden(INVALID_SIGNATURE.to_string()));
        }

        if user.has_verified_email() {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        if self.users.mark_email_verified(user.id, now).await? {
            tracing::info!(user_id = %user.id, event = "verified", "Email verified");
            Ok(VerifyOutcome::Verified)
        } else {
            Ok(VerifyOutcome::AlreadyVerified)
        }
    }

    fn sign(&self, path: &str, expires: i64) -> String {
        let mut mac = self.mac();
        mac.update(payload(path, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.app_key.as_bytes())
            .expect("HMAC-SHA256 accepts keys of any length")
    }
}

fn verify_path(id: Uuid, hash: &str) -> String {
    format!("/email/verify/{id}/{hash}")
}

fn payload(path: &str, expires: i64) -> String {
    format!("{path}?expires={expires}")
}
