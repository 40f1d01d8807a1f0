use std::sync::Arc;

use crate::auth::password;
use crate::db::UserStore;
use crate::error::AppError;
use crate::models::User;
use crate::rate_limit::LoginRateLimiter;
use crate::validation::normalize_email;

/// Checks sign-in credentials. Unknown email and wrong password fail identically.
pub struct AuthGate {
    users: Arc<dyn UserStore>,
    limiter: LoginRateLimiter,
}

impl AuthGate {
    pub fn new(users: Arc<dyn UserStore>, limiter: LoginRateLimiter) -> Self {
        Self { users, limiter }
    }

    pub fn limiter(&self) -> &LoginRateLimiter {
        &self.limiter
    }

    pub async fn attempt(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        if self.limiter.check(&email).is_err() {
            return Err(AppError::RateLimited(
                "Too many login attempts. Please try again later.".to_string(),
            ));
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            password::verify_dummy(password);
            self.limiter.record_failure(&email);
            return Err(AppError::InvalidCredentials);
        };

        let valid = password::verify(password, &user.password_hash).map_err(AppError::Internal)?;
        if !valid {
            self.limiter.record_failure(&email);
            return Err(AppError::InvalidCredentials);
        }

        self.limiter.clear(&email);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::Stores;
    use crate::models::{NewUser, ROLE_CUSTOMER};

    async fn gate() -> AuthGate {
        let stores = Stores::in_memory();
        stores
            .users
            .create(NewUser {
                name: "User".to_string(),
                email: "user@email.com".to_string(),
                password_hash: password::hash("password123").unwrap(),
                role: ROLE_CUSTOMER.to_string(),
            })
            .await
            .unwrap();
        AuthGate::new(
            stores.users.clone(),
            LoginRateLimiter::with_limits(3, Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn accepts_correct_password_case_insensitively() {
        let gate = gate().await;
        let user = gate.attempt("USER@email.com", "password123").await.unwrap();
        assert_eq!(user.email, "user@email.com");
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let gate = gate().await;
        let wrong = gate.attempt("user@email.com", "nope-nope").await.unwrap_err();
        let unknown = gate.attempt("ghost@email.com", "password123").await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn locks_out_after_repeated_failures() {
        let gate = gate().await;
        for _ in 0..3 {
            let _ = gate.attempt("user@email.com", "wrong-password").await;
        }
        let err = gate.attempt("user@email.com", "password123").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));
    }
}
