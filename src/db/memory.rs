//! In-process stores used by the test harness and by local runs without `DATABASE_URL`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{RefreshTokenStore, ResetTokenStore, StoreError, UserStore};
use crate::models::{NewUser, PasswordResetToken, ROLE_ADMIN, RefreshToken, User, UserProfile};

#[derive(Default)]
pub struct MemoryUserStore {
    // A single lock keeps the email uniqueness check and the write atomic.
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> MutexGuard<'_, HashMap<Uuid, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn duplicate_email() -> StoreError {
    StoreError::Conflict("The email has already been taken.".to_string())
}

fn insert(users: &mut HashMap<Uuid, User>, user: NewUser) -> Result<User, StoreError> {
    if users.values().any(|u| u.email == user.email) {
        return Err(duplicate_email());
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        name: user.name,
        email: user.email,
        password_hash: user.password_hash,
        role: user.role,
        email_verified_at: None,
        created_at: now,
        updated_at: now,
    };
    users.insert(user.id, user.clone());
    Ok(user)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        insert(&mut self.users(), user)
    }

    async fn create_bootstrapping(&self, mut user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users();
        if users.is_empty() {
            user.role = ROLE_ADMIN.to_string();
        }
        insert(&mut users, user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users().values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.users().len() as i64)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        profile: UserProfile,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users();

        if let Some(email) = &profile.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(duplicate_email());
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = profile.name {
            user.name = name;
        }
        if let Some(email) = profile.email {
            if email != user.email {
                user.email = email;
                user.email_verified_at = None;
            }
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn mark_email_verified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.users().get_mut(&id) {
            Some(user) if user.email_verified_at.is_none() => {
                user.email_verified_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users().remove(&id).is_some())
    }
}

pub struct MemoryResetTokenStore {
    tokens: DashMap<String, PasswordResetToken>,
    users: Arc<MemoryUserStore>,
}

impl MemoryResetTokenStore {
    /// Redeeming writes passwords into `users`.
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            tokens: DashMap::new(),
            users,
        }
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn put(
        &self,
        email: &str,
        token_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tokens.insert(
            email.to_string(),
            PasswordResetToken {
                email: email.to_string(),
                token_hash: token_hash.to_string(),
                created_at,
            },
        );
        Ok(())
    }

    async fn find(&self, email: &str) -> Result<Option<PasswordResetToken>, StoreError> {
        Ok(self.tokens.get(email).map(|t| t.value().clone()))
    }

    async fn redeem(
        &self,
        email: &str,
        token_hash: &str,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        // Holding the user lock makes the removal and the write a single step.
        let mut users = self.users.users();
        if self
            .tokens
            .remove_if(email, |_, t| t.token_hash == token_hash)
            .is_none()
        {
            return Ok(false);
        }

        if let Some(user) = users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete(&self, email: &str) -> Result<(), StoreError> {
        self.tokens.remove(email);
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.created_at >= cutoff);
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<Uuid, RefreshToken>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, StoreError> {
        let token = RefreshToken {
            id: Uuid::now_v7(),
            user_id,
            token_hash: token_hash.to_string(),
            used: false,
            expires_at,
            created_at: Utc::now(),
        };
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .map(|t| t.value().clone()))
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, StoreError> {
        match self.tokens.get_mut(&id) {
            Some(mut token) if !token.used => {
                token.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<(), StoreError> {
        self.tokens.retain(|_, t| t.token_hash != token_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::ROLE_CUSTOMER;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: ROLE_CUSTOMER.to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@test.com")).await.unwrap();
        let err = store.create(new_user("a@test.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn email_change_clears_verification() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@test.com")).await.unwrap();
        assert!(store.mark_email_verified(user.id, Utc::now()).await.unwrap());

        let same = UserProfile { name: None, email: Some("a@test.com".to_string()) };
        let updated = store.update_profile(user.id, same).await.unwrap().unwrap();
        assert!(updated.has_verified_email());

        let changed = UserProfile { name: None, email: Some("b@test.com".to_string()) };
        let updated = store.update_profile(user.id, changed).await.unwrap().unwrap();
        assert!(!updated.has_verified_email());
    }

    #[tokio::test]
    async fn marks_verified_once() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@test.com")).await.unwrap();
        assert!(store.mark_email_verified(user.id, Utc::now()).await.unwrap());
        assert!(!store.mark_email_verified(user.id, Utc::now()).await.unwrap());
    }

    fn token_store() -> (Arc<MemoryUserStore>, MemoryResetTokenStore) {
        let users = Arc::new(MemoryUserStore::new());
        (users.clone(), MemoryResetTokenStore::new(users))
    }

    #[tokio::test]
    async fn first_user_is_bootstrapped_as_admin() {
        let store = MemoryUserStore::new();
        let first = store.create_bootstrapping(new_user("a@test.com")).await.unwrap();
        let second = store.create_bootstrapping(new_user("b@test.com")).await.unwrap();
        assert!(first.is_admin());
        assert!(!second.is_admin());
    }

    #[tokio::test]
    async fn concurrent_bootstrap_yields_one_admin() {
        let store = Arc::new(MemoryUserStore::new());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_bootstrapping(new_user(&format!("u{i}@test.com")))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut admins = 0;
        for task in tasks {
            if task.await.unwrap().is_admin() {
                admins += 1;
            }
        }
        assert_eq!(admins, 1);
    }

    #[tokio::test]
    async fn put_replaces_previous_token() {
        let (users, store) = token_store();
        let user = users.create(new_user("a@test.com")).await.unwrap();
        store.put("a@test.com", "first", Utc::now()).await.unwrap();
        store.put("a@test.com", "second", Utc::now()).await.unwrap();

        let token = store.find("a@test.com").await.unwrap().unwrap();
        assert_eq!(token.token_hash, "second");
        assert!(!store.redeem("a@test.com", "first", user.id, "new").await.unwrap());
        assert!(store.redeem("a@test.com", "second", user.id, "new").await.unwrap());
        assert!(store.find("a@test.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redeem_with_stale_hash_changes_nothing() {
        let (users, store) = token_store();
        let user = users.create(new_user("a@test.com")).await.unwrap();
        store.put("a@test.com", "live", Utc::now()).await.unwrap();

        assert!(!store.redeem("a@test.com", "stale", user.id, "new").await.unwrap());
        let stored = users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash");
        assert!(store.find("a@test.com").await.unwrap().is_some());

        assert!(store.redeem("a@test.com", "live", user.id, "new").await.unwrap());
        let stored = users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
    }

    #[tokio::test]
    async fn prunes_old_tokens() {
        let (_, store) = token_store();
        let now = Utc::now();
        store.put("old@test.com", "x", now - Duration::hours(2)).await.unwrap();
        store.put("new@test.com", "y", now).await.unwrap();

        let removed = store.delete_created_before(now - Duration::hours(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.find("new@test.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_token_is_used_once() {
        let store = MemoryRefreshTokenStore::new();
        let token = store
            .create(Uuid::now_v7(), "hash", Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert!(store.mark_used(token.id).await.unwrap());
        assert!(!store.mark_used(token.id).await.unwrap());
    }
}
