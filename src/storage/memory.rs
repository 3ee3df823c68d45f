//! In-memory store implementations. Used by the test suite and for
//! ephemeral development runs; the concurrency guarantees match the
//! Postgres implementations (`DashMap::remove` is atomic per key).

use crate::domain::auth::RefreshTokenRecord;
use crate::domain::user::{Role, User};
use crate::error::{AppError, Result};
use crate::storage::{RefreshTokenStore, UserDirectory};
use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    records: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<()> {
        self.records.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>> {
        // remove() is the linearization point; only one caller gets the record.
        Ok(self.records.remove(token_hash).map(|(_, record)| record.user_id))
    }

    async fn delete(&self, token_hash: &str) -> Result<bool> {
        Ok(self.records.remove(token_hash).is_some())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let keys: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.records.remove_if(&key, |_, record| record.user_id == user_id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let keys: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().expires_at < now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.records.remove_if(&key, |_, record| record.expires_at < now).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.records.iter().filter(|entry| entry.value().user_id == user_id).count() as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<Uuid, User>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, username: &str, password_hash: &str, role: Role) -> Result<User> {
        if self.users.iter().any(|entry| entry.value().username == username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
            password_hash: password_hash.to_string(),
            created_at: Some(OffsetDateTime::now_utc()),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let mut user = self.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}
