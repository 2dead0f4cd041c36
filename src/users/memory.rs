use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};
use crate::users::{NewUser, UserRecord, UserStore, UserUpdate};

/// In-process user store keyed by user id
///
/// Every operation runs under one lock, so `replace_refresh_token` is atomic.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<String, UserRecord>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("user store lock poisoned".to_string()))
    }

    fn not_found(id: &str) -> AppError {
        AppError::Database(DatabaseError::NotFound(format!("user {}", id)))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users()?.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users()?
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut users = self.users()?;

        if users.values().any(|existing| existing.username == user.username) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Username already used".to_string(),
            )));
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            refresh_token_hash: None,
            created_at: Utc::now(),
        };
        users.insert(record.id.clone(), record.clone());

        Ok(record)
    }

    async fn update_profile(&self, id: &str, update: UserUpdate) -> Result<UserRecord, AppError> {
        let mut users = self.users()?;
        let user = users.get_mut(id).ok_or_else(|| Self::not_found(id))?;

        if let Some(full_name) = update.full_name {
            user.full_name = full_name;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }

        Ok(user.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.users()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update_refresh_token(
        &self,
        id: &str,
        token_hash: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(user) = self.users()?.get_mut(id) {
            user.refresh_token_hash = token_hash.map(str::to_string);
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        match users.get_mut(id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = Some(new.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: "Test User".to_string(),
            password_hash: "hash".to_string(),
            role: "guest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("alice")).await.unwrap();

        let by_id = store.find_by_id(&created.id).await.unwrap();
        let by_name = store.find_by_username("alice").await.unwrap();

        assert_eq!(by_id, Some(created.clone()));
        assert_eq!(by_name, Some(created));
        assert_eq!(store.find_by_id("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = InMemoryUserStore::new();
        store.create(new_user("alice")).await.unwrap();

        let result = store.create(new_user("alice")).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("alice")).await.unwrap();

        let updated = store
            .update_profile(
                &created.id,
                UserUpdate {
                    role: Some("admin".to_string()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, "admin");
        assert_eq!(updated.full_name, "Test User");

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.delete(&created.id).await,
            Err(AppError::Database(DatabaseError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_replace_refresh_token_compares_first() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("alice")).await.unwrap();

        assert!(!store.replace_refresh_token(&created.id, "a", "b").await.unwrap());

        store.update_refresh_token(&created.id, Some("a")).await.unwrap();
        assert!(store.replace_refresh_token(&created.id, "a", "b").await.unwrap());
        assert!(!store.replace_refresh_token(&created.id, "a", "c").await.unwrap());

        let user = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(user.refresh_token_hash.as_deref(), Some("b"));
    }
}
