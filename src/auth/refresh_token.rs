/// Refresh Token Tracking
///
/// Optional server-side record of the one refresh token currently valid for
/// each user. With tracking, a refresh token stops working as soon as a newer
/// one is issued (rotation with reuse detection) or the user logs out.
/// Without it, refresh tokens are valid on signature and expiry alone.
///
/// Only the SHA-256 digest of a refresh token is ever persisted.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::users::UserStore;

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait RefreshTokenTracker: Send + Sync {
    /// Record `token` as the only valid refresh token for `subject`.
    async fn save(&self, subject: &str, token: &str) -> Result<(), AppError>;

    /// Whether `token` is the currently recorded refresh token for `subject`.
    async fn is_valid(&self, subject: &str, token: &str) -> Result<bool, AppError>;

    /// Forget the recorded refresh token, invalidating it.
    async fn revoke(&self, subject: &str) -> Result<(), AppError>;

    /// Replace `presented` with `new` if `presented` is still the recorded token.
    ///
    /// The default is a plain check followed by a save; store-backed trackers
    /// override it with an atomic compare-and-set.
    async fn rotate(&self, subject: &str, presented: &str, new: &str) -> Result<bool, AppError> {
        if !self.is_valid(subject, presented).await? {
            return Ok(false);
        }
        self.save(subject, new).await?;
        Ok(true)
    }
}

/// Stateless mode: nothing is stored and every signed, unexpired refresh
/// token is accepted (no reuse detection).
#[derive(Debug, Default, Clone, Copy)]
pub struct StatelessTracker;

#[async_trait]
impl RefreshTokenTracker for StatelessTracker {
    async fn save(&self, _subject: &str, _token: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn is_valid(&self, _subject: &str, _token: &str) -> Result<bool, AppError> {
        Ok(true)
    }

    async fn revoke(&self, _subject: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn rotate(&self, _subject: &str, _presented: &str, _new: &str) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// Tracker persisting the refresh token digest on the user record
#[derive(Clone)]
pub struct StoreTracker {
    store: Arc<dyn UserStore>,
}

impl StoreTracker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RefreshTokenTracker for StoreTracker {
    async fn save(&self, subject: &str, token: &str) -> Result<(), AppError> {
        self.store
            .update_refresh_token(subject, Some(&hash_token(token)))
            .await
    }

    async fn is_valid(&self, subject: &str, token: &str) -> Result<bool, AppError> {
        let user = self.store.find_by_id(subject).await?;
        let token_hash = hash_token(token);

        Ok(user
            .and_then(|user| user.refresh_token_hash)
            .map_or(false, |stored| stored == token_hash))
    }

    async fn revoke(&self, subject: &str) -> Result<(), AppError> {
        self.store.update_refresh_token(subject, None).await?;
        tracing::info!(user_id = %subject, "Refresh token revoked");
        Ok(())
    }

    async fn rotate(&self, subject: &str, presented: &str, new: &str) -> Result<bool, AppError> {
        self.store
            .replace_refresh_token(subject, &hash_token(presented), &hash_token(new))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{InMemoryUserStore, NewUser};

    async fn store_with_user() -> (Arc<InMemoryUserStore>, String) {
        let store = Arc::new(InMemoryUserStore::new());
        let user = store
            .create(NewUser {
                username: "alice".to_string(),
                full_name: "Alice".to_string(),
                password_hash: "hash".to_string(),
                role: "guest".to_string(),
            })
            .await
            .unwrap();
        (store, user.id)
    }

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some-token");
        let hash2 = hash_token("some-token");

        assert_eq!(hash1, hash2);
        assert_ne!("some-token", hash1);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("other-token"));
    }

    #[tokio::test]
    async fn test_stateless_tracker_accepts_everything() {
        let tracker = StatelessTracker;
        tracker.save("42", "a").await.unwrap();
        tracker.revoke("42").await.unwrap();

        assert!(tracker.is_valid("42", "anything").await.unwrap());
        assert!(tracker.rotate("42", "old", "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_tracker_keeps_only_latest() {
        let (store, user_id) = store_with_user().await;
        let tracker = StoreTracker::new(store.clone());

        tracker.save(&user_id, "first").await.unwrap();
        assert!(tracker.is_valid(&user_id, "first").await.unwrap());

        tracker.save(&user_id, "second").await.unwrap();
        assert!(!tracker.is_valid(&user_id, "first").await.unwrap());
        assert!(tracker.is_valid(&user_id, "second").await.unwrap());

        let stored = store.find_by_id(&user_id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash, Some(hash_token("second")));
    }

    #[tokio::test]
    async fn test_store_tracker_revoke() {
        let (store, user_id) = store_with_user().await;
        let tracker = StoreTracker::new(store);

        tracker.save(&user_id, "token").await.unwrap();
        tracker.revoke(&user_id).await.unwrap();

        assert!(!tracker.is_valid(&user_id, "token").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_tracker_rotate_rejects_superseded() {
        let (store, user_id) = store_with_user().await;
        let tracker = StoreTracker::new(store);

        tracker.save(&user_id, "first").await.unwrap();
        assert!(tracker.rotate(&user_id, "first", "second").await.unwrap());
        assert!(!tracker.rotate(&user_id, "first", "third").await.unwrap());
        assert!(tracker.is_valid(&user_id, "second").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_subject_is_not_valid() {
        let (store, _) = store_with_user().await;
        let tracker = StoreTracker::new(store);

        assert!(!tracker.is_valid("no-such-user", "token").await.unwrap());
    }
}
