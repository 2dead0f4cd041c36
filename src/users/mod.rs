/// User store
///
/// The service only needs users to be looked up, created, updated and
/// deleted by identifier, plus a slot holding the digest of the current
/// refresh token. Two backends implement it: Postgres and an in-memory map.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_GUEST: &str = "guest";

/// Roles a user can be registered or updated with
pub const ASSIGNABLE_ROLES: [&str; 2] = [ROLE_GUEST, ROLE_ADMIN];

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    /// SHA-256 digest of the refresh token currently allowed for this user
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub password_hash: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError>;

    /// Insert a user with a freshly generated id.
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the username is taken
    async fn create(&self, user: NewUser) -> Result<UserRecord, AppError>;

    /// # Errors
    /// `DatabaseError::NotFound` if no user has `id`
    async fn update_profile(&self, id: &str, update: UserUpdate) -> Result<UserRecord, AppError>;

    /// # Errors
    /// `DatabaseError::NotFound` if no user has `id`
    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Overwrite (or clear, with `None`) the stored refresh token digest.
    async fn update_refresh_token(&self, id: &str, token_hash: Option<&str>)
        -> Result<(), AppError>;

    /// Atomically replace the stored digest, but only if it still equals `expected`.
    ///
    /// Returns `false` when the stored value differs or the user is gone.
    /// Concurrent refreshes for one user are serialized by this operation.
    async fn replace_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError>;
}
