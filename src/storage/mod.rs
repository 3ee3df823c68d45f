use crate::domain::auth::RefreshTokenRecord;
use crate::domain::user::{Role, User};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

pub mod memory;
pub mod refresh_token_repo;
pub mod user_repo;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(database_url: &str) -> std::result::Result<DbPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(20).connect(database_url).await
}

/// Persistent record of issued refresh tokens, keyed by the hash of the
/// token value.
///
/// `consume` is the one operation with an ordering obligation: it must be
/// linearizable per key, so that of two concurrent callers presenting the
/// same value exactly one observes the record. Implementations get this from
/// an atomic delete-returning-row, never from a read followed by a delete.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<()>;

    /// Atomically deletes the record for `token_hash` and returns its owner,
    /// or `None` if no record existed (already consumed, revoked or reaped).
    async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>>;

    /// Deletes a single record if present; returns whether one existed.
    async fn delete(&self, token_hash: &str) -> Result<bool>;

    /// Deletes every record owned by `user_id`; returns the count removed.
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Deletes every record past its expiry; returns the count removed.
    async fn delete_expired(&self) -> Result<u64>;

    async fn count_for_user(&self, user_id: Uuid) -> Result<u64>;
}

/// Identity lookup and credential storage, as far as this core needs it.
/// The owning application manages users; deleting one cascades to its
/// refresh records at the database layer.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create(&self, username: &str, password_hash: &str, role: Role) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;
}
