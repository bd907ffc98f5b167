//! Persistence ports for accounts and refresh tokens.
//!
//! `PostgresStore` is the production implementation; `InMemoryStore` keeps
//! the same semantics in process memory for tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Account, PendingRefreshToken, RefreshToken};
use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Read/write access to the account directory
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Exact, case-sensitive username match
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError>;

    async fn record_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Fails with `UniqueConstraintViolation` when the username is taken
    async fn insert_account(&self, account: &Account) -> Result<(), AppError>;
}

/// Storage of refresh-token rows keyed by id and by `token_hash`
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Fails with `UniqueConstraintViolation` on a duplicate `token_hash`
    async fn insert_token(&self, token: &RefreshToken) -> Result<(), AppError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError>;

    /// Atomically redeem the row matching `token_hash` and chain `replacement`.
    ///
    /// Succeeds only when the row is unrevoked, `expires_at > now`, and its
    /// account is active. In that case the row gets `revoked_at = now` and
    /// `replaced_by_token_id = replacement.id`, and the replacement is
    /// persisted for the same account and returned. Otherwise nothing changes
    /// and `None` is returned. Of several concurrent calls for one hash at most
    /// one returns `Some`.
    async fn rotate(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: PendingRefreshToken,
    ) -> Result<Option<RefreshToken>, AppError>;

    /// Set `revoked_at = now` if the row exists and is not yet revoked.
    /// Returns whether a row changed.
    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}
