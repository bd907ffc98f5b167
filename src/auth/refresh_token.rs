/// Refresh Token Management
///
/// Refresh tokens are:
/// - 64 bytes from the OS CSPRNG, URL-safe base64 encoded for the client
/// - Hashed with SHA-256 before storage (plaintext never persisted)
/// - Single-use: redeeming one revokes it and chains a replacement
/// - Never deleted, only marked revoked

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{PendingRefreshToken, RefreshToken, TokenOrigin};
use crate::error::AppError;
use crate::store::RefreshTokenRepository;

const TOKEN_SIZE_BYTES: usize = 64;

/// A persisted token together with the only copy of its plaintext secret
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub plaintext: String,
    pub record: RefreshToken,
}

/// Issues, rotates and revokes refresh tokens over a repository
#[derive(Clone)]
pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(
        repository: Arc<dyn RefreshTokenRepository>,
        clock: Arc<dyn Clock>,
        ttl_days: i64,
    ) -> Self {
        Self {
            repository,
            clock,
            ttl: Duration::try_days(ttl_days).unwrap_or(Duration::MAX),
        }
    }

    /// Mint and persist a new token for `account_id`
    pub async fn issue(
        &self,
        account_id: Uuid,
        origin: &TokenOrigin,
    ) -> Result<IssuedRefreshToken, AppError> {
        let (plaintext, pending) = self.mint(origin, self.clock.now())?;
        let record = pending.for_account(account_id);
        self.repository.insert_token(&record).await?;

        tracing::debug!(account_id = %account_id, token_id = %record.id, "Refresh token issued");
        Ok(IssuedRefreshToken { plaintext, record })
    }

    /// Exchange a presented secret for its replacement
    ///
    /// The presented token is revoked and linked to the returned one in a
    /// single store operation. Unknown, revoked, expired, or inactive-account
    /// tokens all fail with the same `Unauthorized`.
    pub async fn redeem(
        &self,
        plaintext: &str,
        origin: &TokenOrigin,
    ) -> Result<IssuedRefreshToken, AppError> {
        let token_hash = hash_token(plaintext);
        let now = self.clock.now();
        let (new_plaintext, replacement) = self.mint(origin, now)?;

        match self.repository.rotate(&token_hash, now, replacement).await? {
            Some(record) => {
                tracing::info!(
                    account_id = %record.account_id,
                    token_id = %record.id,
                    "Refresh token rotated"
                );
                Ok(IssuedRefreshToken {
                    plaintext: new_plaintext,
                    record,
                })
            }
            None => {
                tracing::warn!("Rejected refresh token redemption");
                Err(AppError::unauthorized())
            }
        }
    }

    /// Revoke a presented secret. Unknown or already revoked tokens are a no-op.
    pub async fn revoke(&self, plaintext: &str) -> Result<(), AppError> {
        let token_hash = hash_token(plaintext);
        if self.repository.revoke(&token_hash, self.clock.now()).await? {
            tracing::info!("Refresh token revoked");
        } else {
            tracing::debug!("Revocation of unknown or already revoked refresh token ignored");
        }
        Ok(())
    }

    /// Look up the stored record for a presented secret without validating it
    pub async fn lookup(&self, plaintext: &str) -> Result<Option<RefreshToken>, AppError> {
        self.repository.find_by_hash(&hash_token(plaintext)).await
    }

    fn mint(
        &self,
        origin: &TokenOrigin,
        now: DateTime<Utc>,
    ) -> Result<(String, PendingRefreshToken), AppError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("Refresh token expiry out of range".to_string()))?;

        let plaintext = generate_refresh_token();
        let pending = PendingRefreshToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(&plaintext),
            created_at: now,
            expires_at,
            origin: origin.clone(),
        };
        Ok((plaintext, pending))
    }
}

/// Generate a new refresh token secret
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_SIZE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of the secret, lowercase hex
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::Account;
    use crate::store::{AccountStore, InMemoryStore};

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token();

        // 64 bytes → 86 base64 characters without padding
        assert_eq!(token.len(), 86);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), TOKEN_SIZE_BYTES);
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_refresh_token();
        let hash1 = hash_token(&token);
        let hash2 = hash_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        let hash1 = hash_token(&generate_refresh_token());
        let hash2 = hash_token(&generate_refresh_token());

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_known_sha256_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_fails_without_storing() {
        let store = Arc::new(InMemoryStore::new());
        let owner = Account::new("alice", "hash".to_string(), "salt".to_string(), Utc::now());
        store.insert_account(&owner).await.unwrap();
        let tokens = RefreshTokenStore::new(store.clone(), Arc::new(SystemClock), 200_000_000);

        let err = tokens
            .issue(owner.id, &TokenOrigin::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.token_count().unwrap(), 0);
    }
}
