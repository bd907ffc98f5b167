//! Login, refresh and logout over one session lifecycle.
//!
//! `AuthService` is the only component that talks to the account store, the
//! password hasher, the token signer and the refresh-token store together.
//! Every rejection it produces is the same `Unauthorized` value.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::jwt::{AccessToken, TokenSigner};
use crate::auth::password::{hash_password, verify_password, HashedPassword};
use crate::auth::refresh_token::{IssuedRefreshToken, RefreshTokenStore};
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::domain::{Account, TokenOrigin};
use crate::error::{require_non_blank, AppError};
use crate::store::{AccountStore, RefreshTokenRepository};

lazy_static! {
    // Verified against when the username is unknown so that path pays the
    // same PBKDF2 cost as a wrong password.
    static ref DUMMY_PASSWORD: Option<HashedPassword> =
        hash_password("unknown-account-placeholder").ok();
}

/// Token pair handed back on successful login or refresh
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl LoginResult {
    fn new(access: AccessToken, refresh: IssuedRefreshToken) -> Self {
        Self {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.plaintext,
            refresh_expires_at: refresh.record.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    refresh_tokens: RefreshTokenStore,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<dyn RefreshTokenRepository>,
        settings: &JwtSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            refresh_tokens: RefreshTokenStore::new(
                tokens,
                clock.clone(),
                settings.refresh_token_ttl_days,
            ),
            signer: TokenSigner::new(settings, clock.clone()),
            clock,
        }
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    /// Exchange a username and password for a new token pair
    ///
    /// # Errors
    /// - `Validation` for a blank username or password (no store access)
    /// - `Unauthorized` for an unknown user, wrong password, or inactive account
    /// - `Database` when the store is unavailable
    #[tracing::instrument(name = "authenticate", skip_all)]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        origin: &TokenOrigin,
    ) -> Result<LoginResult, AppError> {
        require_non_blank(username, "username")?;
        require_non_blank(password, "password")?;

        let account = match self.accounts.find_by_username(username).await? {
            Some(account) => account,
            None => {
                equalise_unknown_account(password);
                tracing::warn!("Login rejected");
                return Err(AppError::unauthorized());
            }
        };

        // Verify before looking at `is_active` so an inactive account costs
        // the same as an active one.
        let password_matches =
            verify_password(password, &account.password_hash, &account.password_salt);
        if !password_matches || !account.is_active {
            tracing::warn!(account_id = %account.id, "Login rejected");
            return Err(AppError::unauthorized());
        }

        // Stamp only once both tokens exist so a failed issuance leaves no trace
        let result = self.issue_pair(&account, origin).await?;
        self.accounts
            .record_login(account.id, self.clock.now())
            .await?;

        tracing::info!(account_id = %account.id, "Login succeeded");
        Ok(result)
    }

    /// Rotate a refresh token and mint a fresh access token
    ///
    /// The presented token is dead afterwards whatever the outcome of later
    /// calls; only the returned refresh token may be used next.
    #[tracing::instrument(name = "refresh", skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        origin: &TokenOrigin,
    ) -> Result<LoginResult, AppError> {
        require_non_blank(refresh_token, "refresh_token")?;

        let rotated = self.refresh_tokens.redeem(refresh_token, origin).await?;
        let account_id = rotated.record.account_id;

        // `rotate` already required an active account; this read only
        // supplies the username for the access token.
        let account = match self.accounts.find_by_id(account_id).await? {
            Some(account) => account,
            None => {
                tracing::warn!(account_id = %account_id, "Refresh rejected for missing account");
                return Err(AppError::unauthorized());
            }
        };

        let access = self.signer.issue_access_token(account.id, &account.username)?;
        tracing::info!(account_id = %account.id, "Session refreshed");
        Ok(LoginResult::new(access, rotated))
    }

    /// Revoke a refresh token. Succeeds for unknown or already revoked tokens.
    #[tracing::instrument(name = "revoke", skip_all)]
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        require_non_blank(refresh_token, "refresh_token")?;
        self.refresh_tokens.revoke(refresh_token).await
    }

    async fn issue_pair(
        &self,
        account: &Account,
        origin: &TokenOrigin,
    ) -> Result<LoginResult, AppError> {
        let refresh = self.refresh_tokens.issue(account.id, origin).await?;
        let access = self.signer.issue_access_token(account.id, &account.username)?;
        Ok(LoginResult::new(access, refresh))
    }
}

fn equalise_unknown_account(password: &str) {
    if let Some(dummy) = DUMMY_PASSWORD.as_ref() {
        let _ = verify_password(password, &dummy.hash, &dummy.salt);
    }
}
