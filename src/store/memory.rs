use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{Account, PendingRefreshToken, RefreshToken};
use crate::error::{AppError, DatabaseError};
use crate::store::{AccountStore, RefreshTokenRepository};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    account_ids_by_username: HashMap<String, Uuid>,
    tokens: HashMap<Uuid, RefreshToken>,
    token_ids_by_hash: HashMap<String, Uuid>,
}

impl Tables {
    fn account_is_active(&self, account_id: Uuid) -> bool {
        self.accounts
            .get(&account_id)
            .map(|a| a.is_active)
            .unwrap_or(false)
    }

    fn insert_token(&mut self, token: RefreshToken) -> Result<(), AppError> {
        if self.token_ids_by_hash.contains_key(&token.token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens.token_hash".to_string(),
            )
            .into());
        }
        if !self.accounts.contains_key(&token.account_id) {
            return Err(DatabaseError::UnexpectedError(
                "refresh_tokens.account_id references a missing account".to_string(),
            )
            .into());
        }
        self.token_ids_by_hash.insert(token.token_hash.clone(), token.id);
        self.tokens.insert(token.id, token);
        Ok(())
    }

    fn token_id(&self, token_hash: &str) -> Option<Uuid> {
        self.token_ids_by_hash.get(token_hash).copied()
    }
}

/// Both tables behind one mutex, mirroring a single relational database.
///
/// Every trait method holds the guard for its whole body, which makes
/// `rotate` a true check-and-set.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip an account's `is_active` flag. Returns false for unknown ids.
    pub fn set_account_active(&self, account_id: Uuid, is_active: bool) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        match tables.accounts.get_mut(&account_id) {
            Some(account) => {
                account.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn find_token(&self, token_id: Uuid) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.tables()?.tokens.get(&token_id).cloned())
    }

    pub fn token_count(&self) -> Result<usize, AppError> {
        Ok(self.tables()?.tokens.len())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| DatabaseError::UnexpectedError("in-memory store lock poisoned".to_string()).into())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .account_ids_by_username
            .get(username)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.tables()?.accounts.get(&account_id).cloned())
    }

    async fn record_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(account) = self.tables()?.accounts.get_mut(&account_id) {
            account.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        let mut tables = self.tables()?;
        if tables.account_ids_by_username.contains_key(&account.username)
            || tables.accounts.contains_key(&account.id)
        {
            return Err(DatabaseError::UniqueConstraintViolation(
                "accounts.username".to_string(),
            )
            .into());
        }
        tables
            .account_ids_by_username
            .insert(account.username.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert_token(&self, token: &RefreshToken) -> Result<(), AppError> {
        self.tables()?.insert_token(token.clone())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .token_id(token_hash)
            .and_then(|id| tables.tokens.get(&id))
            .cloned())
    }

    async fn rotate(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: PendingRefreshToken,
    ) -> Result<Option<RefreshToken>, AppError> {
        let mut tables = self.tables()?;

        let current = match tables.token_id(token_hash).and_then(|id| tables.tokens.get(&id)) {
            Some(token) => token.clone(),
            None => return Ok(None),
        };
        if !current.is_usable_at(now) || !tables.account_is_active(current.account_id) {
            return Ok(None);
        }

        let successor = replacement.for_account(current.account_id);
        tables.insert_token(successor.clone())?;

        if let Some(row) = tables.tokens.get_mut(&current.id) {
            row.revoked_at = Some(now);
            row.replaced_by_token_id = Some(successor.id);
        }

        Ok(Some(successor))
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        let id = match tables.token_id(token_hash) {
            Some(id) => id,
            None => return Ok(false),
        };
        match tables.tokens.get_mut(&id) {
            Some(row) if row.revoked_at.is_none() => {
                row.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
