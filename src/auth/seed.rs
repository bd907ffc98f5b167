use crate::auth::password::hash_password;
use crate::clock::Clock;
use crate::domain::Account;
use crate::error::{AppError, DatabaseError};
use crate::store::AccountStore;

/// Create an active account unless one with that username already exists.
///
/// Returns whether an account was created. A blank username or password skips
/// seeding with a warning instead of failing startup.
pub async fn seed_account(
    accounts: &dyn AccountStore,
    clock: &dyn Clock,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let username = username.trim();
    if username.is_empty() || password.trim().is_empty() {
        tracing::warn!("Skipping account seed because username/password is missing");
        return Ok(false);
    }

    if accounts.find_by_username(username).await?.is_some() {
        return Ok(false);
    }

    let hashed = hash_password(password)?;
    let account = Account::new(username, hashed.hash, hashed.salt, clock.now());

    match accounts.insert_account(&account).await {
        Ok(()) => {
            tracing::info!(account_id = %account.id, username = %username, "Seeded account");
            Ok(true)
        }
        // Another instance seeded it between our lookup and insert
        Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_))) => Ok(false),
        Err(e) => Err(e),
    }
}
