use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Account, PendingRefreshToken, RefreshToken};
use crate::error::AppError;
use crate::store::{AccountStore, RefreshTokenRepository};

/// PostgreSQL-backed account and refresh-token storage
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, password_hash, password_salt, is_active, created_at, last_login_at
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, password_hash, password_salt, is_active, created_at, last_login_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn record_login(&self, account_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET last_login_at = $1 WHERE id = $2")
            .bind(at)
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, password_hash, password_salt, is_active, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(&account.password_salt)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.last_login_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresStore {
    async fn insert_token(&self, token: &RefreshToken) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_token(&mut conn, token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, account_id, token_hash, created_at, expires_at, revoked_at,
                   replaced_by_token_id, created_by_ip, created_by_user_agent
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn rotate(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: PendingRefreshToken,
    ) -> Result<Option<RefreshToken>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Conditional update is the compare-and-swap: a concurrent redeemer
        // blocks on the row lock, then re-evaluates `revoked_at IS NULL` and
        // matches nothing.
        let redeemed = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            UPDATE refresh_tokens AS t
            SET revoked_at = $2
            FROM accounts AS a
            WHERE t.token_hash = $1
              AND t.revoked_at IS NULL
              AND t.expires_at > $2
              AND a.id = t.account_id
              AND a.is_active
            RETURNING t.id, t.account_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut tx)
        .await?;

        let (redeemed_id, account_id) = match redeemed {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let successor = replacement.for_account(account_id);
        insert_token(&mut tx, &successor).await?;

        sqlx::query("UPDATE refresh_tokens SET replaced_by_token_id = $1 WHERE id = $2")
            .bind(successor.id)
            .bind(redeemed_id)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;

        Ok(Some(successor))
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_token(
    conn: &mut sqlx::PgConnection,
    token: &RefreshToken,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, account_id, token_hash, created_at, expires_at, revoked_at,
                                    replaced_by_token_id, created_by_ip, created_by_user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(token.id)
    .bind(token.account_id)
    .bind(&token.token_hash)
    .bind(token.created_at)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .bind(token.replaced_by_token_id)
    .bind(&token.created_by_ip)
    .bind(&token.created_by_user_agent)
    .execute(conn)
    .await?;

    Ok(())
}
