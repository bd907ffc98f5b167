use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A login identity owned by the account directory.
///
/// The authentication core only reads accounts and stamps `last_login_at`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    /// Unique, compared case-sensitively
    pub username: String,
    /// Base64 PBKDF2 output
    pub password_hash: String,
    /// Base64 salt used to derive `password_hash`
    pub password_salt: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        username: impl Into<String>,
        password_hash: String,
        password_salt: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash,
            password_salt,
            is_active: true,
            created_at,
            last_login_at: None,
        }
    }
}
