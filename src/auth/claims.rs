/// JWT Claims structure
///
/// Payload of an access token: the registered claims of RFC 7519 plus the
/// account's username.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    /// Display name (username)
    pub name: String,
    /// Unique token identifier
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(
        account_id: Uuid,
        username: &str,
        issuer: &str,
        audience: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: account_id.to_string(),
            name: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Extract account ID from claims
    ///
    /// # Errors
    /// Returns `Unauthorized` if the subject is not a valid UUID
    pub fn account_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::unauthorized())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_creation() {
        let account_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = Claims::new(account_id, "alice", "iss", "aud", now, now + Duration::minutes(15));

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.iss, "iss");
        assert_eq!(claims.aud, "aud");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims.account_id().unwrap(), account_id);
    }

    #[test]
    fn test_each_claims_gets_unique_jti() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let first = Claims::new(id, "alice", "iss", "aud", now, now);
        let second = Claims::new(id, "alice", "iss", "aud", now, now);

        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_invalid_account_id() {
        let now = Utc::now();
        let mut claims = Claims::new(Uuid::new_v4(), "alice", "iss", "aud", now, now);
        claims.sub = "invalid-uuid".to_string();

        assert!(claims.account_id().unwrap_err().is_unauthorized());
    }
}
