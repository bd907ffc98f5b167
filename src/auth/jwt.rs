/// Access Token Signing and Validation
///
/// Access tokens are HS256 JWTs. The server keeps no state for them, so
/// validity is signature, issuer, audience and expiry only.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// A signed access token and the instant it stops validating
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints access tokens with the secret it was constructed with
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(settings: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            ttl: Duration::try_minutes(settings.access_token_ttl_minutes).unwrap_or(Duration::MAX),
            clock,
        }
    }

    /// Sign a token for `account_id` expiring `access_token_ttl_minutes` from now
    ///
    /// # Errors
    /// Returns `Internal` if the expiry is out of range or encoding fails
    pub fn issue_access_token(
        &self,
        account_id: Uuid,
        username: &str,
    ) -> Result<AccessToken, AppError> {
        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("Access token expiry out of range".to_string()))?;
        let claims = Claims::new(
            account_id,
            username,
            &self.issuer,
            &self.audience,
            issued_at,
            expires_at,
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AccessToken { token, expires_at })
    }
}

/// Validate and extract claims from an access token
///
/// Signature, issuer, audience and expiry are all enforced with no clock-skew
/// allowance.
///
/// # Errors
/// Returns `Unauthorized` for any invalid, expired or tampered token
pub fn validate_access_token(token: &str, settings: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&settings.issuer]);
    validation.set_audience(&[&settings.audience]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::unauthorized()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test-issuer".to_string(),
            audience: "test-audience".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
        }
    }

    fn signer(config: &JwtSettings) -> TokenSigner {
        TokenSigner::new(config, Arc::new(SystemClock))
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();
        let account_id = Uuid::new_v4();

        let issued = signer(&config)
            .issue_access_token(account_id, "alice")
            .expect("Failed to generate token");
        let claims = validate_access_token(&issued.token, &config).expect("Failed to validate token");

        assert_eq!(claims.account_id().unwrap(), account_id);
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-audience");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expiry_follows_configured_ttl() {
        let config = get_test_config();
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));

        let issued = TokenSigner::new(&config, clock)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap();

        assert_eq!(issued.expires_at, now + Duration::minutes(15));
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error_not_a_panic() {
        let mut config = get_test_config();
        config.access_token_ttl_minutes = i64::MAX;

        let err = signer(&config)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_access_token("invalid.token.here", &config);

        assert!(result.unwrap_err().is_unauthorized());
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let issued = signer(&config)
            .issue_access_token(Uuid::new_v4(), "alice")
            .expect("Failed to generate token");

        let tampered = format!("{}X", issued.token);
        assert!(validate_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config = get_test_config();
        let issued = signer(&config)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap();

        let mut other = get_test_config();
        other.secret = "another-secret-key-at-least-32-characters".to_string();
        assert!(validate_access_token(&issued.token, &other).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let issued = signer(&config)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap();

        config.issuer = "wrong-issuer".to_string();
        assert!(validate_access_token(&issued.token, &config).is_err());
    }

    #[test]
    fn test_wrong_audience() {
        let mut config = get_test_config();
        let issued = signer(&config)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap();

        config.audience = "someone-else".to_string();
        assert!(validate_access_token(&issued.token, &config).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected_without_grace() {
        let config = get_test_config();
        // Issued 16 minutes ago with a 15 minute lifetime
        let clock = Arc::new(ManualClock::new(Utc::now() - Duration::minutes(16)));

        let issued = TokenSigner::new(&config, clock)
            .issue_access_token(Uuid::new_v4(), "alice")
            .unwrap();

        assert!(validate_access_token(&issued.token, &config).is_err());
    }
}
