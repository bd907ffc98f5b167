/// Persisted record of one issued refresh credential.
///
/// Rows are never deleted; a redeemed or logged-out token keeps its row with
/// `revoked_at` set. `replaced_by_token_id` points at the successor by id only,
/// so every token in a rotation chain is owned by the store, not by its
/// predecessor.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub account_id: Uuid,
    /// SHA-256 of the plaintext secret, lowercase hex
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by_token_id: Option<Uuid>,
    pub created_by_ip: Option<String>,
    pub created_by_user_agent: Option<String>,
}

impl RefreshToken {
    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Token-level validity; the owning account must additionally be active.
    #[inline]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }
}

/// Where a token request came from, recorded for audit only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

const MAX_IP_LENGTH: usize = 64;
const MAX_USER_AGENT_LENGTH: usize = 256;

impl TokenOrigin {
    /// Values longer than their column width are cut at a char boundary
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.map(|v| clamp(v, MAX_IP_LENGTH)),
            user_agent: user_agent.map(|v| clamp(v, MAX_USER_AGENT_LENGTH)),
        }
    }
}

fn clamp(mut value: String, max_chars: usize) -> String {
    if let Some((idx, _)) = value.char_indices().nth(max_chars) {
        value.truncate(idx);
    }
    value
}

/// A freshly minted token whose owner is decided by the store.
///
/// During rotation the owning account comes from the redeemed row, which is
/// only known inside the store's atomic section.
#[derive(Debug, Clone)]
pub struct PendingRefreshToken {
    pub id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub origin: TokenOrigin,
}

impl PendingRefreshToken {
    pub fn for_account(self, account_id: Uuid) -> RefreshToken {
        RefreshToken {
            id: self.id,
            account_id,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: None,
            replaced_by_token_id: None,
            created_by_ip: self.origin.ip,
            created_by_user_agent: self.origin.user_agent,
        }
    }
}
