use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Durable record of an issued refresh credential. Only the SHA-256 digest
/// of the opaque token is stored; the raw string is returned to the caller
/// once and never persisted. Rows are never deleted; rotation and logout
/// set `revoked_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
    /// Predecessor in the rotation chain, when this row was minted by a
    /// redemption rather than a login/register.
    pub rotated_from: Option<Uuid>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token_hash: String, ttl: Duration, rotated_from: Option<Uuid>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
            rotated_from,
        }
    }

    /// Usable means redeemable: not yet revoked or rotated away, not expired.
    pub fn is_usable(&self, now: OffsetDateTime) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}
