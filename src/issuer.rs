//! Mints access/refresh credential pairs and enforces single-use rotation
//! on redemption.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use time::Duration;
use uuid::Uuid;

use crate::domain::{RefreshToken, User};
use crate::error::AuthError;
use crate::infra::store::AuthStore;
use crate::security::jwt::JwtManager;

#[derive(Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub struct TokenIssuer {
    store: Arc<dyn AuthStore>,
    jwt: JwtManager,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn AuthStore>, jwt: JwtManager, refresh_ttl: Duration) -> Self {
        Self {
            store,
            jwt,
            refresh_ttl,
        }
    }

    /// Mint a fresh pair for a persisted identity: a short-lived JWT plus a
    /// new usable refresh row. Fails only on store/signing failures, which
    /// are fatal to the calling request.
    pub async fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        self.issue_rotated(user, None).await
    }

    async fn issue_rotated(
        &self,
        user: &User,
        rotated_from: Option<Uuid>,
    ) -> Result<TokenPair, AuthError> {
        let access = self.jwt.issue_access(&user.id.to_string())?;
        let (refresh, refresh_hash) = generate_refresh_token();
        self.store
            .insert_refresh_token(RefreshToken::new(
                user.id,
                refresh_hash,
                self.refresh_ttl,
                rotated_from,
            ))
            .await?;
        Ok(TokenPair { access, refresh })
    }

    /// Exchange a refresh token for a new pair, revoking it in the same
    /// store operation that decides it was usable. Unknown, expired,
    /// revoked and already-rotated tokens all fail identically so the
    /// response leaks nothing about which case applied.
    pub async fn redeem(&self, raw_refresh: &str) -> Result<(TokenPair, User), AuthError> {
        let hash = hash_refresh_token(raw_refresh);
        let consumed = self
            .store
            .consume_refresh_token(&hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        let user = self
            .store
            .user_by_id(consumed.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        tracing::debug!(user_id = %user.id, rotated_from = %consumed.id, "refresh token rotated");
        self.issue_rotated(&user, Some(consumed.id)).await
            .map(|pair| (pair, user))
    }

    /// Logout path: revoke without reissuing. Idempotent.
    pub async fn revoke(&self, raw_refresh: &str) -> Result<(), AuthError> {
        let hash = hash_refresh_token(raw_refresh);
        self.store.revoke_refresh_token(&hash).await?;
        Ok(())
    }
}

fn generate_refresh_token() -> (String, String) {
    let raw = format!("{}-{}", Uuid::new_v4(), Uuid::new_v4());
    let hash = hash_refresh_token(&raw);
    (raw, hash)
}

fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
