use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token error: {0}")]
    Token(String),
    #[error("token revoked")]
    Revoked,
}

/// Mints and verifies access credentials. Also the "verification
/// collaborator" that logout invalidates tokens at: revoked `jti`s are kept
/// in a process-local denylist consulted on every verify.
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    ttl: Duration,
    revoked_jtis: Arc<Mutex<HashSet<String>>>,
}

impl JwtManager {
    pub fn new(secret: String, ttl: Duration) -> Self {
        Self {
            secret,
            ttl,
            revoked_jtis: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn issue_access(&self, subject: &str) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + self.ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::Token(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| JwtError::Token(e.to_string()))?;
        if self.revoked_jtis.lock().unwrap().contains(&data.claims.jti) {
            return Err(JwtError::Revoked);
        }
        Ok(data.claims)
    }

    /// Invalidate an access credential before its natural expiry. Idempotent.
    pub fn revoke(&self, jti: &str) {
        self.revoked_jtis.lock().unwrap().insert(jti.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret".into(), Duration::minutes(15))
    }

    #[test]
    fn issue_then_verify_round_trips_subject() {
        let jwt = manager();
        let token = jwt.issue_access("user-1").unwrap();
        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn verify_rejects_token_signed_with_other_secret() {
        let token = manager().issue_access("user-1").unwrap();
        let other = JwtManager::new("different-secret".into(), Duration::minutes(15));
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn revoked_jti_fails_verification() {
        let jwt = manager();
        let token = jwt.issue_access("user-1").unwrap();
        let claims = jwt.verify(&token).unwrap();
        jwt.revoke(&claims.jti);
        assert!(matches!(jwt.verify(&token), Err(JwtError::Revoked)));
        // revoking again is a no-op
        jwt.revoke(&claims.jti);
    }
}
