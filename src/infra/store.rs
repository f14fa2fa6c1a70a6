//! Credential store: users plus the durable record of issued refresh
//! credentials. `PgStore` backs production; `MemoryStore` backs tests and
//! local development without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{NewUser, RefreshToken, User};
use crate::infra::db::Db;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint().is_some() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn insert_refresh_token(&self, row: RefreshToken) -> Result<(), StoreError>;

    /// The rotation guard. Atomically revokes the row matching `token_hash`
    /// if it is still usable and returns it; returns `None` when the token
    /// is unknown, expired, or already revoked. Under arbitrary concurrent
    /// callers presenting the same hash, at most one receives `Some`.
    async fn consume_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError>;

    /// Sets `revoked_at` on the matching row. Idempotent: revoking an
    /// already-revoked or unknown token is a no-op.
    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn token_from_row(row: &sqlx::postgres::PgRow) -> RefreshToken {
    RefreshToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        revoked_at: row.get("revoked_at"),
        rotated_from: row.get("rotated_from"),
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, created_at)
             VALUES ($1, $2, $3, $4, now())
             RETURNING id, email, password_hash, name, created_at",
        )
        .bind(new.id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .fetch_one(&self.db)
        .await?;
        Ok(user_from_row(&row))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_refresh_token(&self, row: RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO refresh_tokens
                 (id, user_id, token_hash, created_at, expires_at, revoked_at, rotated_from)
             VALUES ($1, $2, $3, $4, $5, NULL, $6)",
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(&row.token_hash)
        .bind(row.created_at)
        .bind(row.expires_at)
        .bind(row.rotated_from)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        // Single conditional update: the WHERE clause re-checks usability so
        // concurrent redemptions of the same token cannot both match.
        let row = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2
             WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > $2
             RETURNING id, user_id, token_hash, created_at, expires_at, revoked_at, rotated_from",
        )
        .bind(token_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(token_from_row))
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Store for tests and local development. The single mutex gives the same
/// at-most-one-consumer guarantee the conditional UPDATE gives in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: new.id,
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn insert_refresh_token(&self, row: RefreshToken) -> Result<(), StoreError> {
        self.tokens
            .lock()
            .unwrap()
            .insert(row.token_hash.clone(), row);
        Ok(())
    }

    async fn consume_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.get_mut(token_hash) {
            Some(row) if row.is_usable(now) => {
                row.revoked_at = Some(now);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(row) = tokens.get_mut(token_hash) {
            if row.revoked_at.is_none() {
                row.revoked_at = Some(OffsetDateTime::now_utc());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;
    use time::Duration;

    use super::*;

    fn token_row(hash: &str, ttl: Duration) -> RefreshToken {
        RefreshToken::new(Uuid::new_v4(), hash.to_string(), ttl, None)
    }

    #[tokio::test]
    async fn consume_succeeds_once_then_fails() {
        let store = MemoryStore::new();
        store
            .insert_refresh_token(token_row("h1", Duration::days(7)))
            .await
            .unwrap();

        assert!(store.consume_refresh_token("h1").await.unwrap().is_some());
        assert!(store.consume_refresh_token("h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_token_is_not_consumable() {
        let store = MemoryStore::new();
        store
            .insert_refresh_token(token_row("h1", Duration::days(-1)))
            .await
            .unwrap();

        assert!(store.consume_refresh_token("h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_consumers_race_to_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_refresh_token(token_row("h1", Duration::days(7)))
            .await
            .unwrap();

        let attempts = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.consume_refresh_token("h1").await.unwrap() })
        });
        let outcomes = join_all(attempts).await;
        let winners = outcomes
            .into_iter()
            .filter(|r| r.as_ref().unwrap().is_some())
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_blocks_consumption() {
        let store = MemoryStore::new();
        store
            .insert_refresh_token(token_row("h1", Duration::days(7)))
            .await
            .unwrap();

        store.revoke_refresh_token("h1").await.unwrap();
        store.revoke_refresh_token("h1").await.unwrap();
        store.revoke_refresh_token("unknown").await.unwrap();
        assert!(store.consume_refresh_token("h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store
            .create_user(NewUser::new("a@example.com".into(), "hash".into(), None))
            .await
            .unwrap();
        let err = store
            .create_user(NewUser::new("a@example.com".into(), "hash".into(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }
}
