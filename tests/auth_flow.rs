//! End-to-end scenarios for the session endpoints, run against the real
//! router with an in-memory store.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use atelier_auth::infra::store::MemoryStore;

mod common;

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn register(base: &str, email: &str, password: &str) -> (u16, Value) {
    post_json(
        &format!("{base}/auth/register"),
        json!({
            "name": "Test User",
            "email": email,
            "password": password,
            "password_confirmation": password,
        }),
    )
    .await
}

#[tokio::test]
async fn register_returns_pair_and_rejects_duplicates() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;

    let (status, body) = register(&base, "ada@example.com", "super-secret").await;
    assert_eq!(status, 201);
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "ada@example.com");
    // the password hash never leaves the server
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = register(&base, "ada@example.com", "super-secret").await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn register_validates_input() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;

    let (status, _) = register(&base, "not-an-email", "super-secret").await;
    assert_eq!(status, 422);

    let (status, _) = register(&base, "short@example.com", "tiny").await;
    assert_eq!(status, 422);

    let (status, _) = post_json(
        &format!("{base}/auth/register"),
        json!({
            "email": "mismatch@example.com",
            "password": "super-secret",
            "password_confirmation": "other-secret",
        }),
    )
    .await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn login_does_not_reveal_which_part_was_wrong() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;
    register(&base, "ada@example.com", "super-secret").await;

    let (status, wrong_pw) = post_json(
        &format!("{base}/auth/login"),
        json!({ "email": "ada@example.com", "password": "bad-guess" }),
    )
    .await;
    assert_eq!(status, 401);

    let (status, no_user) = post_json(
        &format!("{base}/auth/login"),
        json!({ "email": "nobody@example.com", "password": "bad-guess" }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(wrong_pw["message"], no_user["message"]);
}

#[tokio::test]
async fn refresh_rotates_and_the_old_token_dies() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;
    register(&base, "ada@example.com", "super-secret").await;

    let (status, session) = post_json(
        &format!("{base}/auth/login"),
        json!({ "email": "ada@example.com", "password": "super-secret" }),
    )
    .await;
    assert_eq!(status, 200);
    let original = session["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = post_json(
        &format!("{base}/auth/refresh"),
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, 200);
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), original);

    // the original token was consumed by the rotation
    let (status, _) = post_json(
        &format!("{base}/auth/refresh"),
        json!({ "refresh_token": original }),
    )
    .await;
    assert_eq!(status, 401);

    let (status, _) = post_json(
        &format!("{base}/auth/refresh"),
        json!({ "refresh_token": "never-issued" }),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn logout_revokes_access_and_refresh_credentials() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;
    let (_, session) = register(&base, "ada@example.com", "super-secret").await;
    let access = session["access_token"].as_str().unwrap().to_string();
    let refresh = session["refresh_token"].as_str().unwrap().to_string();

    let client = reqwest::Client::new();

    // bearer is required
    let resp = client
        .post(format!("{base}/auth/logout"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .post(format!("{base}/auth/logout"))
        .bearer_auth(&access)
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // the refresh token can never be redeemed afterwards
    let (status, _) = post_json(
        &format!("{base}/auth/refresh"),
        json!({ "refresh_token": refresh }),
    )
    .await;
    assert_eq!(status, 401);

    // the access credential was invalidated at the verifier
    let resp = client
        .get(format!("{base}/me"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    // revoking an already-revoked refresh token is a no-op, not an error
    let (_, fresh) = post_json(
        &format!("{base}/auth/login"),
        json!({ "email": "ada@example.com", "password": "super-secret" }),
    )
    .await;
    let resp = client
        .post(format!("{base}/auth/logout"))
        .bearer_auth(fresh["access_token"].as_str().unwrap())
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn me_returns_claims_for_a_valid_bearer() {
    let base = common::spawn_server(Arc::new(MemoryStore::new())).await;
    let (_, session) = register(&base, "ada@example.com", "super-secret").await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/me"))
        .bearer_auth(session["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let claims: Value = resp.json().await.unwrap();
    assert_eq!(claims["sub"], session["user"]["id"]);
}
