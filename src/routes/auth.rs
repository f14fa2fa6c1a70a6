use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::{NewUser, User};
use crate::error::AuthError;
use crate::middleware::auth::auth_middleware;
use crate::security::{jwt::Claims, password, rate_limit};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route(
            "/auth/logout",
            post(logout).layer(from_fn_with_state(state, auth_middleware)),
        )
}

#[derive(Deserialize)]
struct RegisterPayload {
    name: Option<String>,
    email: String,
    password: String,
    password_confirmation: String,
}

#[derive(Serialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    user: User,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn validate_email(email: &str) -> bool {
    email.contains('@') && email.len() <= 255
}

fn validate_password(password: &str) -> bool {
    password.len() >= 8
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    check_rate_limit(&headers, 20)?;
    if !validate_email(&payload.email) {
        return Err(AuthError::Validation("invalid email".into()));
    }
    if !validate_password(&payload.password) {
        return Err(AuthError::Validation(
            "password too weak (min 8 chars)".into(),
        ));
    }
    if payload.password != payload.password_confirmation {
        return Err(AuthError::Validation("password confirmation mismatch".into()));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = state
        .store
        .create_user(NewUser::new(payload.email, hash, payload.name))
        .await?;

    let pair = state.issuer.issue(&user).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            access_token: pair.access,
            refresh_token: pair.refresh,
            user,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<SessionResponse>, AuthError> {
    check_rate_limit(&headers, 30)?;
    if !validate_email(&payload.email) {
        return Err(AuthError::Validation("invalid email".into()));
    }

    // Unknown email and wrong password fail identically.
    let user = state
        .store
        .user_by_email(&payload.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !password::verify_password(&payload.password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    let pair = state.issuer.issue(&user).await?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(SessionResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        user,
    }))
}

#[derive(Deserialize)]
struct RefreshPayload {
    refresh_token: String,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<SessionResponse>, AuthError> {
    check_rate_limit(&headers, 60)?;
    let (pair, user) = state.issuer.redeem(&payload.refresh_token).await?;
    Ok(Json(SessionResponse {
        access_token: pair.access,
        refresh_token: pair.refresh,
        user,
    }))
}

#[derive(Deserialize)]
struct LogoutPayload {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Bearer-protected. Revokes the presented access credential at the
/// verification collaborator and, when given, the refresh token row.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LogoutPayload>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.jwt.revoke(&claims.jti);
    if let Some(refresh_token) = payload.refresh_token {
        state.issuer.revoke(&refresh_token).await?;
    }
    tracing::info!(user_id = %claims.sub, "logout");
    Ok(Json(MessageResponse {
        message: "logged out",
    }))
}

fn check_rate_limit(headers: &HeaderMap, limit: u32) -> Result<(), AuthError> {
    if let Some(ip) = rate_limit::extract_ip(headers) {
        if !rate_limit::check(&ip, limit, 60) {
            return Err(AuthError::RateLimited);
        }
    }
    Ok(())
}
