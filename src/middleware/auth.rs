use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AuthError;
use crate::state::AppState;

/// Requires a valid bearer access credential; on success the verified
/// claims are inserted into request extensions for the handler.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_from_header(req.headers()).ok_or(AuthError::Unauthenticated)?;
    let claims = state
        .jwt
        .verify(&token)
        .map_err(|_| AuthError::Unauthenticated)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn bearer_from_header(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
