use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Extension, Json, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::auth::auth_middleware;
use crate::security::jwt::Claims;
use crate::state::AppState;

mod auth;

/// The full application router. Built as a function of state so tests can
/// run the identical surface against an in-memory store.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth::router(state.clone()))
        .route(
            "/me",
            get(me).layer(from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn me(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}
