use std::sync::Arc;

use time::Duration;

use atelier_auth::infra::store::AuthStore;
use atelier_auth::security::config::AuthConfig;
use atelier_auth::state::AppState;

pub fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-test-secret".into(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
    }
}

/// Serves the real application router on an ephemeral port against the
/// given store and returns its base URL.
pub async fn spawn_server(store: Arc<dyn AuthStore>) -> String {
    let state = AppState::new(store, &test_config());
    let app = atelier_auth::app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
