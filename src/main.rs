use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_auth::infra::{db, store::PgStore};
use atelier_auth::routes;
use atelier_auth::security::config::AuthConfig;
use atelier_auth::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let config = AuthConfig::from_env();
    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(store, &config);
    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
