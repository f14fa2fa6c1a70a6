use std::sync::Arc;

use crate::infra::store::AuthStore;
use crate::issuer::TokenIssuer;
use crate::security::config::AuthConfig;
use crate::security::jwt::JwtManager;

pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub jwt: JwtManager,
    pub issuer: TokenIssuer,
}

impl AppState {
    pub fn new(store: Arc<dyn AuthStore>, config: &AuthConfig) -> Arc<Self> {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.access_ttl);
        let issuer = TokenIssuer::new(store.clone(), jwt.clone(), config.refresh_ttl);
        Arc::new(Self { store, jwt, issuer })
    }
}
