use time::Duration;
use tracing::warn;

/// Env-driven knobs for the token lifecycle. Defaults are suitable for
/// local development; production must set `JWT_SECRET`.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

impl AuthConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env_string("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET missing; using an insecure development secret");
            "dev-secret-change-me".into()
        });
        let access_ttl = Duration::minutes(
            env_i64("ACCESS_TTL_MINUTES").unwrap_or(DEFAULT_ACCESS_TTL_MINUTES),
        );
        let refresh_ttl =
            Duration::days(env_i64("REFRESH_TTL_DAYS").unwrap_or(DEFAULT_REFRESH_TTL_DAYS));
        Self {
            jwt_secret,
            access_ttl,
            refresh_ttl,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
