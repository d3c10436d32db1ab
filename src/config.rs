use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_days: i64,
    pub max_login_attempts: u32,
    pub login_cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/applications.db?mode=rwc".into());
        let auth = AuthConfig {
            // Refuse to start without a signing secret; every issued token
            // depends on it.
            secret: std::env::var("SECRET_KEY").context(
                "SECRET_KEY environment variable is not set; \
                 generate one with: openssl rand -hex 32",
            )?,
            token_ttl_days: std::env::var("TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
            max_login_attempts: std::env::var("MAX_LOGIN_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
            login_cooldown_secs: std::env::var("LOGIN_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        Ok(Self { database_url, auth })
    }
}
