use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::auth::rate_limit::{LoginRateLimiter, RateLimitConfig};
use crate::auth::token::TokenKeys;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub keys: TokenKeys,
    pub limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        let keys = TokenKeys::new(
            &config.auth.secret,
            Duration::from_secs(config.auth.token_ttl_days as u64 * 24 * 3600),
        );
        let limiter = Arc::new(LoginRateLimiter::new(RateLimitConfig {
            max_attempts: config.auth.max_login_attempts,
            cooldown: Duration::from_secs(config.auth.login_cooldown_secs),
        }));
        Self {
            db,
            config,
            keys,
            limiter,
        }
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

/// An in-memory SQLite pool with the schema applied. Single connection:
/// every pooled connection to `sqlite::memory:` would otherwise get its own
/// empty database.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("apply migrations");
    db
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    test_state_with(|_| {}).await
}

#[cfg(test)]
pub(crate) async fn test_state_with(tweak: impl FnOnce(&mut AppConfig)) -> AppState {
    use crate::config::AuthConfig;

    let mut config = AppConfig {
        database_url: "sqlite::memory:".into(),
        auth: AuthConfig {
            secret: "test-secret-key-for-tests-only!!".into(),
            token_ttl_days: 7,
            max_login_attempts: 5,
            login_cooldown_secs: 60,
        },
    };
    tweak(&mut config);
    AppState::from_parts(test_pool().await, Arc::new(config))
}
