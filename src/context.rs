/// Application context and dependency injection
use crate::{
    account::AccountManager,
    appointment::AppointmentManager,
    auth::{AuthGate, PasswordVault, SessionStore, TokenIssuer},
    clock::{SharedClock, SystemClock},
    config::ServerConfig,
    db,
    error::ApiResult,
    rate_limit::ClientRateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub clock: SharedClock,
    pub sessions: Arc<SessionStore>,
    pub token_issuer: Arc<TokenIssuer>,
    pub auth_gate: Arc<AuthGate>,
    pub account_manager: Arc<AccountManager>,
    pub appointment_manager: Arc<AppointmentManager>,
    pub rate_limiter: Arc<ClientRateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        let db = db::create_pool(
            &config.storage.database,
            db::DatabaseOptions::from(&config.storage),
        )
        .await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let ctx = Self::with_pool(config, db, Arc::new(SystemClock));
        ctx.bootstrap_admin().await?;

        Ok(ctx)
    }

    /// Wire the services around an existing pool and clock
    pub fn with_pool(config: ServerConfig, db: SqlitePool, clock: SharedClock) -> Self {
        let auth = &config.authentication;

        let sessions = Arc::new(SessionStore::new(db.clone(), clock.clone()));
        let token_issuer = Arc::new(TokenIssuer::new(
            &auth.jwt_secret,
            chrono::Duration::hours(auth.token_ttl_hours),
            clock.clone(),
        ));
        let auth_gate = Arc::new(AuthGate::new(sessions.clone(), token_issuer.clone()));

        let account_manager = Arc::new(AccountManager::new(
            db.clone(),
            sessions.clone(),
            token_issuer.clone(),
            PasswordVault::new(auth.bcrypt_cost),
            clock.clone(),
        ));
        let appointment_manager = Arc::new(AppointmentManager::new(db.clone(), clock.clone()));
        let rate_limiter = Arc::new(ClientRateLimiter::from_config(&config.rate_limit));

        Self {
            config: Arc::new(config),
            db,
            clock,
            sessions,
            token_issuer,
            auth_gate,
            account_manager,
            appointment_manager,
            rate_limiter,
        }
    }

    /// Create the configured administrator account, if any
    pub async fn bootstrap_admin(&self) -> ApiResult<()> {
        let bootstrap = &self.config.bootstrap;

        if let (Some(username), Some(password)) = (&bootstrap.admin_username, &bootstrap.admin_password) {
            self.account_manager.ensure_admin(username, password).await?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
