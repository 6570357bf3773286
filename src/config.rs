/// Configuration management for Mindwell
use crate::{
    auth::password,
    error::{ApiError, ApiResult},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Longest token lifetime accepted, one year
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Use the first `X-Forwarded-For` entry as the client address
    pub trust_forwarded_for: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
    /// SQLite busy timeout; the only storage-level timeout applied to queries
    pub busy_timeout_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

/// Rate limiting configuration for the public authentication endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Tokens added to each client bucket per second
    pub per_second: u32,
    /// Bucket capacity
    pub burst: u32,
    /// How often idle client buckets are evicted
    pub prune_interval_secs: u64,
}

/// Optional administrator account created at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MINDWELL_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("MINDWELL_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;
        let version = env::var("MINDWELL_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let trust_forwarded_for = env_or("MINDWELL_TRUST_FORWARDED_FOR", false);

        let data_directory: PathBuf = env::var("MINDWELL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("MINDWELL_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("mindwell.sqlite"));
        let max_connections = env_or("MINDWELL_DB_MAX_CONNECTIONS", 10);
        let busy_timeout_secs = env_or("MINDWELL_DB_BUSY_TIMEOUT_SECS", 5);

        let jwt_secret = env::var("MINDWELL_JWT_SECRET")
            .map_err(|_| ApiError::Validation("JWT secret required".to_string()))?;
        let token_ttl_hours = env_or("MINDWELL_TOKEN_TTL_HOURS", 24);
        let bcrypt_cost = env_or("MINDWELL_BCRYPT_COST", bcrypt::DEFAULT_COST);

        let rate_limit = RateLimitConfig {
            enabled: env_or("MINDWELL_RATE_LIMITS_ENABLED", true),
            per_second: env_or("MINDWELL_RATE_LIMIT_PER_SECOND", 1),
            burst: env_or("MINDWELL_RATE_LIMIT_BURST", 3),
            prune_interval_secs: env_or("MINDWELL_RATE_LIMIT_PRUNE_INTERVAL_SECS", 300),
        };

        let bootstrap = BootstrapConfig {
            admin_username: env::var("MINDWELL_ADMIN_USERNAME").ok(),
            admin_password: env::var("MINDWELL_ADMIN_PASSWORD").ok(),
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "mindwell=debug,tower_http=debug".to_string());
        let log_json = env_or("MINDWELL_LOG_JSON", false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                trust_forwarded_for,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
                busy_timeout_secs,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_hours,
                bcrypt_cost,
            },
            rate_limit,
            bootstrap,
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Minimal in-memory profile with a fast bcrypt cost, used by tests
    pub fn for_testing(jwt_secret: &str) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
                trust_forwarded_for: true,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
                max_connections: 1,
                busy_timeout_secs: 5,
            },
            authentication: AuthConfig {
                jwt_secret: jwt_secret.to_string(),
                token_ttl_hours: 24,
                bcrypt_cost: password::MIN_COST,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                per_second: 1,
                burst: 3,
                prune_interval_secs: 300,
            },
            bootstrap: BootstrapConfig {
                admin_username: None,
                admin_password: None,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.authentication.token_ttl_hours) {
            return Err(ApiError::Validation(format!(
                "Token TTL must be between 1 and {} hours",
                MAX_TOKEN_TTL_HOURS
            )));
        }

        if !(password::MIN_COST..=password::MAX_COST).contains(&self.authentication.bcrypt_cost) {
            return Err(ApiError::Validation(format!(
                "bcrypt cost must be between {} and {}",
                password::MIN_COST,
                password::MAX_COST
            )));
        }

        if self.rate_limit.per_second == 0 || self.rate_limit.burst == 0 {
            return Err(ApiError::Validation(
                "Rate limit rate and burst must be non-zero".to_string(),
            ));
        }

        match (&self.bootstrap.admin_username, &self.bootstrap.admin_password) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ApiError::Validation(
                    "Admin bootstrap needs both username and password".to_string(),
                ))
            }
            _ => {}
        }

        Ok(())
    }
}
